//! Host environment blobs passed at launch.
//!
//! The host hands the plugin a JSON `info` blob describing itself and the
//! attached devices, and optionally an `actionInfo` blob for a single
//! action instance.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{ActionId, ContextId};

// ============================================================================
// HostInfo
// ============================================================================

/// The `info` blob describing the host environment.
///
/// Unknown fields are preserved in [`HostInfo::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    /// Host application details.
    #[serde(default)]
    pub application: ApplicationInfo,

    /// Plugin details as known by the host.
    #[serde(default)]
    pub plugin: Option<PluginInfo>,

    /// Display scale factor.
    #[serde(default)]
    pub device_pixel_ratio: Option<f64>,

    /// Attached devices.
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostInfo {
    /// Parses the `info` blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the blob is not valid JSON of the
    /// expected shape.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid -info blob: {e}")))
    }
}

/// Host application details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// UI language code.
    #[serde(default)]
    pub language: Option<String>,

    /// Operating system identifier.
    #[serde(default)]
    pub platform: Option<String>,

    /// Host version string.
    #[serde(default)]
    pub version: Option<String>,
}

/// Plugin details as known by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin bundle identifier.
    #[serde(default)]
    pub uuid: Option<String>,

    /// Plugin version string.
    #[serde(default)]
    pub version: Option<String>,
}

/// An attached device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device identifier.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Device model code.
    #[serde(rename = "type", default)]
    pub device_type: Option<u32>,

    /// Key grid size.
    #[serde(default)]
    pub size: Option<DeviceSize>,
}

/// Key grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSize {
    /// Number of columns.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
}

// ============================================================================
// ActionInfo
// ============================================================================

/// The optional `actionInfo` blob for a single action instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInfo {
    /// Action identifier.
    pub action: ActionId,

    /// Action instance.
    pub context: ContextId,

    /// Device the instance lives on.
    #[serde(default)]
    pub device: Option<String>,

    /// Instance payload (settings, coordinates).
    #[serde(default)]
    pub payload: Value,
}

impl ActionInfo {
    /// Parses the `actionInfo` blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the blob is not valid JSON of the
    /// expected shape.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid -actionInfo blob: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
