//! Outbound commands with fixed shapes.
//!
//! # Commands
//!
//! | Event | Fields |
//! |-------|--------|
//! | `setSettings` | `{context, payload}` |
//! | `getSettings` | `{context}` |
//! | `setGlobalSettings` | `{context: uuid, payload}` |
//! | `getGlobalSettings` | `{context: uuid}` |
//! | `openUrl` | `{payload: {url}}` |
//! | `logMessage` | `{payload: {message}}` |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::identifiers::{ContextId, PluginUuid};

// ============================================================================
// Command
// ============================================================================

/// A command the plugin sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Persist settings for one action instance.
    SetSettings {
        /// Target action instance.
        context: ContextId,
        /// Settings object.
        payload: Value,
    },

    /// Request settings for one action instance.
    GetSettings {
        /// Target action instance.
        context: ContextId,
    },

    /// Persist the plugin's global settings.
    SetGlobalSettings {
        /// Settings object.
        payload: Value,
    },

    /// Request the plugin's global settings.
    GetGlobalSettings,

    /// Open a URL in the default browser.
    OpenUrl {
        /// URL to open.
        url: String,
    },

    /// Write a line to the host's log.
    LogMessage {
        /// Log line.
        message: String,
    },
}

impl Command {
    /// Returns the wire event name.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::SetSettings { .. } => "setSettings",
            Self::GetSettings { .. } => "getSettings",
            Self::SetGlobalSettings { .. } => "setGlobalSettings",
            Self::GetGlobalSettings => "getGlobalSettings",
            Self::OpenUrl { .. } => "openUrl",
            Self::LogMessage { .. } => "logMessage",
        }
    }

    /// Returns the frame fields other than `event`.
    ///
    /// Global settings commands are addressed to the plugin's own `uuid`.
    #[must_use]
    pub fn into_data(self, uuid: &PluginUuid) -> Value {
        match self {
            Self::SetSettings { context, payload } => {
                json!({ "context": context, "payload": payload })
            }
            Self::GetSettings { context } => json!({ "context": context }),
            Self::SetGlobalSettings { payload } => json!({ "context": uuid, "payload": payload }),
            Self::GetGlobalSettings => json!({ "context": uuid }),
            Self::OpenUrl { url } => json!({ "payload": { "url": url } }),
            Self::LogMessage { message } => json!({ "payload": { "message": message } }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
