//! Builder pattern for plugin configuration.
//!
//! Provides a fluent API for configuring and creating [`Plugin`] instances.
//!
//! # Example
//!
//! ```no_run
//! use plugin_bridge::{LaunchArgs, Plugin};
//!
//! # fn example() -> plugin_bridge::Result<()> {
//! let plugin = Plugin::builder()
//!     .launch_args(LaunchArgs::from_env()?)
//!     .max_queued(1024)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::events::DocumentStatus;
use crate::identifiers::PluginUuid;
use crate::protocol::HostInfo;
use crate::transport::{ConnectionOptions, Handshake};

use super::args::LaunchArgs;
use super::core::Plugin;

// ============================================================================
// PluginBuilder
// ============================================================================

/// Builder for configuring a [`Plugin`] instance.
///
/// Use [`Plugin::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct PluginBuilder {
    /// Host WebSocket port.
    port: Option<u16>,
    /// Instance identifier.
    uuid: Option<PluginUuid>,
    /// Registration event name.
    register_event: Option<String>,
    /// Host environment.
    info: Option<HostInfo>,
    /// Hosting document phase at construction.
    document: DocumentStatus,
    /// Outgoing queue bound.
    max_queued: Option<usize>,
}

// ============================================================================
// PluginBuilder Implementation
// ============================================================================

impl PluginBuilder {
    /// Creates a new plugin builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes port, uuid, registration event and info from launch arguments.
    #[must_use]
    pub fn launch_args(mut self, args: LaunchArgs) -> Self {
        self.port = Some(args.port);
        self.uuid = Some(args.uuid);
        self.register_event = Some(args.register_event);
        self.info = Some(args.info);
        self
    }

    /// Sets the host WebSocket port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the instance identifier sent in the handshake.
    #[inline]
    #[must_use]
    pub fn uuid(mut self, uuid: impl Into<PluginUuid>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Sets the registration event name.
    #[inline]
    #[must_use]
    pub fn register_event(mut self, event: impl Into<String>) -> Self {
        self.register_event = Some(event.into());
        self
    }

    /// Sets the host environment info.
    #[inline]
    #[must_use]
    pub fn info(mut self, info: HostInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Sets the hosting document phase.
    ///
    /// Defaults to [`DocumentStatus::Loaded`]. With
    /// [`DocumentStatus::Loading`], call [`Plugin::mark_document_loaded`]
    /// once loading completes.
    #[inline]
    #[must_use]
    pub fn document_status(mut self, status: DocumentStatus) -> Self {
        self.document = status;
        self
    }

    /// Bounds the outgoing queue; the oldest frame is dropped when full.
    #[inline]
    #[must_use]
    pub fn max_queued(mut self, max: usize) -> Self {
        self.max_queued = Some(max);
        self
    }

    /// Builds the plugin with validation.
    ///
    /// Does not connect; see [`Plugin::connect`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if port, uuid or registration event is missing
    /// - [`Error::Config`] if the port is zero or the queue bound is zero
    pub fn build(self) -> Result<Plugin> {
        let port = self.validate_port()?;
        let handshake = self.validate_handshake()?;

        if self.max_queued == Some(0) {
            return Err(Error::config(
                "max_queued must be at least 1. Omit it for an unbounded queue.",
            ));
        }

        let options = ConnectionOptions {
            max_queued: self.max_queued,
        };

        Ok(Plugin::new(
            format!("ws://127.0.0.1:{port}"),
            handshake,
            self.info.unwrap_or_default(),
            self.document,
            options,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PluginBuilder {
    /// Validates the port configuration.
    fn validate_port(&self) -> Result<u16> {
        match self.port {
            None => Err(Error::config(
                "Host port is required. Use .port() or .launch_args() to set it.",
            )),
            Some(0) => Err(Error::config("Host port must not be 0.")),
            Some(port) => Ok(port),
        }
    }

    /// Validates the handshake configuration.
    fn validate_handshake(&self) -> Result<Handshake> {
        let uuid = self
            .uuid
            .clone()
            .filter(|uuid| !uuid.as_str().trim().is_empty())
            .ok_or_else(|| {
                Error::config("Plugin uuid is required. Use .uuid() or .launch_args() to set it.")
            })?;

        let register_event = self
            .register_event
            .clone()
            .filter(|event| !event.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "Registration event is required. \
                     Use .register_event() or .launch_args() to set it.",
                )
            })?;

        Ok(Handshake::new(register_event, uuid))
    }
}

// ============================================================================
// Tests
// ============================================================================
