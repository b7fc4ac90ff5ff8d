//! Error types for the plugin bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use plugin_bridge::{Plugin, Result};
//!
//! async fn example(plugin: &Plugin) -> Result<()> {
//!     plugin.connect().await?;
//!     plugin.log_message("connected");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::InvalidState`] |
//! | Protocol | [`Error::InvalidArgument`], [`Error::MalformedFrame`] |
//! | External | [`Error::Json`] |
//!
//! Sending while disconnected is never an error: frames are queued.
//! A closed transport is reported through the `connectionClosed`
//! notification, not as an error.
//! A readiness notification that never fires is a stall, not an error.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when launch arguments or builder configuration are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the transport to the host cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation not valid in the current connection state.
    ///
    /// Returned when `open` is called on a connection that was already opened.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state violation.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Invalid argument.
    ///
    /// Returned when an action filter of the wrong shape is supplied.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Inbound frame could not be parsed.
    ///
    /// The dispatcher logs and drops these; they never stop the read loop.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this error is local to a single frame.
    ///
    /// Recoverable errors never affect subsequent frames.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. } | Self::Json(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
