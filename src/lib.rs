//! Plugin Bridge - Client-side runtime for WebSocket-hosted plugins.
//!
//! This library connects plugin code to a host application over a single
//! local WebSocket and turns the host's frames into scoped callbacks.
//!
//! # Architecture
//!
//! The runtime follows a client-server model:
//!
//! - **Plugin (Rust)**: Registers, sends commands, receives events via WebSocket
//! - **Host (Application)**: Issues launch arguments, emits events, stores settings
//!
//! Key design principles:
//!
//! - One [`Plugin`] owns: router + readiness coordinator + settings cache + connection
//! - The registration frame is always the first frame on the wire
//! - Frames sent before the connection opens are queued and flushed in order
//! - Subscriptions are scoped by event name and action, fired in registration order
//! - `setupReady` fires once, after connection, document and global settings
//!
//! # Quick Start
//!
//! ```no_run
//! use plugin_bridge::{ActionFilter, LaunchArgs, Lifecycle, Plugin, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let plugin = Plugin::builder()
//!         .launch_args(LaunchArgs::from_env()?)
//!         .build()?;
//!
//!     plugin.on(Lifecycle::SetupReady, |settings| {
//!         println!("global settings: {settings}");
//!     });
//!
//!     plugin.register_event("keyDown", ActionFilter::exact("com.foo.counter"), |_, frame| {
//!         println!("key down on {}", frame["context"]);
//!     });
//!
//!     plugin.run().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`events`] | [`EventRouter`], [`ReadinessCoordinator`], [`Dispatcher`] |
//! | [`plugin`] | [`Plugin`] composition root and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame types and commands |
//! | [`settings`] | Settings cache |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Event routing and lifecycle readiness.
///
/// - [`EventRouter`] - Event name and action scoped fan-out
/// - [`ReadinessCoordinator`] - One-shot lifecycle notifications
/// - [`Dispatcher`] - Inbound frame handling
pub mod events;

/// Plugin composition root.
///
/// Use [`Plugin::builder()`] to create a configured plugin instance.
pub mod plugin;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers issued by the host.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Latest settings delivered by the host.
pub mod settings;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Event types
pub use events::{
    ActionFilter, Dispatcher, DocumentStatus, EventRouter, Lifecycle, ReadinessCoordinator,
    ReadinessState,
};

// Plugin types
pub use plugin::{LaunchArgs, Plugin, PluginBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ActionId, ContextId, PluginUuid};

// Protocol types
pub use protocol::{ActionInfo, Command, HostInfo, InboundFrame};

// Settings
pub use settings::SettingsCache;

// Transport types
pub use transport::{Connection, ConnectionOptions, ConnectionState, Handshake};
