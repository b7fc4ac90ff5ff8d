//! WebSocket transport layer.
//!
//! This module handles the single connection between the plugin and the
//! host application.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Plugin (Rust)  │                              │  Host           │
//! │                 │         WebSocket            │  Application    │
//! │  Connection     │─────────────────────────────►│                 │
//! │  → Dispatcher   │      127.0.0.1:PORT          │  WebSocket      │
//! │                 │                              │  Server         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Disconnected; `send` queues frames
//! 2. `Connection::open` - Connect, register, flush queue, request global settings
//! 3. Inbound frames flow to the `Dispatcher`
//! 4. Host closes (or `Connection::shutdown`) - `connectionClosed`, terminal
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection, outgoing queue, reader/writer tasks |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection, outgoing queue, reader/writer tasks.
pub mod connection;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionOptions, ConnectionState, Handshake};
