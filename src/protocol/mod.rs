//! WebSocket protocol message types.
//!
//! This module defines the frames exchanged between the plugin and the
//! host application.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Registration | Plugin → Host | Mandatory first frame, `{event: <registerEvent>, uuid}` |
//! | [`Command`] | Plugin → Host | Settings, URLs, log lines |
//! | [`InboundFrame`] | Host → Plugin | Events, optionally scoped to an action |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Fixed-shape outbound commands |
//! | `frame` | Inbound parsing and outbound construction |
//! | `info` | Launch-time host and action blobs |

// ============================================================================
// Submodules
// ============================================================================

/// Fixed-shape outbound commands.
pub mod command;

/// Frame parsing and construction.
pub mod frame;

/// Launch-time host and action blobs.
pub mod info;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use frame::{
    DID_RECEIVE_GLOBAL_SETTINGS, DID_RECEIVE_SETTINGS, InboundFrame, WILDCARD_ACTION, outbound,
    registration,
};
pub use info::{ActionInfo, ApplicationInfo, DeviceInfo, DeviceSize, HostInfo, PluginInfo};
