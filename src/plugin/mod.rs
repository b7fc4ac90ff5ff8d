//! Plugin entry point.
//!
//! This module provides the composition root that owns the router,
//! readiness coordinator, settings cache and connection.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Plugin`] | Runtime handle: subscriptions, lifecycle, outbound commands |
//! | [`PluginBuilder`] | Fluent configuration builder |
//! | [`LaunchArgs`] | Host-supplied launch arguments |
//!
//! # Example
//!
//! ```no_run
//! use plugin_bridge::{LaunchArgs, Plugin, Result};
//!
//! # async fn example() -> Result<()> {
//! let plugin = Plugin::builder()
//!     .launch_args(LaunchArgs::from_env()?)
//!     .build()?;
//!
//! plugin.run().await
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Host-supplied launch arguments.
pub mod args;

/// Fluent builder pattern for plugin configuration.
pub mod builder;

/// Core plugin implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use args::LaunchArgs;
pub use builder::PluginBuilder;
pub use core::Plugin;
