//! Echo plugin.
//!
//! Counts key presses per action instance, persists the count in the
//! instance settings and logs every lifecycle notification.
//!
//! The host starts it with its launch arguments:
//!
//! ```text
//! echo_plugin -port 28196 -pluginUUID ABC -registerEvent registerPlugin -info '{}'
//! ```
//!
//! Set `RUST_LOG=plugin_bridge=debug` for frame-level logging.

// ============================================================================
// Imports
// ============================================================================

use anyhow::{Context, Result};
use plugin_bridge::{ActionFilter, ContextId, LaunchArgs, Lifecycle, Plugin};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Action this plugin implements.
const COUNTER_ACTION: &str = "com.example.echo.counter";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plugin_bridge=info")),
        )
        .with_target(false)
        .init();

    let mut args = LaunchArgs::from_env().context("invalid launch arguments")?;
    if let Some(action) = args.take_action_info() {
        info!(
            action = %action.action,
            context = %action.context,
            "Launched for one action instance"
        );
    }

    let plugin = Plugin::builder().launch_args(args).build()?;

    for lifecycle in [
        Lifecycle::ConnectionOpened,
        Lifecycle::DocumentLoaded,
        Lifecycle::GlobalSettingsAvailable,
        Lifecycle::SetupReady,
        Lifecycle::ConnectionClosed,
    ] {
        plugin.on(lifecycle, move |params| {
            info!(notification = lifecycle.as_str(), %params, "Lifecycle");
        });
    }

    let handle = plugin.clone();
    plugin.register_event("keyDown", ActionFilter::exact(COUNTER_ACTION), move |_, frame| {
        let Some(context) = frame["context"].as_str().map(ContextId::from) else {
            return;
        };

        let count = handle
            .settings(&context)
            .and_then(|s| s["count"].as_u64())
            .unwrap_or(0)
            + 1;

        info!(%context, count, "Key pressed");
        handle.set_settings(context, serde_json::json!({ "count": count }));
        handle.log_message(format!("count is now {count}"));
    });

    plugin.register_event("didReceiveSettings", ActionFilter::Any, |action, frame| {
        info!(action, settings = %frame["payload"]["settings"], "Settings received");
    });

    plugin.run().await.context("host connection failed")?;
    Ok(())
}
