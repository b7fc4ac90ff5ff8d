//! Plugin runtime composition root.
//!
//! The [`Plugin`] owns one instance of each component and wires them
//! together:
//!
//! ```text
//!            ┌──────────────┐
//!            │ EventRouter  │◄─────────────┬───────────────┐
//!            └──────────────┘              │               │
//!                   ▲                      │               │
//!   ┌───────────────┴──────┐     ┌─────────┴────┐   ┌──────┴─────┐
//!   │ ReadinessCoordinator │◄────│  Dispatcher  │   │ Connection │
//!   └──────────────────────┘     └──────────────┘   └────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use plugin_bridge::{ActionFilter, LaunchArgs, Lifecycle, Plugin};
//!
//! # async fn example() -> plugin_bridge::Result<()> {
//! let plugin = Plugin::builder().launch_args(LaunchArgs::from_env()?).build()?;
//!
//! plugin.on(Lifecycle::SetupReady, |_| println!("ready"));
//! plugin.register_event("keyDown", ActionFilter::exact("com.foo.counter"), |_, frame| {
//!     println!("pressed: {}", frame["context"]);
//! });
//!
//! plugin.run().await
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::events::{
    ActionFilter, Dispatcher, DocumentStatus, EventRouter, Lifecycle, ReadinessCoordinator,
    ReadinessState,
};
use crate::identifiers::{ContextId, PluginUuid};
use crate::protocol::{Command, HostInfo};
use crate::settings::SettingsCache;
use crate::transport::{Connection, ConnectionOptions, ConnectionState, Handshake};

use super::builder::PluginBuilder;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the plugin.
pub(crate) struct PluginInner {
    /// Host endpoint.
    endpoint: String,
    /// Registration frame parameters.
    handshake: Handshake,
    /// Host environment.
    info: HostInfo,
    /// Subscriber table.
    router: Arc<EventRouter>,
    /// Lifecycle state machine.
    readiness: Arc<ReadinessCoordinator>,
    /// Latest settings from the host.
    settings: Arc<SettingsCache>,
    /// Transport.
    connection: Connection,
    /// Inbound frame handler.
    dispatcher: Dispatcher,
}

// ============================================================================
// Plugin
// ============================================================================

/// A plugin process connected (or about to connect) to its host.
///
/// Cheap to clone; clones share every component.
#[derive(Clone)]
pub struct Plugin {
    /// Shared inner state.
    pub(crate) inner: Arc<PluginInner>,
}

// ============================================================================
// Plugin - Display
// ============================================================================

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("endpoint", &self.inner.endpoint)
            .field("uuid", &self.inner.handshake.uuid)
            .field("connection", &self.inner.connection)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Plugin - Constructor
// ============================================================================

impl Plugin {
    /// Creates a configuration builder for the plugin.
    #[inline]
    #[must_use]
    pub fn builder() -> PluginBuilder {
        PluginBuilder::new()
    }

    /// Wires the components together.
    pub(crate) fn new(
        endpoint: String,
        handshake: Handshake,
        info: HostInfo,
        document: DocumentStatus,
        options: ConnectionOptions,
    ) -> Self {
        let router = Arc::new(EventRouter::new());
        let settings = Arc::new(SettingsCache::new());
        let readiness = Arc::new(ReadinessCoordinator::new(
            Arc::clone(&router),
            Arc::clone(&settings),
            document,
        ));
        let connection = Connection::new(Arc::clone(&router), Arc::clone(&readiness), options);
        let dispatcher = Dispatcher::new(
            Arc::clone(&router),
            Arc::clone(&readiness),
            Arc::clone(&settings),
        );

        debug!(endpoint = %endpoint, uuid = %handshake.uuid, ?document, "Plugin created");

        Self {
            inner: Arc::new(PluginInner {
                endpoint,
                handshake,
                info,
                router,
                readiness,
                settings,
                connection,
                dispatcher,
            }),
        }
    }
}

// ============================================================================
// Plugin - Accessors
// ============================================================================

impl Plugin {
    /// Returns the host endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Returns the instance identifier.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &PluginUuid {
        &self.inner.handshake.uuid
    }

    /// Returns the host environment.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &HostInfo {
        &self.inner.info
    }

    /// Returns the event router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.inner.router
    }

    /// Returns the settings cache.
    #[inline]
    #[must_use]
    pub fn settings_cache(&self) -> &Arc<SettingsCache> {
        &self.inner.settings
    }

    /// Returns a snapshot of the readiness flags.
    #[inline]
    #[must_use]
    pub fn readiness(&self) -> ReadinessState {
        self.inner.readiness.state()
    }

    /// Returns the transport state.
    #[inline]
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Returns the latest global settings.
    #[inline]
    #[must_use]
    pub fn global_settings(&self) -> Value {
        self.inner.settings.global()
    }

    /// Returns the latest settings of one action instance.
    #[inline]
    #[must_use]
    pub fn settings(&self, context: &ContextId) -> Option<Value> {
        self.inner.settings.settings(context)
    }
}

// ============================================================================
// Plugin - Subscriptions
// ============================================================================

impl Plugin {
    /// Subscribes to an inbound event, scoped by action.
    pub fn register_event<F>(
        &self,
        event_name: impl Into<String>,
        filter: ActionFilter,
        callback: F,
    ) where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.inner.router.register_event(event_name, filter, callback);
    }

    /// Subscribes to a lifecycle notification.
    pub fn on<F>(&self, lifecycle: Lifecycle, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on_lifecycle(lifecycle, callback);
    }

    /// Reports that the hosting document finished loading.
    ///
    /// Only needed when built with [`DocumentStatus::Loading`].
    pub fn mark_document_loaded(&self) {
        self.inner.readiness.set_document_ready();
    }
}

// ============================================================================
// Plugin - Lifecycle
// ============================================================================

impl Plugin {
    /// Connects to the host and completes the handshake.
    ///
    /// A document already loaded at construction is reported here, after
    /// subscribers had the chance to register.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Connection`] if the host cannot be reached
    /// - [`crate::Error::InvalidState`] if already connected
    pub async fn connect(&self) -> Result<()> {
        self.inner.readiness.apply_deferred();
        self.inner
            .connection
            .open(
                &self.inner.endpoint,
                &self.inner.handshake,
                self.inner.dispatcher.clone(),
            )
            .await?;

        info!(uuid = %self.inner.handshake.uuid, "Plugin registered with host");
        Ok(())
    }

    /// Connects, then waits until the host closes the connection.
    ///
    /// # Errors
    ///
    /// Same as [`Plugin::connect`].
    pub async fn run(&self) -> Result<()> {
        self.connect().await?;
        self.wait_closed().await;
        Ok(())
    }

    /// Resolves once the connection is closed.
    pub async fn wait_closed(&self) {
        self.inner.connection.wait_closed().await;
    }

    /// Closes the connection.
    pub fn close(&self) {
        self.inner.connection.shutdown();
    }
}

// ============================================================================
// Plugin - Outbound
// ============================================================================

impl Plugin {
    /// Sends `{event, ...data}`; queued until connected.
    pub fn send(&self, event: &str, data: Value) {
        self.inner.connection.send(event, data);
    }

    /// Sends a fixed-shape command.
    pub fn send_command(&self, command: Command) {
        self.inner
            .connection
            .send_command(command, &self.inner.handshake.uuid);
    }

    /// Persists settings for one action instance.
    pub fn set_settings(&self, context: ContextId, payload: Value) {
        self.inner.settings.set_settings(context.clone(), payload.clone());
        self.send_command(Command::SetSettings { context, payload });
    }

    /// Requests settings for one action instance.
    ///
    /// The answer arrives as a `didReceiveSettings` event.
    pub fn get_settings(&self, context: ContextId) {
        self.send_command(Command::GetSettings { context });
    }

    /// Persists global settings and updates the local cache.
    pub fn set_global_settings(&self, payload: Value) {
        self.inner.settings.set_global(payload.clone());
        self.send_command(Command::SetGlobalSettings { payload });
    }

    /// Requests global settings.
    ///
    /// The answer arrives as a `didReceiveGlobalSettings` event.
    pub fn get_global_settings(&self) {
        self.send_command(Command::GetGlobalSettings);
    }

    /// Asks the host to open a URL.
    pub fn open_url(&self, url: impl Into<String>) {
        self.send_command(Command::OpenUrl { url: url.into() });
    }

    /// Writes a line to the host's log.
    pub fn log_message(&self, message: impl Into<String>) {
        self.send_command(Command::LogMessage {
            message: message.into(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::transport::mock::MockHost;

    fn plugin_for(host: &MockHost, document: DocumentStatus) -> Plugin {
        Plugin::builder()
            .port(host.port)
            .uuid("UUID-1")
            .register_event("registerPlugin")
            .document_status(document)
            .build()
            .expect("build")
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let mut host = MockHost::start().await;
        let plugin = plugin_for(&host, DocumentStatus::Loaded);

        let log = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();
        for lifecycle in [
            Lifecycle::ConnectionOpened,
            Lifecycle::DocumentLoaded,
            Lifecycle::GlobalSettingsAvailable,
        ] {
            let log = Arc::clone(&log);
            plugin.on(lifecycle, move |_| log.lock().push(lifecycle));
        }
        let ready_log = Arc::clone(&log);
        plugin.on(Lifecycle::SetupReady, move |settings| {
            ready_log.lock().push(Lifecycle::SetupReady);
            let _ = ready_tx.send(settings.clone());
        });

        plugin.connect().await.expect("connect");

        assert_eq!(
            host.recv_json().await,
            json!({ "event": "registerPlugin", "uuid": "UUID-1" })
        );
        assert_eq!(
            host.recv_json().await,
            json!({ "event": "getGlobalSettings", "context": "UUID-1" })
        );

        host.send_text(
            r#"{"event":"didReceiveGlobalSettings","payload":{"settings":{"token":"abc"}}}"#,
        );

        timeout(Duration::from_secs(5), ready_rx.recv())
            .await
            .expect("setupReady in time")
            .expect("setupReady");

        let log = log.lock();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3], Lifecycle::SetupReady);
        assert_eq!(plugin.global_settings(), json!({ "token": "abc" }));
        assert!(plugin.readiness().is_setup_ready());
    }

    #[tokio::test]
    async fn test_loading_document_holds_setup_ready() {
        let host = MockHost::start().await;
        let plugin = plugin_for(&host, DocumentStatus::Loading);

        let (tx, mut rx) = mpsc::unbounded_channel();
        plugin.on(Lifecycle::GlobalSettingsAvailable, {
            let tx = tx.clone();
            move |_| {
                let _ = tx.send(Lifecycle::GlobalSettingsAvailable);
            }
        });
        plugin.on(Lifecycle::SetupReady, move |_| {
            let _ = tx.send(Lifecycle::SetupReady);
        });

        plugin.connect().await.expect("connect");
        host.send_text(r#"{"event":"didReceiveGlobalSettings","payload":{"settings":{}}}"#);

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("in time")
            .expect("notification");
        assert_eq!(first, Lifecycle::GlobalSettingsAvailable);
        assert!(!plugin.readiness().is_setup_ready());

        plugin.mark_document_loaded();
        assert_eq!(rx.recv().await, Some(Lifecycle::SetupReady));
    }

    #[tokio::test]
    async fn test_commands_before_connect_are_delivered_in_order() {
        let mut host = MockHost::start().await;
        let plugin = plugin_for(&host, DocumentStatus::Loaded);

        plugin.log_message("booting");
        plugin.set_settings(ContextId::from("ctx"), json!({ "n": 1 }));
        plugin.open_url("https://example.com");

        plugin.connect().await.expect("connect");
        plugin.get_settings(ContextId::from("ctx"));
        plugin.set_global_settings(json!({ "g": true }));

        let frames: Vec<Value> = [
            host.recv_json().await,
            host.recv_json().await,
            host.recv_json().await,
            host.recv_json().await,
            host.recv_json().await,
            host.recv_json().await,
            host.recv_json().await,
        ]
        .into();

        let events: Vec<&str> = frames
            .iter()
            .map(|f| f["event"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(
            events,
            vec![
                "registerPlugin",
                "logMessage",
                "setSettings",
                "openUrl",
                "getGlobalSettings",
                "getSettings",
                "setGlobalSettings",
            ]
        );
        assert_eq!(frames[1]["payload"]["message"], "booting");
        assert_eq!(
            frames[6],
            json!({ "event": "setGlobalSettings", "context": "UUID-1", "payload": { "g": true } })
        );

        assert_eq!(plugin.settings(&ContextId::from("ctx")), Some(json!({ "n": 1 })));
        assert_eq!(plugin.global_settings(), json!({ "g": true }));
    }

    #[tokio::test]
    async fn test_run_returns_when_host_closes() {
        let host = MockHost::start().await;
        let plugin = plugin_for(&host, DocumentStatus::Loaded);

        let closed = Arc::new(Mutex::new(false));
        let inner = Arc::clone(&closed);
        plugin.on(Lifecycle::ConnectionClosed, move |_| *inner.lock() = true);

        let runner = tokio::spawn({
            let plugin = plugin.clone();
            async move { plugin.run().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        host.close();

        timeout(Duration::from_secs(5), runner)
            .await
            .expect("run returns")
            .expect("join")
            .expect("run ok");

        assert!(*closed.lock());
        assert_eq!(plugin.connection_state(), ConnectionState::Closed);
    }
}
