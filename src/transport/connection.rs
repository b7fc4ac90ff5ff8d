//! WebSocket connection to the host.
//!
//! This module owns the single transport of the process. Outgoing frames
//! are delivered in `send` order: frames sent before the transport opens
//! wait in a FIFO queue and are flushed right after the registration frame.
//! Frames sent once the transport is closed are dropped.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──open()──► Open ──close/error──► Closed (terminal)
//! ```
//!
//! # Tasks
//!
//! Opening spawns two tokio tasks:
//!
//! - Writer: drains an unbounded channel into the socket, so `send` never blocks
//! - Reader: hands each text frame to the [`Dispatcher`]

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::events::{Dispatcher, EventRouter, Lifecycle, ReadinessCoordinator};
use crate::identifiers::PluginUuid;
use crate::protocol::{self, Command};

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the socket.
type WsWrite = SplitSink<WsStream, Message>;

/// Read half of the socket.
type WsRead = SplitStream<WsStream>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not opened yet; frames are queued.
    Disconnected,
    /// Frames go straight to the writer.
    Open,
    /// Transport gone or shutting down; frames are dropped. Terminal.
    Closed,
}

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Tuning for the outgoing queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Maximum frames held while not open. `None` is unbounded.
    ///
    /// When full, the oldest queued frame is dropped.
    pub max_queued: Option<usize>,
}

// ============================================================================
// Handshake
// ============================================================================

/// Parameters of the registration frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Event name the host expects for registration.
    pub register_event: String,
    /// Instance identifier issued by the host.
    pub uuid: PluginUuid,
}

impl Handshake {
    /// Creates handshake parameters.
    #[inline]
    #[must_use]
    pub fn new(register_event: impl Into<String>, uuid: PluginUuid) -> Self {
        Self {
            register_event: register_event.into(),
            uuid,
        }
    }
}

// ============================================================================
// Internal Types
// ============================================================================

/// Commands for the writer task.
enum WriterCommand {
    /// Write a text frame.
    Frame(String),
    /// Send a close frame and stop.
    Shutdown,
}

/// State guarded by one lock so queueing and flushing cannot interleave.
struct Outbox {
    /// Transport state.
    state: ConnectionState,
    /// Frames waiting for the transport.
    queue: VecDeque<String>,
    /// Writer channel, present while open.
    writer: Option<mpsc::UnboundedSender<WriterCommand>>,
}

/// Shared connection state.
struct ConnectionInner {
    /// Queue, state and writer.
    outbox: Mutex<Outbox>,
    /// Set by the first `open` attempt in flight or completed.
    opening: AtomicBool,
    /// Queue tuning.
    options: ConnectionOptions,
    /// Receives `connectionClosed`.
    router: Arc<EventRouter>,
    /// Receives `connection_ready`.
    readiness: Arc<ReadinessCoordinator>,
    /// Flips to `true` once closed.
    closed: watch::Sender<bool>,
}

// ============================================================================
// Connection
// ============================================================================

/// The process-wide transport to the host.
///
/// Cheap to clone; clones share the same transport and queue.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. `send` never blocks and never fails.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outbox = self.inner.outbox.lock();
        f.debug_struct("Connection")
            .field("state", &outbox.state)
            .field("queued", &outbox.queue.len())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a disconnected connection.
    #[must_use]
    pub fn new(
        router: Arc<EventRouter>,
        readiness: Arc<ReadinessCoordinator>,
        options: ConnectionOptions,
    ) -> Self {
        let (closed, _) = watch::channel(false);

        Self {
            inner: Arc::new(ConnectionInner {
                outbox: Mutex::new(Outbox {
                    state: ConnectionState::Disconnected,
                    queue: VecDeque::new(),
                    writer: None,
                }),
                opening: AtomicBool::new(false),
                options,
                router,
                readiness,
                closed,
            }),
        }
    }

    /// Returns the transport state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.outbox.lock().state
    }

    /// Returns `true` while frames go straight to the transport.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the number of frames waiting for the transport.
    #[inline]
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.outbox.lock().queue.len()
    }

    /// Opens the transport and completes the handshake.
    ///
    /// In order: connects, writes the registration frame, flushes queued
    /// frames, requests global settings, then marks the connection ready.
    /// Inbound frames are handed to `dispatcher` from a spawned task.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the connection was already opened
    /// - [`Error::Config`] if `endpoint` is not a `ws://` or `wss://` URL
    /// - [`Error::Connection`] if the transport cannot be established
    pub async fn open(
        &self,
        endpoint: &str,
        handshake: &Handshake,
        dispatcher: Dispatcher,
    ) -> Result<()> {
        let registration = to_string(&protocol::registration(
            &handshake.register_event,
            &handshake.uuid,
        ))?;

        if self.inner.opening.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_state("connection already opened"));
        }

        let ws_stream = match Self::connect(endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                self.inner.opening.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(endpoint, "WebSocket connection established");

        let (ws_write, ws_read) = ws_stream.split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_writer(ws_write, writer_rx, Arc::clone(&self.inner)));

        // Registration and flush happen under the outbox lock so no
        // concurrent send can slip in ahead of queued frames.
        {
            let mut outbox = self.inner.outbox.lock();
            let _ = writer_tx.send(WriterCommand::Frame(registration));

            let flushed = outbox.queue.len();
            for frame in outbox.queue.drain(..) {
                let _ = writer_tx.send(WriterCommand::Frame(frame));
            }

            outbox.state = ConnectionState::Open;
            outbox.writer = Some(writer_tx);

            debug!(flushed, uuid = %handshake.uuid, "Handshake sent, queue flushed");
        }

        self.send_command(Command::GetGlobalSettings, &handshake.uuid);
        self.inner.readiness.set_connection_ready();

        tokio::spawn(Self::run_reader(ws_read, dispatcher, Arc::clone(&self.inner)));

        Ok(())
    }

    /// Sends `{event, ...data}`, queueing it while not open.
    ///
    /// `data` should be a JSON object or `null`.
    pub fn send(&self, event: &str, data: Value) {
        let frame = protocol::outbound(event, data);
        match to_string(&frame) {
            Ok(text) => self.send_text(text),
            Err(e) => warn!(event, error = %e, "Failed to serialize outbound frame"),
        }
    }

    /// Sends a fixed-shape command.
    pub fn send_command(&self, command: Command, uuid: &PluginUuid) {
        let event = command.event();
        self.send(event, command.into_data(uuid));
    }

    /// Sends a close frame and moves to `Closed` right away.
    ///
    /// `connectionClosed` is emitted here; the later remote close is not
    /// reported again. Does nothing unless the connection is open.
    pub fn shutdown(&self) {
        {
            let mut outbox = self.inner.outbox.lock();
            if outbox.state != ConnectionState::Open {
                debug!(state = ?outbox.state, "Shutdown ignored, connection not open");
                return;
            }

            if let Some(writer) = outbox.writer.take() {
                let _ = writer.send(WriterCommand::Shutdown);
            }
            outbox.state = ConnectionState::Closed;
        }

        Self::notify_closed(&self.inner);
    }

    /// Resolves once the connection is closed.
    pub async fn wait_closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Queues or writes one serialized frame.
    fn send_text(&self, text: String) {
        let mut outbox = self.inner.outbox.lock();

        if outbox.state == ConnectionState::Closed {
            warn!("Connection closed, frame dropped");
            return;
        }

        if outbox.state == ConnectionState::Open
            && let Some(ref writer) = outbox.writer
        {
            if writer.send(WriterCommand::Frame(text)).is_err() {
                warn!("Writer stopped, frame dropped");
            }
            return;
        }

        if let Some(max) = self.inner.options.max_queued
            && outbox.queue.len() >= max
        {
            if outbox.queue.pop_front().is_none() {
                warn!(max, "Queue bound is zero, frame dropped");
                return;
            }
            warn!(max, "Outgoing queue full, dropped oldest frame");
        }

        outbox.queue.push_back(text);
        trace!(state = ?outbox.state, queued = outbox.queue.len(), "Frame queued");
    }

    /// Validates the endpoint and performs the WebSocket handshake.
    async fn connect(endpoint: &str) -> Result<WsStream> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid endpoint {endpoint:?}: {e}")))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "endpoint must use ws:// or wss://, got {endpoint:?}"
            )));
        }

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect to {url} failed: {e}")))?;

        Ok(ws_stream)
    }

    /// Writer task: drains the channel into the socket.
    async fn run_writer(
        mut ws_write: WsWrite,
        mut writer_rx: mpsc::UnboundedReceiver<WriterCommand>,
        inner: Arc<ConnectionInner>,
    ) {
        while let Some(command) = writer_rx.recv().await {
            match command {
                WriterCommand::Frame(text) => {
                    if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                        error!(error = %e, "WebSocket write failed");
                        Self::mark_closed(&inner);
                        break;
                    }
                }

                WriterCommand::Shutdown => {
                    debug!("Shutdown requested");
                    let _ = ws_write.close().await;
                    break;
                }
            }
        }

        debug!("Writer task terminated");
    }

    /// Reader task: hands each text frame to the dispatcher.
    async fn run_reader(mut ws_read: WsRead, dispatcher: Dispatcher, inner: Arc<ConnectionInner>) {
        loop {
            match ws_read.next().await {
                Some(Ok(Message::Text(text))) => {
                    dispatcher.handle_text(&text);
                }

                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by host");
                    break;
                }

                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }

                None => {
                    debug!("WebSocket stream ended");
                    break;
                }

                // Ignore Binary, Ping, Pong
                Some(Ok(_)) => {}
            }
        }

        Self::mark_closed(&inner);
        debug!("Reader task terminated");
    }

    /// Moves to `Closed` and emits `connectionClosed`, once.
    fn mark_closed(inner: &Arc<ConnectionInner>) {
        {
            let mut outbox = inner.outbox.lock();
            if outbox.state == ConnectionState::Closed {
                return;
            }
            outbox.state = ConnectionState::Closed;
            outbox.writer = None;
            outbox.queue.clear();
        }

        Self::notify_closed(inner);
    }

    /// Reports the transition to `Closed`. Called once, by whoever made it.
    fn notify_closed(inner: &Arc<ConnectionInner>) {
        info!("Connection closed");
        inner.closed.send_replace(true);
        inner.router.emit(Lifecycle::ConnectionClosed, &Value::Null);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use crate::events::{ActionFilter, DocumentStatus};
    use crate::settings::SettingsCache;
    use crate::transport::mock::MockHost;

    struct Fixture {
        connection: Connection,
        router: Arc<EventRouter>,
        readiness: Arc<ReadinessCoordinator>,
        dispatcher: Dispatcher,
    }

    fn fixture(options: ConnectionOptions) -> Fixture {
        let router = Arc::new(EventRouter::new());
        let settings = Arc::new(SettingsCache::new());
        let readiness = Arc::new(ReadinessCoordinator::new(
            Arc::clone(&router),
            Arc::clone(&settings),
            DocumentStatus::Loading,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&router),
            Arc::clone(&readiness),
            settings,
        );
        let connection = Connection::new(Arc::clone(&router), Arc::clone(&readiness), options);

        Fixture {
            connection,
            router,
            readiness,
            dispatcher,
        }
    }

    fn handshake() -> Handshake {
        Handshake::new("registerPlugin", PluginUuid::new("UUID-1"))
    }

    #[test]
    fn test_send_while_disconnected_queues() {
        let f = fixture(ConnectionOptions::default());
        f.connection.send("a", json!({}));
        f.connection.send("b", json!({}));

        assert_eq!(f.connection.state(), ConnectionState::Disconnected);
        assert_eq!(f.connection.queued_len(), 2);
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let f = fixture(ConnectionOptions {
            max_queued: Some(2),
        });
        f.connection.send("first", json!({}));
        f.connection.send("second", json!({}));
        f.connection.send("third", json!({}));

        let queue: Vec<Value> = f
            .connection
            .inner
            .outbox
            .lock()
            .queue
            .iter()
            .map(|t| serde_json::from_str(t).unwrap())
            .collect();
        assert_eq!(queue, vec![json!({"event": "second"}), json!({"event": "third"})]);
    }

    #[test]
    fn test_zero_bound_drops_everything() {
        let f = fixture(ConnectionOptions {
            max_queued: Some(0),
        });
        f.connection.send("first", json!({}));
        assert_eq!(f.connection.queued_len(), 0);
    }

    #[test]
    fn test_wait_closed_resolves_once_closed() {
        let f = fixture(ConnectionOptions::default());
        let mut wait = tokio_test::task::spawn(f.connection.wait_closed());
        tokio_test::assert_pending!(wait.poll());

        Connection::mark_closed(&f.connection.inner);
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
        assert_eq!(f.connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_send_after_close_is_dropped() {
        let f = fixture(ConnectionOptions::default());
        f.connection.send("queued", json!({}));

        Connection::mark_closed(&f.connection.inner);
        assert_eq!(f.connection.queued_len(), 0);

        f.connection.send("late", json!({}));
        f.connection.send("later", json!({}));
        assert_eq!(f.connection.queued_len(), 0);
    }

    #[test]
    fn test_shutdown_before_open_is_noop() {
        let f = fixture(ConnectionOptions::default());
        f.connection.send("queued", json!({}));
        f.connection.shutdown();

        assert_eq!(f.connection.state(), ConnectionState::Disconnected);
        assert_eq!(f.connection.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_fifo_delivery_with_handshake_first() {
        let mut host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        f.connection.send("one", json!({ "n": 1 }));
        f.connection.send("two", json!({ "n": 2 }));
        f.connection.send("three", json!({ "n": 3 }));

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");
        f.connection.send("after", json!({ "n": 4 }));

        assert_eq!(
            host.recv_json().await,
            json!({ "event": "registerPlugin", "uuid": "UUID-1" })
        );
        assert_eq!(host.recv_json().await, json!({ "event": "one", "n": 1 }));
        assert_eq!(host.recv_json().await, json!({ "event": "two", "n": 2 }));
        assert_eq!(host.recv_json().await, json!({ "event": "three", "n": 3 }));
        assert_eq!(
            host.recv_json().await,
            json!({ "event": "getGlobalSettings", "context": "UUID-1" })
        );
        assert_eq!(host.recv_json().await, json!({ "event": "after", "n": 4 }));

        assert!(f.connection.is_open());
        assert_eq!(f.connection.queued_len(), 0);
        assert!(f.readiness.state().connection_ready);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_send_during_open_keeps_order() {
        let mut host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        for n in 0..10u64 {
            f.connection.send("queued", json!({ "n": n }));
        }

        let sender = {
            let connection = f.connection.clone();
            tokio::spawn(async move {
                let mut sent = 0u64;
                let mut after_open = 0;
                while after_open < 50 && sent < 100_000 {
                    if connection.is_open() {
                        after_open += 1;
                    }
                    connection.send("concurrent", json!({ "n": sent }));
                    sent += 1;
                    tokio::task::yield_now().await;
                }
                sent
            })
        };

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");
        let sent = sender.await.expect("sender task");

        assert_eq!(
            host.recv_json().await,
            json!({ "event": "registerPlugin", "uuid": "UUID-1" })
        );

        let mut queued = Vec::new();
        let mut concurrent = Vec::new();
        let mut global_requests = 0;
        while (concurrent.len() as u64) < sent || global_requests == 0 {
            let frame = host.recv_json().await;
            let n = frame["n"].as_u64();
            match frame["event"].as_str() {
                Some("queued") => {
                    assert!(concurrent.is_empty(), "queued frame after a concurrent one");
                    queued.extend(n);
                }
                Some("concurrent") => concurrent.extend(n),
                Some("getGlobalSettings") => global_requests += 1,
                other => panic!("unexpected frame {other:?}"),
            }
        }

        assert_eq!(queued, (0..10).collect::<Vec<u64>>());
        assert_eq!(concurrent, (0..sent).collect::<Vec<u64>>());
        assert_eq!(global_requests, 1);
        assert_eq!(f.connection.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_open_twice_is_invalid() {
        let host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");

        let err = f
            .connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let f = fixture(ConnectionOptions::default());
        let err = f
            .connection
            .open(&format!("ws://127.0.0.1:{port}"), &handshake(), f.dispatcher.clone())
            .await
            .unwrap_err();

        assert!(err.is_connection_error());
        assert_eq!(f.connection.state(), ConnectionState::Disconnected);
        assert!(!f.readiness.state().connection_ready);
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_endpoint() {
        let f = fixture(ConnectionOptions::default());
        let err = f
            .connection
            .open("http://127.0.0.1:1", &handshake(), f.dispatcher.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_host_close_emits_connection_closed_once() {
        let mut host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        let closed = Arc::new(Mutex::new(0));
        let inner = Arc::clone(&closed);
        f.router
            .on_lifecycle(Lifecycle::ConnectionClosed, move |_| *inner.lock() += 1);

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");
        host.recv_json().await;

        host.close();
        timeout(Duration::from_secs(5), f.connection.wait_closed())
            .await
            .expect("closed in time");

        assert_eq!(f.connection.state(), ConnectionState::Closed);
        assert_eq!(*closed.lock(), 1);
        assert!(f.readiness.state().connection_ready);

        f.connection.send("late", json!({}));
        assert_eq!(f.connection.queued_len(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection() {
        let host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        let closed = Arc::new(Mutex::new(0));
        let inner = Arc::clone(&closed);
        f.router
            .on_lifecycle(Lifecycle::ConnectionClosed, move |_| *inner.lock() += 1);

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");
        f.connection.shutdown();

        assert_eq!(f.connection.state(), ConnectionState::Closed);
        assert_eq!(*closed.lock(), 1);

        f.connection.send("late", json!({}));
        assert_eq!(f.connection.queued_len(), 0);

        timeout(Duration::from_secs(5), f.connection.wait_closed())
            .await
            .expect("closed in time");

        f.connection.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*closed.lock(), 1);
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_subscribers() {
        let host = MockHost::start().await;
        let f = fixture(ConnectionOptions::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        f.router
            .register_event("keyDown", ActionFilter::exact("com.foo.action1"), move |_, frame| {
                let _ = tx.send(frame.clone());
            });

        f.connection
            .open(&host.url, &handshake(), f.dispatcher.clone())
            .await
            .expect("open");

        host.send_text("garbage");
        host.send_text(r#"{"event":"keyDown","action":"com.foo.action2"}"#);
        host.send_text(r#"{"event":"keyDown","action":"com.foo.action1","context":"c"}"#);

        let frame = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("frame in time")
            .expect("frame");
        assert_eq!(frame["context"], "c");
    }
}
