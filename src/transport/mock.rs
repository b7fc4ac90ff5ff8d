//! In-process host used by tests.
//!
//! Accepts one WebSocket connection on `127.0.0.1:0`, records every text
//! frame the plugin sends, and sends whatever the test asks it to.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// Constants
// ============================================================================

/// How long a test waits for the next frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// MockHost
// ============================================================================

/// A single-connection WebSocket host.
pub(crate) struct MockHost {
    /// Endpoint to open, `ws://127.0.0.1:{port}`.
    pub url: String,
    /// Bound port.
    pub port: u16,
    /// Frames received from the plugin.
    received: mpsc::UnboundedReceiver<String>,
    /// Messages to send to the plugin.
    outgoing: mpsc::UnboundedSender<Message>,
}

impl MockHost {
    /// Binds a random port and starts accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock host");
        let port = listener.local_addr().expect("local addr").port();

        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws_stream) = accept_async(stream).await else {
                return;
            };
            let (mut ws_write, mut ws_read) = ws_stream.split();

            loop {
                tokio::select! {
                    message = ws_read.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let _ = received_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },

                    message = outgoing_rx.recv() => match message {
                        Some(message) => {
                            let is_close = matches!(message, Message::Close(_));
                            if ws_write.send(message).await.is_err() || is_close {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{port}"),
            port,
            received,
            outgoing,
        }
    }

    /// Waits for the next frame from the plugin and parses it.
    pub async fn recv_json(&mut self) -> Value {
        let text = timeout(RECV_TIMEOUT, self.received.recv())
            .await
            .expect("frame within timeout")
            .expect("host still running");
        serde_json::from_str(&text).expect("plugin sent JSON")
    }

    /// Sends a text frame to the plugin.
    pub fn send_text(&self, text: &str) {
        let _ = self.outgoing.send(Message::Text(text.to_string().into()));
    }

    /// Sends a close frame and drops the socket.
    pub fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}
