//! Inbound and outbound frame shapes.
//!
//! Every frame is a JSON object with an `event` field. Outbound frames are
//! built as `{event, ...data}`; inbound frames are parsed into an
//! [`InboundFrame`] view while the raw JSON is kept for subscribers.
//!
//! # Format
//!
//! ```json
//! {
//!   "event": "keyDown",
//!   "action": "com.foo.action1",
//!   "context": "opaque-context-id",
//!   "device": "device-id",
//!   "payload": { "settings": {} }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::{ContextId, PluginUuid};

// ============================================================================
// Constants
// ============================================================================

/// Inbound event carrying the plugin's global settings.
pub const DID_RECEIVE_GLOBAL_SETTINGS: &str = "didReceiveGlobalSettings";

/// Inbound event carrying one context's settings.
pub const DID_RECEIVE_SETTINGS: &str = "didReceiveSettings";

/// Action marker for frames that carry no action.
///
/// Subscriptions with any filter receive frames dispatched with this marker.
pub const WILDCARD_ACTION: &str = "*";

// ============================================================================
// InboundFrame
// ============================================================================

/// Typed view of an inbound frame.
///
/// Only `event` and `action` are interpreted. The remaining fields are kept
/// as opaque JSON, so a frame never fails to parse because of their shape.
/// Subscribers get the raw JSON unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Event name.
    pub event: String,

    /// Action the event is scoped to, absent on global events.
    #[serde(default)]
    pub action: Option<String>,

    /// Action instance the event targets.
    #[serde(default)]
    pub context: Option<Value>,

    /// Device the event originated from.
    #[serde(default)]
    pub device: Option<Value>,

    /// Event-specific data.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl InboundFrame {
    /// Parses frame text into a typed view plus the raw JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the text is not JSON, not an
    /// object, or lacks a string `event` field.
    pub fn parse(text: &str) -> Result<(Self, Value)> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| Error::malformed_frame(format!("invalid JSON: {e}")))?;

        if !raw.is_object() {
            return Err(Error::malformed_frame("frame is not a JSON object"));
        }

        let frame = Self::deserialize(&raw)
            .map_err(|e| Error::malformed_frame(format!("invalid frame: {e}")))?;

        Ok((frame, raw))
    }

    /// Returns the action to route by, or [`WILDCARD_ACTION`] when absent.
    #[inline]
    #[must_use]
    pub fn routing_action(&self) -> &str {
        self.action.as_deref().unwrap_or(WILDCARD_ACTION)
    }

    /// Returns `context` as an identifier, if it is a string.
    #[inline]
    #[must_use]
    pub fn context_id(&self) -> Option<ContextId> {
        self.context
            .as_ref()
            .and_then(Value::as_str)
            .map(ContextId::from)
    }

    /// Returns `payload.settings`, if present.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get("settings"))
    }
}

// ============================================================================
// Outbound Frames
// ============================================================================

/// Builds an outbound frame `{event, ...data}`.
///
/// `data` must be a JSON object or `null`. Other shapes are logged and
/// ignored; the `event` field is never overwritten by `data`.
#[must_use]
pub fn outbound(event: &str, data: Value) -> Value {
    let mut frame = Map::new();
    frame.insert("event".to_string(), Value::String(event.to_string()));

    match data {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "event" {
                    frame.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            warn!(event, data = %other, "Outbound data is not an object, ignoring");
        }
    }

    Value::Object(frame)
}

/// Builds the registration frame that opens every session.
#[inline]
#[must_use]
pub fn registration(register_event: &str, uuid: &PluginUuid) -> Value {
    outbound(register_event, json!({ "uuid": uuid }))
}

// ============================================================================
// Tests
// ============================================================================
