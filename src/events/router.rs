//! Event name and action scoped fan-out.
//!
//! Subscriptions are kept per event name in registration order. The action
//! filter is captured inside each subscription's wrapper when it is
//! registered; [`EventRouter::call_events`] hands every wrapper the action
//! and the wrapper decides whether its callback runs.
//!
//! # Filtering
//!
//! | Inbound action | `ActionFilter::Any` | `ActionFilter::Exact(a)` |
//! |----------------|---------------------|--------------------------|
//! | absent (`"*"`) | fires | fires |
//! | `a` | fires | fires |
//! | `b` | fires | skipped |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::ActionId;
use crate::protocol::WILDCARD_ACTION;

use super::Lifecycle;

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback.
///
/// Receives the routing action (or `"*"` for global events) and the
/// event params, which for inbound frames is the whole raw frame.
pub type EventCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

// ============================================================================
// ActionFilter
// ============================================================================

/// Which actions a subscription cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionFilter {
    /// Every action.
    Any,
    /// One specific action.
    Exact(ActionId),
}

impl ActionFilter {
    /// Creates a filter for one action.
    #[inline]
    #[must_use]
    pub fn exact(action: impl Into<ActionId>) -> Self {
        Self::Exact(action.into())
    }

    /// Parses a filter; `"*"` is the wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty filter or one
    /// containing whitespace.
    pub fn parse(filter: &str) -> Result<Self> {
        if filter == WILDCARD_ACTION {
            return Ok(Self::Any);
        }

        if filter.is_empty() {
            return Err(Error::invalid_argument("action filter must not be empty"));
        }

        if filter.chars().any(char::is_whitespace) {
            return Err(Error::invalid_argument(format!(
                "action filter must not contain whitespace: {filter:?}"
            )));
        }

        Ok(Self::Exact(ActionId::new(filter)))
    }

    /// Returns `true` if a subscription with this filter fires for `action`.
    ///
    /// Global events (routed with `"*"`) reach every filter.
    #[inline]
    #[must_use]
    pub fn matches(&self, action: &str) -> bool {
        if action == WILDCARD_ACTION {
            return true;
        }

        match self {
            Self::Any => true,
            Self::Exact(expected) => expected.as_str() == action,
        }
    }
}

impl FromStr for ActionFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ActionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD_ACTION),
            Self::Exact(action) => f.write_str(action.as_str()),
        }
    }
}

// ============================================================================
// EventRouter
// ============================================================================

/// Maps event names to ordered subscriptions.
///
/// Subscriptions are permanent. Callbacks run outside the table lock, so a
/// callback may register further subscriptions; those take effect from the
/// next call.
#[derive(Default)]
pub struct EventRouter {
    /// Wrapped callbacks by event name.
    table: RwLock<FxHashMap<String, Vec<EventCallback>>>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        f.debug_struct("EventRouter")
            .field("events", &table.len())
            .field(
                "subscriptions",
                &table.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl EventRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscription for `event_name`.
    pub fn register_event<F>(
        &self,
        event_name: impl Into<String>,
        filter: ActionFilter,
        callback: F,
    ) where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        trace!(event = %event_name, %filter, "Subscription registered");

        let wrapper: EventCallback = Arc::new(move |action, params| {
            if filter.matches(action) {
                callback(action, params);
            }
        });

        self.table
            .write()
            .entry(event_name)
            .or_default()
            .push(wrapper);
    }

    /// Appends a subscription, parsing the filter from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the filter is malformed.
    pub fn register_event_str<F>(
        &self,
        event_name: impl Into<String>,
        filter: &str,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let filter = ActionFilter::parse(filter)?;
        self.register_event(event_name, filter, callback);
        Ok(())
    }

    /// Subscribes to a lifecycle notification.
    pub fn on_lifecycle<F>(&self, lifecycle: Lifecycle, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register_event(lifecycle.as_str(), ActionFilter::Any, move |_, params| {
            callback(params)
        });
    }

    /// Invokes every subscription for `event_name` in registration order.
    ///
    /// Each subscription's filter decides whether its callback runs.
    pub fn call_events(&self, event_name: &str, action: &str, params: &Value) {
        let wrappers = match self.table.read().get(event_name) {
            Some(wrappers) => wrappers.clone(),
            None => {
                trace!(event = event_name, "No subscriptions");
                return;
            }
        };

        trace!(event = event_name, action, count = wrappers.len(), "Dispatching event");

        for wrapper in &wrappers {
            wrapper(action, params);
        }
    }

    /// Emits a lifecycle notification to every subscriber of it.
    #[inline]
    pub fn emit(&self, lifecycle: Lifecycle, params: &Value) {
        self.call_events(lifecycle.as_str(), WILDCARD_ACTION, params);
    }

    /// Returns the number of subscriptions for `event_name`.
    #[must_use]
    pub fn subscription_count(&self, event_name: &str) -> usize {
        self.table.read().get(event_name).map_or(0, Vec::len)
    }
}

// ============================================================================
// Tests
// ============================================================================
