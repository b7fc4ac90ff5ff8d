//! Inbound frame handling.
//!
//! Turns raw frame text into router calls. Settings frames update the
//! [`SettingsCache`] first; the global settings frame additionally flips
//! the readiness flag before subscribers see the frame.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::Result;
use crate::protocol::{DID_RECEIVE_GLOBAL_SETTINGS, DID_RECEIVE_SETTINGS, InboundFrame};
use crate::settings::SettingsCache;

use super::{EventRouter, ReadinessCoordinator};

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes inbound frames to subscribers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Subscriber table.
    router: Arc<EventRouter>,
    /// Receives the global settings signal.
    readiness: Arc<ReadinessCoordinator>,
    /// Receives settings payloads.
    settings: Arc<SettingsCache>,
}

impl Dispatcher {
    /// Creates a dispatcher over shared components.
    #[must_use]
    pub fn new(
        router: Arc<EventRouter>,
        readiness: Arc<ReadinessCoordinator>,
        settings: Arc<SettingsCache>,
    ) -> Self {
        Self {
            router,
            readiness,
            settings,
        }
    }

    /// Handles one frame, logging and dropping it if malformed.
    ///
    /// Never fails; a bad frame does not affect the next one.
    pub fn handle_text(&self, text: &str) {
        if let Err(e) = self.dispatch(text) {
            warn!(error = %e, text = %text, "Dropping inbound frame");
        }
    }

    /// Handles one frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedFrame`] if the text does not parse.
    /// Nothing is dispatched in that case.
    pub fn dispatch(&self, text: &str) -> Result<()> {
        let (frame, raw) = InboundFrame::parse(text)?;

        match frame.event.as_str() {
            DID_RECEIVE_GLOBAL_SETTINGS => {
                match frame.settings() {
                    Some(settings) => self.settings.set_global(settings.clone()),
                    None => warn!("Global settings frame without payload.settings"),
                }
                self.readiness.set_global_settings_ready();
            }

            DID_RECEIVE_SETTINGS => {
                match (frame.context_id(), frame.settings()) {
                    (Some(context), Some(settings)) => {
                        self.settings.set_settings(context, settings.clone());
                    }
                    _ => warn!("Settings frame without string context or payload.settings"),
                }
            }

            _ => {}
        }

        trace!(event = %frame.event, action = frame.routing_action(), "Inbound frame");
        self.router
            .call_events(&frame.event, frame.routing_action(), &raw);

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
