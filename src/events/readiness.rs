//! Composite readiness state machine.
//!
//! Three monotonic input flags drive four one-shot lifecycle
//! notifications:
//!
//! | Rule | Condition | Notification |
//! |------|-----------|--------------|
//! | 1 | connection ready | `connectionOpened` |
//! | 2 | document ready | `documentLoaded` |
//! | 3 | global settings ready | `globalSettingsAvailable` |
//! | 4 | rules 1-3 fired | `setupReady` |
//!
//! Rules are evaluated in that order after every flag mutation. Evaluation
//! is idempotent; each notification is latched before it is emitted.

// ============================================================================
// Imports
// ============================================================================

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tracing::{debug, trace};

use crate::settings::SettingsCache;

use super::{EventRouter, Lifecycle};

// ============================================================================
// DocumentStatus
// ============================================================================

/// Loading phase of the hosting document when the coordinator is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Still loading; readiness follows [`ReadinessCoordinator::set_document_ready`].
    Loading,
    /// Already loaded; readiness is applied on the next
    /// [`ReadinessCoordinator::apply_deferred`].
    #[default]
    Loaded,
}

// ============================================================================
// ReadinessState
// ============================================================================

/// Input flags and notification latches.
///
/// Flags only ever go from `false` to `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessState {
    /// Hosting document finished loading.
    pub document_ready: bool,
    /// Transport opened and handshake sent.
    pub connection_ready: bool,
    /// Global settings received from the host.
    pub global_settings_ready: bool,

    connection_opened_fired: bool,
    document_loaded_fired: bool,
    global_settings_fired: bool,
    setup_ready_fired: bool,

    /// Document was loaded at construction; flag not applied yet.
    document_deferred: bool,
}

impl ReadinessState {
    /// Returns `true` once `setupReady` has fired.
    #[inline]
    #[must_use]
    pub fn is_setup_ready(&self) -> bool {
        self.setup_ready_fired
    }

    /// Latches and returns the first notification that is due.
    fn next_notification(&mut self) -> Option<Lifecycle> {
        if self.connection_ready && !self.connection_opened_fired {
            self.connection_opened_fired = true;
            return Some(Lifecycle::ConnectionOpened);
        }

        if self.document_ready && !self.document_loaded_fired {
            self.document_loaded_fired = true;
            return Some(Lifecycle::DocumentLoaded);
        }

        if self.global_settings_ready && !self.global_settings_fired {
            self.global_settings_fired = true;
            return Some(Lifecycle::GlobalSettingsAvailable);
        }

        if self.connection_opened_fired
            && self.document_loaded_fired
            && self.global_settings_fired
            && !self.setup_ready_fired
        {
            self.setup_ready_fired = true;
            return Some(Lifecycle::SetupReady);
        }

        None
    }
}

// ============================================================================
// ReadinessCoordinator
// ============================================================================

/// Owns the readiness state and emits lifecycle notifications.
///
/// Notifications are emitted outside the state lock and serialized by a
/// re-entrant lock. A subscriber may set another flag from inside its
/// callback; the resulting notifications are emitted by the outer
/// evaluation once the current notification has reached every subscriber.
pub struct ReadinessCoordinator {
    /// Router notifications are emitted through.
    router: Arc<EventRouter>,
    /// Source of the `globalSettingsAvailable` payload.
    settings: Arc<SettingsCache>,
    /// Flags and latches.
    state: Mutex<ReadinessState>,
    /// Serializes emission across threads; `true` while this thread emits.
    emit_serial: ReentrantMutex<Cell<bool>>,
}

impl std::fmt::Debug for ReadinessCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessCoordinator")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ReadinessCoordinator {
    /// Creates a coordinator.
    ///
    /// A document that is already [`DocumentStatus::Loaded`] does not fire
    /// anything here; the flag waits for [`Self::apply_deferred`] so that
    /// subscribers registered after construction still observe it.
    #[must_use]
    pub fn new(
        router: Arc<EventRouter>,
        settings: Arc<SettingsCache>,
        document: DocumentStatus,
    ) -> Self {
        let state = ReadinessState {
            document_deferred: document == DocumentStatus::Loaded,
            ..ReadinessState::default()
        };

        Self {
            router,
            settings,
            state: Mutex::new(state),
            emit_serial: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Returns a snapshot of the flags and latches.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        *self.state.lock()
    }

    /// Applies a document flag deferred at construction.
    pub fn apply_deferred(&self) {
        self.set_flag("document_ready", |state| {
            if !state.document_deferred {
                return false;
            }
            state.document_deferred = false;
            state.document_ready = true;
            true
        });
    }

    /// Marks the hosting document as loaded.
    pub fn set_document_ready(&self) {
        self.set_flag("document_ready", |state| {
            state.document_deferred = false;
            !std::mem::replace(&mut state.document_ready, true)
        });
    }

    /// Marks the connection as open.
    pub fn set_connection_ready(&self) {
        self.set_flag("connection_ready", |state| {
            !std::mem::replace(&mut state.connection_ready, true)
        });
    }

    /// Marks global settings as received.
    pub fn set_global_settings_ready(&self) {
        self.set_flag("global_settings_ready", |state| {
            !std::mem::replace(&mut state.global_settings_ready, true)
        });
    }

    /// Applies a flag mutation, then evaluates the rules.
    fn set_flag(&self, flag: &'static str, mutate: impl FnOnce(&mut ReadinessState) -> bool) {
        let changed = mutate(&mut *self.state.lock());
        if changed {
            debug!(flag, "Readiness flag set");
        } else {
            trace!(flag, "Readiness flag unchanged");
        }
        self.evaluate();
    }

    /// Emits every notification that is due, in rule order.
    ///
    /// Re-entered from a subscriber, returns at once: the outer loop picks
    /// up whatever became due.
    fn evaluate(&self) {
        let serial = self.emit_serial.lock();
        if serial.get() {
            trace!("Evaluation deferred to outer emission");
            return;
        }
        let _emitting = EmittingGuard::enter(&serial);

        loop {
            let next = self.state.lock().next_notification();
            let Some(lifecycle) = next else {
                break;
            };

            let params = match lifecycle {
                Lifecycle::GlobalSettingsAvailable => self.settings.global(),
                _ => Value::Null,
            };

            debug!(notification = lifecycle.as_str(), "Lifecycle notification");
            self.router.emit(lifecycle, &params);
        }
    }
}

// ============================================================================
// EmittingGuard
// ============================================================================

/// Marks the current thread as emitting; cleared on drop, panics included.
struct EmittingGuard<'a>(&'a Cell<bool>);

impl<'a> EmittingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for EmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ============================================================================
// Tests
// ============================================================================
