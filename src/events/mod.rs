//! Event routing and lifecycle readiness.
//!
//! # Architecture
//!
//! ```text
//!   frame text ──► Dispatcher ──► EventRouter ──► subscribers
//!                     │               ▲
//!                     ▼               │ lifecycle notifications
//!               ReadinessCoordinator ─┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Inbound frame parsing and forwarding |
//! | `readiness` | Composite readiness state machine |
//! | `router` | Event name and action scoped fan-out |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound frame parsing and forwarding.
pub mod dispatcher;

/// Composite readiness state machine.
pub mod readiness;

/// Event name and action scoped fan-out.
pub mod router;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::Dispatcher;
pub use readiness::{DocumentStatus, ReadinessCoordinator, ReadinessState};
pub use router::{ActionFilter, EventCallback, EventRouter};

// ============================================================================
// Lifecycle
// ============================================================================

/// Notifications the runtime emits through the router.
///
/// Each is emitted with the wildcard action, so every subscriber of the
/// name receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Transport open and handshake sent. Fires once.
    ConnectionOpened,
    /// Transport closed. Fires once; never followed by a reconnect.
    ConnectionClosed,
    /// Hosting document loaded. Fires once.
    DocumentLoaded,
    /// Global settings received; params carry the settings. Fires once.
    GlobalSettingsAvailable,
    /// `connectionOpened`, `documentLoaded` and `globalSettingsAvailable`
    /// have all fired. Fires once.
    SetupReady,
}

impl Lifecycle {
    /// Returns the event name subscribers register under.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionOpened => "connectionOpened",
            Self::ConnectionClosed => "connectionClosed",
            Self::DocumentLoaded => "documentLoaded",
            Self::GlobalSettingsAvailable => "globalSettingsAvailable",
            Self::SetupReady => "setupReady",
        }
    }
}
