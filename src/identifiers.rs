//! Type-safe identifiers issued by the host.
//!
//! Newtype wrappers prevent passing a context where the plugin
//! instance identifier is expected, and vice versa.
//!
//! | Type | Issued for |
//! |------|------------|
//! | [`PluginUuid`] | This plugin process (handshake `uuid`) |
//! | [`ContextId`] | One active instance of an action |
//! | [`ActionId`] | A plugin-defined action (e.g. `com.foo.action1`) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Macro
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// ============================================================================
// Identifiers
// ============================================================================

string_id!(
    /// Instance identifier the host assigns to this plugin process.
    ///
    /// Sent in the registration frame and used as the `context` of
    /// global settings requests.
    PluginUuid
);

string_id!(
    /// Identifier of one active instance of an action.
    ContextId
);

string_id!(
    /// Identifier of a plugin-defined action.
    ActionId
);

// ============================================================================
// Tests
// ============================================================================
