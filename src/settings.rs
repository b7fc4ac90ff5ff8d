//! Settings cache.
//!
//! Holds the most recent global settings and per-context settings the
//! host delivered. The dispatcher writes, plugin code reads.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::identifiers::ContextId;

// ============================================================================
// SettingsCache
// ============================================================================

/// Latest settings delivered by the host.
///
/// Thread-safe; share it with `Arc`.
#[derive(Debug)]
pub struct SettingsCache {
    /// Global settings object.
    global: RwLock<Value>,
    /// Settings by action instance.
    contexts: RwLock<FxHashMap<ContextId, Value>>,
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsCache {
    /// Creates an empty cache. Global settings start as `{}`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: RwLock::new(Value::Object(Map::new())),
            contexts: RwLock::new(FxHashMap::default()),
        }
    }

    /// Returns a snapshot of the global settings.
    #[must_use]
    pub fn global(&self) -> Value {
        self.global.read().clone()
    }

    /// Returns one global settings entry.
    #[must_use]
    pub fn global_value(&self, key: &str) -> Option<Value> {
        self.global.read().get(key).cloned()
    }

    /// Replaces the global settings.
    pub fn set_global(&self, settings: Value) {
        *self.global.write() = settings;
    }

    /// Returns a snapshot of one context's settings.
    #[must_use]
    pub fn settings(&self, context: &ContextId) -> Option<Value> {
        self.contexts.read().get(context).cloned()
    }

    /// Replaces one context's settings.
    pub fn set_settings(&self, context: ContextId, settings: Value) {
        self.contexts.write().insert(context, settings);
    }

    /// Returns the number of contexts with cached settings.
    #[inline]
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
