//! Pluggable persistence for pristine snapshots.
//!
//! The store writes its construction-time state under a per-store session
//! key and reads it back on reset. Adapters only need to be a keyed blob
//! store; the two built-ins cover the common cases.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Keyed persistence backend for pristine state snapshots.
///
/// Implementations decide how values survive between `set_item` and
/// `get_item`. A lossy backend is acceptable: the store treats a missing
/// snapshot as "nothing to reset to" rather than an error.
pub trait StorageAdapter {
    /// Read the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set_item(&mut self, key: &str, value: &Value);

    /// Delete the entry under `key`. Missing keys are a no-op.
    fn remove_item(&mut self, key: &str);
}

impl std::fmt::Debug for dyn StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StorageAdapter")
    }
}

/// In-process adapter holding the snapshot as a live value.
///
/// Each store owns its own adapter, so a single slot suffices; the key is
/// accepted and ignored.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Option<Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get_item(&self, _key: &str) -> Option<Value> {
        self.slot.clone()
    }

    fn set_item(&mut self, _key: &str, value: &Value) {
        self.slot = Some(value.clone());
    }

    fn remove_item(&mut self, _key: &str) {
        self.slot = None;
    }
}

/// Adapter that round-trips snapshots through JSON strings.
///
/// Mirrors string-valued session stores: every write serializes, every
/// read parses. Round-trip failures are logged and read back as absent,
/// never surfaced as errors.
#[derive(Debug, Default)]
pub struct SessionStorage {
    entries: HashMap<String, String>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the adapter holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageAdapter for SessionStorage {
    fn get_item(&self, key: &str) -> Option<Value> {
        let raw = self.entries.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(key, %error, "stored snapshot failed to parse");
                None
            }
        }
    }

    fn set_item(&mut self, key: &str, value: &Value) {
        match serde_json::to_string(value) {
            Ok(raw) => {
                self.entries.insert(key.to_owned(), raw);
            }
            Err(error) => {
                warn!(key, %error, "snapshot failed to serialize");
            }
        }
    }

    fn remove_item(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
