//! Key/value persistence for agent history and presets.
//!
//! Backends implement the object-safe [`KeyValueStore`] over raw JSON text.
//! Callers use the blanket [`PersistentStore`] extension, which decodes into
//! typed values and falls back to the caller's default on any read or decode
//! failure.

mod memory;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteStore;

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Key holding the conversation history.
pub const HISTORY_KEY: &str = "agent.history";
/// Key holding the saved presets.
pub const PRESETS_KEY: &str = "agent.presets";

/// Raw storage backend.
pub trait KeyValueStore: Send + Sync {
    /// Load the stored text for `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Typed access on top of any [`KeyValueStore`].
pub trait PersistentStore: KeyValueStore {
    /// Decode the value under `key`, or return `default` if it is absent or unreadable.
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.load(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key, error = %e, "Stored value failed to decode, using default");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored value, using default");
                default
            }
        }
    }

    /// Serialize `value` and store it under `key`.
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.save(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> PersistentStore for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Preset;
    use std::sync::Arc;

    #[test]
    fn test_get_missing_returns_default() {
        let store = MemoryStore::new();
        let presets: Vec<Preset> = store.get(PRESETS_KEY, Vec::new());
        assert!(presets.is_empty());
        assert_eq!(store.get("missing", 42u32), 42);
    }

    #[test]
    fn test_set_then_get() {
        let store = MemoryStore::new();
        let preset = Preset::new("/status");
        store.set(PRESETS_KEY, &vec![preset.clone()]).unwrap();

        let loaded: Vec<Preset> = store.get(PRESETS_KEY, Vec::new());
        assert_eq!(loaded, vec![preset]);
    }

    #[test]
    fn test_decode_failure_returns_default() {
        let store = MemoryStore::new();
        store.save(HISTORY_KEY, "{not json").unwrap();
        let value: Vec<String> = store.get(HISTORY_KEY, vec!["fallback".to_string()]);
        assert_eq!(value, vec!["fallback".to_string()]);
    }

    #[test]
    fn test_shape_mismatch_returns_default() {
        let store = MemoryStore::new();
        store.set("count", &"seven").unwrap();
        assert_eq!(store.get("count", 0u32), 0);
    }

    #[test]
    fn test_works_through_trait_object() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("answer", &42).unwrap();
        assert_eq!(store.get("answer", 0), 42);
    }
}
