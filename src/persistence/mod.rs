//! Local key-value persistence
//!
//! Progression, height records and settings are stored as small strings
//! (integers or JSON records) under fixed keys. Backends:
//! - [`MemoryStore`]: in-process, used by tests and headless runs
//! - [`JsonFileStore`]: one JSON object file (native)
//! - [`LocalStorageStore`]: browser LocalStorage (wasm32)
//!
//! Store failures never reach gameplay: callers log them and carry on.

mod store;

pub use store::{JsonFileStore, MemoryStore};
#[cfg(target_arch = "wasm32")]
pub use store::LocalStorageStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Storage keys
pub mod keys {
    pub const COINS: &str = "coins";
    pub const BEST_HEIGHT: &str = "bestHeight";
    pub const OWNED_SKINS: &str = "ownedSkins";
    pub const ACTIVE_SKIN: &str = "activeSkin";
    pub const PASS_LEVEL: &str = "passLevel";
    pub const PASS_XP: &str = "passXP";
    pub const CLAIMED_REWARDS: &str = "claimedRewards";
    pub const HEIGHT_RECORDS: &str = "heightRecords";
    pub const SETTINGS: &str = "settings";
}

/// Errors surfaced by a store backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value for `{key}` is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal string key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Read a JSON-encoded value; `Ok(None)` when the key is missing
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Write a JSON-encoded value
pub fn set_json<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Read a value, logging failures and falling back to `default`
pub fn load_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match get_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            log::warn!("Ignoring stored `{key}`: {e}");
            default
        }
    }
}

/// Write a value, logging (not propagating) failures
pub fn save_logged<T: Serialize + ?Sized>(store: &mut dyn KeyValueStore, key: &str, value: &T) {
    if let Err(e) = set_json(store, key, value) {
        log::warn!("Failed to persist `{key}`: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A store whose writes always fail
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_missing_key_uses_default() {
        let store = MemoryStore::new();
        assert_eq!(load_or(&store, keys::COINS, 0u64), 0);
    }

    #[test]
    fn test_malformed_value_uses_default() {
        let mut store = MemoryStore::new();
        store.set(keys::PASS_LEVEL, "not a number").unwrap();
        assert!(matches!(
            get_json::<u32>(&store, keys::PASS_LEVEL),
            Err(StorageError::Malformed { .. })
        ));
        assert_eq!(load_or(&store, keys::PASS_LEVEL, 1u32), 1);
    }

    #[test]
    fn test_round_trip_json_record() {
        let mut store = MemoryStore::new();
        set_json(&mut store, keys::OWNED_SKINS, &vec!["default", "gold"]).unwrap();
        let skins: Vec<String> = load_or(&store, keys::OWNED_SKINS, Vec::new());
        assert_eq!(skins, vec!["default".to_string(), "gold".to_string()]);
    }

    #[test]
    fn test_broken_store_never_panics() {
        let mut store = BrokenStore;
        save_logged(&mut store, keys::COINS, &5u64);
        assert_eq!(load_or(&store, keys::COINS, 7u64), 7);
    }
}
