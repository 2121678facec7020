//! Store backends

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StorageError};

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All keys in one JSON object file, rewritten on every `set`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or start) a store at `path`. A corrupt file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Save file {} is corrupt, starting fresh: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::info!("Opened save file {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            StorageError::Encode {
                key: "*".to_string(),
                source,
            }
        })?;
        // Write to a sibling temp file first so a crash never truncates the save
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Browser LocalStorage, namespaced with a key prefix
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore {
    prefix: String,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn storage(&self) -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StorageError::Unavailable("LocalStorage not available".into()))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?
            .get_item(&self.full_key(key))
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(&self.full_key(key), value)
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lava-climb-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);
        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store.set("coins", "42").unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("coins").unwrap().as_deref(), Some("42"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{ nope").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("coins").unwrap(), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_memory_store_overwrites() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    }
}
