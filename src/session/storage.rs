//! Key/value storage seam standing in for the browser's `localStorage`.
//!
//! Every write replaces a whole key, so a concurrent reader sees either the
//! previous value or the new one. Writers broadcast a [`StorageEvent`] tagged
//! with their origin; listeners skip their own events the same way a browser
//! only fires `storage` in the *other* tabs.

use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access storage file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage file {path} is not a JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A change observed on a storage key. `new_value` is `None` on removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub origin: u64,
}

pub trait Storage: Send + Sync {
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    /// Identifier of this handle, carried by the events it emits.
    fn origin(&self) -> u64;
}

struct Shared {
    items: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    next_origin: AtomicU64,
}

/// In-memory storage. Handles returned by [`MemoryStorage::open_tab`] share
/// the same items and event channel but have their own origin, which is how
/// cross-tab logout is exercised without a browser.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
    origin: u64,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(BTreeMap::new()),
                events,
                next_origin: AtomicU64::new(2),
            }),
            origin: 1,
        }
    }

    /// Another handle on the same storage, as seen from a different tab.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: self.shared.next_origin.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn emit(&self, key: &str, new_value: Option<String>) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.shared.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin: self.origin,
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self
            .shared
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let changed = {
            let mut items = self
                .shared
                .items
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            items.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            self.emit(key, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let existed = {
            let mut items = self
                .shared
                .items
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            items.remove(key).is_some()
        };
        if existed {
            self.emit(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.shared.events.subscribe()
    }

    fn origin(&self) -> u64 {
        self.origin
    }
}

/// Storage persisted as a flat JSON object, used by the CLI between runs.
/// Writes go to a sibling temp file that is renamed over the original.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            events,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let value: BTreeMap<String, Value> =
            serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        // Non-string values are kept as their JSON text, like localStorage would.
        Ok(value
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect())
    }

    fn store(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let payload =
            serde_json::to_vec_pretty(items).map_err(|source| StorageError::Encode {
                key: self.path.display().to_string(),
                source,
            })?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, payload).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), keys = items.len(), "storage file written");
        Ok(())
    }

    fn emit(&self, key: &str, new_value: Option<String>) {
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin: 0,
        });
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut items = self.load()?;
            items.insert(key.to_string(), value.to_string());
            self.store(&items)?;
        }
        self.emit(key, Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let existed = {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut items = self.load()?;
            let existed = items.remove(key).is_some();
            if existed {
                self.store(&items)?;
            }
            existed
        };
        if existed {
            self.emit(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn origin(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("multibpo-{}-{name}.json", ulid::Ulid::new()))
    }

    #[test]
    fn memory_storage_round_trips_values() -> Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("missing")?, None);

        storage.set_item("key", "value")?;
        assert_eq!(storage.get_item("key")?, Some("value".to_string()));

        storage.remove_item("key")?;
        assert_eq!(storage.get_item("key")?, None);
        Ok(())
    }

    #[test]
    fn tabs_share_items_but_not_origin() -> Result<()> {
        let first = MemoryStorage::new();
        let second = first.open_tab();

        first.set_item("shared", "1")?;
        assert_eq!(second.get_item("shared")?, Some("1".to_string()));
        assert_ne!(first.origin(), second.origin());
        Ok(())
    }

    #[test]
    fn events_carry_origin_and_skip_noops() -> Result<()> {
        let first = MemoryStorage::new();
        let second = first.open_tab();
        let mut events = second.subscribe();

        first.set_item("k", "v")?;
        first.set_item("k", "v")?;
        first.remove_item("k")?;
        first.remove_item("k")?;

        let set = events.try_recv()?;
        assert_eq!(set.key, "k");
        assert_eq!(set.new_value, Some("v".to_string()));
        assert_eq!(set.origin, first.origin());

        let removed = events.try_recv()?;
        assert_eq!(removed.new_value, None);
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn file_storage_persists_between_handles() -> Result<()> {
        let path = temp_path("persist");
        {
            let storage = FileStorage::new(&path);
            storage.set_item("multibpo_access_token", "abc")?;
            storage.set_item("other", "x")?;
            storage.remove_item("other")?;
        }

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get_item("multibpo_access_token")?,
            Some("abc".to_string())
        );
        assert_eq!(reopened.get_item("other")?, None);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn file_storage_missing_file_is_empty() -> Result<()> {
        let storage = FileStorage::new(temp_path("missing"));
        assert_eq!(storage.get_item("anything")?, None);
        Ok(())
    }

    #[test]
    fn file_storage_rejects_garbage() -> Result<()> {
        let path = temp_path("garbage");
        fs::write(&path, "not json")?;

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get_item("key"),
            Err(StorageError::Corrupt { .. })
        ));

        fs::remove_file(&path)?;
        Ok(())
    }
}
