use std::collections::HashSet;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::{Record, RecordKey};

/// Result of reading the backing document, before any recovery policy.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Vec<Record>),
    Missing,
    Corrupt(String),
}

/// What to do when the persisted collection cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Proceed as if nothing had been stored yet.
    #[default]
    StartFresh,
    Strict,
}

impl LoadOutcome {
    pub fn resolve(self, policy: RecoveryPolicy, location: &str) -> Result<Vec<Record>, StoreError> {
        match self {
            LoadOutcome::Loaded(records) => Ok(records),
            LoadOutcome::Missing => Ok(Vec::new()),
            LoadOutcome::Corrupt(reason) => match policy {
                RecoveryPolicy::StartFresh => {
                    warn!(location, reason = %reason, "Collection unreadable, starting empty");
                    Ok(Vec::new())
                }
                RecoveryPolicy::Strict => Err(StoreError::Corrupt {
                    location: location.to_string(),
                    reason,
                }),
            },
        }
    }
}

pub trait CollectionStore: Send + Sync {
    /// The persisted document as stored, or `None` if nothing has been written.
    fn read_raw(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the persisted document with `bytes`.
    fn write_raw(&self, bytes: &[u8]) -> Result<(), StoreError>;

    fn location(&self) -> String;

    fn load(&self) -> LoadOutcome {
        match self.read_raw() {
            Ok(Some(raw)) => decode(&raw),
            Ok(None) => LoadOutcome::Missing,
            Err(e) => LoadOutcome::Corrupt(e.to_string()),
        }
    }

    /// Replace the whole persisted collection.
    fn save(&self, records: &[Record]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        self.write_raw(&json)?;
        debug!(location = %self.location(), records = records.len(), "Collection written");
        Ok(())
    }
}

/// Pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }
}

impl CollectionStore for JsonFileStore {
    fn read_raw(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        // Write beside the target, then rename over it.
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        std::fs::write(&temp, bytes).map_err(|e| StoreError::io(&temp, e))?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store holding the serialized bytes, so tests exercise the same
/// decode path as the file store.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Vec<u8>>>,
    read_only: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        MemoryStore {
            bytes: Mutex::new(Some(bytes.into())),
            read_only: false,
        }
    }

    /// Every write fails with a permission error.
    pub fn read_only() -> Self {
        MemoryStore {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().ok().and_then(|b| b.clone())
    }
}

#[cfg(test)]
impl CollectionStore for MemoryStore {
    fn read_raw(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.bytes())
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::io(
                "memory",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only store"),
            ));
        }
        if let Ok(mut guard) = self.bytes.lock() {
            *guard = Some(bytes.to_vec());
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

fn decode(raw: &[u8]) -> LoadOutcome {
    match serde_json::from_slice::<Vec<Record>>(raw) {
        Ok(records) => LoadOutcome::Loaded(records),
        Err(e) => LoadOutcome::Corrupt(e.to_string()),
    }
}

/// Keys already present in the collection, grown as records are appended.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashSet<RecordKey>,
}

impl KeySet {
    pub fn from_records(records: &[Record]) -> Self {
        KeySet {
            keys: records.iter().map(Record::key).collect(),
        }
    }

    pub fn is_duplicate(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already known.
    pub fn insert(&mut self, key: RecordKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
