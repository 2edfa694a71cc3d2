//! Durable key-value storage for the session.

use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Somewhere the session can be persisted between runs.
///
/// This plays the same role as a browser's local storage: a flat map from
/// string keys to string values.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Errors that may occur while reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to access \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        inner: io::Error,
    },
    #[error("The storage file at \"{}\" is corrupted", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        inner: serde_json::Error,
    },
    #[error("Unable to serialize the stored values")]
    Serialize(#[from] serde_json::Error),
}

/// A [`Storage`] which only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { MemoryStorage::default() }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// A [`Storage`] backed by a single JSON file on disk.
///
/// Every mutation rewrites the whole file. Writes go to a sibling temporary
/// file which is then renamed over the original, so a crash never leaves a
/// half-written file behind.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStorage {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            },
            Err(inner) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    inner,
                })
            },
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|inner| {
            StorageError::Corrupted {
                path: self.path.clone(),
                inner,
            }
        })
    }

    fn save(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let io_error = |inner: io::Error| StorageError::Io {
            path: self.path.clone(),
            inner,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let serialized = serde_json::to_string_pretty(entries)?;
        let temp = self.path.with_extension("tmp");
        log::trace!("Writing {} entries to {}", entries.len(), temp.display());

        fs::write(&temp, serialized).map_err(io_error)?;
        fs::rename(&temp, &self.path).map_err(io_error)?;

        Ok(())
    }

    /// Read-modify-write the file. A corrupted file is replaced rather than
    /// left to block every future write.
    fn modify<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock();
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e @ StorageError::Corrupted { .. }) => {
                log::warn!("Overwriting the unreadable storage file: {}", e);
                BTreeMap::new()
            },
            Err(e) => return Err(e),
        };
        mutate(&mut entries);
        self.save(&entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        Ok(entries.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}
