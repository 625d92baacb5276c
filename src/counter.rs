use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Counter key to notification attempt count.
pub type CounterMap = HashMap<String, u64>;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("counter store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Per-token attempt bookkeeping.
///
/// `increment` must be atomic with respect to concurrent `increment` and
/// `read` calls on the same store: no lost updates, no partially written
/// state visible to readers.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Snapshot the full key/count mapping.
    async fn read(&self) -> Result<CounterMap, CounterError>;

    /// Add one to `key`, inserting it at 1 if absent. Returns the new count.
    async fn increment(&self, key: &str) -> Result<u64, CounterError>;
}

/// Counter store backed by a single JSON file shared across processes.
///
/// Readers take a shared flock; `increment` holds an exclusive flock over
/// the whole read-modify-write so concurrent writers serialize instead of
/// clobbering each other. Locks are whole-file and released when the
/// descriptor closes.
#[derive(Debug)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    /// Open the store, creating the file with an empty map if it does not
    /// exist yet. Existing counts are left untouched.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CounterError> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        if file.metadata()?.len() == 0 {
            file.write_all(b"{}")?;
            file.sync_all()?;
        }
        Ok(Self { path })
    }

    fn load(file: &mut File) -> Result<CounterMap, CounterError> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            Ok(CounterMap::new())
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn read(&self) -> Result<CounterMap, CounterError> {
        let mut file = File::open(&self.path)?;
        fs2::FileExt::lock_shared(&file)?;
        Self::load(&mut file)
    }

    async fn increment(&self, key: &str) -> Result<u64, CounterError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let mut counters = Self::load(&mut file)?;
        let count = counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        let body = serde_json::to_vec(&counters)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&body)?;
        file.set_len(body.len() as u64)?;
        file.sync_all()?;
        debug!("Counter {} is now {}", key, count);
        Ok(count)
    }
}

/// In-memory store for orchestrator tests.
#[cfg(test)]
pub struct MemoryCounterStore {
    counters: tokio::sync::Mutex<CounterMap>,
}

#[cfg(test)]
impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: tokio::sync::Mutex::new(CounterMap::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn read(&self) -> Result<CounterMap, CounterError> {
        Ok(self.counters.lock().await.clone())
    }

    async fn increment(&self, key: &str) -> Result<u64, CounterError> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
