//! Store Module
//!
//! The public synchronous API, coordinating index and storage.
//!
//! ## Responsibilities
//! - Open the backing file and rebuild the index before serving calls
//! - Keep the index and the file moving together on every mutation
//! - Trigger compaction when dead bytes dominate the file
//! - Enforce exclusive open of the backing file, in this process and others

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::index::{Index, IndexEntry};
use crate::lock::PathLock;
use crate::storage::{CompactionStats, Flusher, StorageManager};

/// An open key-value store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/remove/clear/flush/compact): serialized by the
///   `storage` mutex
///   - Only ONE mutation at a time
///   - Order: storage lock → append to file → index write lock → update
///   - The index changes only after the file accepted the record
///
/// - **Reads** (get/contains/keys/size): index read lock only
///   - Never touch the file
///   - The index write lock is held just for the in-memory update, so a
///     read never sees a half-applied mutation
pub struct Store {
    /// Backing file (canonical path)
    path: PathBuf,

    config: Config,

    /// Live keys and values
    index: RwLock<Index>,

    /// Durability engine; its mutex serializes all mutations
    storage: Arc<Mutex<StorageManager>>,

    /// Background sync thread (periodic policy only)
    flusher: Option<Flusher>,

    /// Exclusive claim on `path`
    _lock: PathLock,
}

/// Point-in-time counters for a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Live keys
    pub keys: usize,

    /// Logical size of the backing file, including buffered records
    pub log_bytes: u64,

    /// Bytes of records backing live keys
    pub live_bytes: u64,

    /// Bytes reclaimable by compaction
    pub dead_bytes: u64,

    /// Records appended since the last sync
    pub pending_writes: usize,

    /// Compactions and clears since open
    pub compactions: u64,

    /// Sequence number of the most recent record
    pub last_sequence: u64,
}

impl Store {
    /// Open or create a store backed by the file at `path`
    ///
    /// On startup:
    /// 1. Validate config and create the file (and parents) if allowed
    /// 2. Claim the canonical path for this handle
    /// 3. Replay the file into the index, recovering from a torn tail
    /// 4. Start the background flusher for the periodic policy
    pub fn initialize(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        Self::prepare_file(path, &config)?;
        let path = fs::canonicalize(path).map_err(|e| KvError::open(path, e))?;
        let lock = PathLock::acquire(&path)?;

        let mut index = Index::new();
        let (storage, recovery) = StorageManager::open(&path, &config, &mut index)?;

        if recovery.records_recovered > 0 || recovery.was_truncated {
            tracing::info!(
                path = %path.display(),
                records = recovery.records_recovered,
                keys = index.count(),
                discarded_bytes = recovery.discarded_bytes,
                "store recovered"
            );
        }

        let storage = Arc::new(Mutex::new(storage));
        let flusher = match config.sync_policy.flush_interval() {
            Some(interval) => Some(
                Flusher::spawn(Arc::downgrade(&storage), interval)
                    .map_err(|e| KvError::open(&path, e))?,
            ),
            None => None,
        };

        tracing::debug!(path = %path.display(), policy = ?config.sync_policy, "store initialized");

        Ok(Self {
            path,
            config,
            index: RwLock::new(index),
            storage,
            flusher,
            _lock: lock,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses the default config
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::initialize(path, Config::default())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a copy of the value for `key`
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.index.read().get(key).map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.read().contains(key)
    }

    /// Snapshot of live keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.index.read().list_keys()
    }

    /// Number of live keys
    pub fn size(&self) -> usize {
        self.index.read().count()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Set `key` to `value`
    ///
    /// Steps:
    /// 1. Acquire the storage lock
    /// 2. Append the record (durability per policy)
    /// 3. Update the index
    /// 4. Compact if dead bytes crossed the threshold
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        validate_key(key)?;
        let value = value.as_ref();

        let mut storage = self.storage.lock();
        let appended = storage.put(key, value)?;

        let entry = IndexEntry::new(value.to_vec(), appended.sequence, appended.encoded_len);
        let live_bytes = {
            let mut index = self.index.write();
            index.put(key.to_string(), entry);
            index.live_bytes()
        };

        self.maybe_compact(&mut storage, live_bytes);
        Ok(())
    }

    /// Remove `key`, returning whether it was present
    ///
    /// Absent keys are a no-op and write nothing.
    pub fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        let mut storage = self.storage.lock();
        if !self.index.read().contains(key) {
            return Ok(false);
        }

        storage.delete(key)?;
        let live_bytes = {
            let mut index = self.index.write();
            index.remove(key);
            index.live_bytes()
        };

        self.maybe_compact(&mut storage, live_bytes);
        Ok(true)
    }

    /// Remove every key and reset the backing file to empty
    pub fn clear(&self) -> Result<()> {
        let mut storage = self.storage.lock();
        storage.clear()?;
        self.index.write().clear();
        Ok(())
    }

    /// Persist pending records
    ///
    /// A no-op when nothing is pending (always the case under `EveryWrite`).
    pub fn flush(&self) -> Result<()> {
        self.storage.lock().sync()
    }

    /// Rewrite the backing file with only live records
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut storage = self.storage.lock();
        let index = self.index.read();
        storage.compact(&index)
    }

    /// Close the store gracefully
    ///
    /// Stops the flusher and syncs pending records. Dropping a store does
    /// the same but can only log a failure.
    pub fn close(mut self) -> Result<()> {
        self.flusher.take();
        self.storage.lock().sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Canonical path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> StoreStats {
        let storage = self.storage.lock();
        let index = self.index.read();
        let live_bytes = index.live_bytes();

        StoreStats {
            keys: index.count(),
            log_bytes: storage.log_len(),
            live_bytes,
            dead_bytes: storage.dead_bytes(live_bytes),
            pending_writes: storage.pending_writes(),
            compactions: storage.compactions(),
            last_sequence: storage.last_sequence(),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Make sure a regular file exists at `path`
    fn prepare_file(path: &Path, config: &Config) -> Result<()> {
        if path.is_file() {
            return Ok(());
        }
        if path.exists() {
            return Err(KvError::open(path, "not a regular file"));
        }
        if !config.create_if_missing {
            return Err(KvError::open(path, "does not exist"));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| KvError::open(path, e))?;
            }
        }

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| KvError::open(path, e))?;
        Ok(())
    }

    /// Compact after a mutation if the threshold is crossed
    ///
    /// The mutation already succeeded, so a failure is logged, not returned.
    fn maybe_compact(&self, storage: &mut StorageManager, live_bytes: u64) {
        if !storage.should_compact(live_bytes) {
            return;
        }

        let index = self.index.read();
        if let Err(e) = storage.compact(&index) {
            tracing::warn!(path = %self.path.display(), error = %e, "automatic compaction failed");
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.flusher.take();
        if let Err(e) = self.storage.lock().sync() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to sync store on drop");
        }
    }
}

/// Keys must be non-empty
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}
