//! Binding Surface
//!
//! The narrow interface a native-module host calls into.
//!
//! A host (UI runtime, FFI shim) owns one `NativeKv` per module instance
//! and forwards each call unchanged. Keys and values cross the boundary as
//! UTF-8 text. No logic lives here beyond the initialized/uninitialized
//! lifecycle.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::store::Store;

/// File name of the backing file inside a module's data directory
pub const STORE_FILE_NAME: &str = "crabykv.db";

/// Operations exposed to the host
pub trait KvModule: Send + Sync {
    /// Open the backing store; later calls are no-ops
    fn initialize(&self) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// `None` for a missing key, never an error
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    fn contains(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    fn size(&self) -> Result<usize>;

    /// Persist pending writes
    fn flush(&self) -> Result<()>;
}

/// `KvModule` backed by a `Store` with an explicit init/teardown lifecycle
///
/// Every call before `initialize` (or after `teardown`) fails with
/// `NotInitialized`.
pub struct NativeKv {
    data_dir: PathBuf,
    config: Config,
    store: RwLock<Option<Store>>,
}

impl NativeKv {
    /// Module rooted at `data_dir` with the default config
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(data_dir, Config::default())
    }

    pub fn with_config(data_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
            store: RwLock::new(None),
        }
    }

    /// Path of the backing file this module opens
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_initialized(&self) -> bool {
        self.store.read().is_some()
    }

    /// Close the store and return to the uninitialized state
    pub fn teardown(&self) -> Result<()> {
        match self.store.write().take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
        let guard = self.store.read();
        let store = guard.as_ref().ok_or(KvError::NotInitialized)?;
        f(store)
    }
}

impl KvModule for NativeKv {
    fn initialize(&self) -> Result<()> {
        let mut slot = self.store.write();
        if slot.is_none() {
            *slot = Some(Store::initialize(self.store_path(), self.config.clone())?);
        }
        Ok(())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_store(|store| store.set(key, value))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_store(|store| {
            Ok(store
                .get(key)
                .map(|value| String::from_utf8_lossy(&value).into_owned()))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_store(|store| store.remove(key).map(|_| ()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_store(|store| Ok(store.keys()))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.with_store(|store| Ok(store.contains(key)))
    }

    fn clear(&self) -> Result<()> {
        self.with_store(|store| store.clear())
    }

    fn size(&self) -> Result<usize> {
        self.with_store(|store| Ok(store.size()))
    }

    fn flush(&self) -> Result<()> {
        self.with_store(|store| store.flush())
    }
}
