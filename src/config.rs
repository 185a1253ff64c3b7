//! Configuration for crabykv
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{KvError, Result};

/// Main configuration for a crabykv store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When buffered records are written and fsynced
    pub sync_policy: SyncPolicy,

    /// Write buffer size (bytes) before buffered records hit the file
    pub write_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Dead-bytes / file-size ratio that triggers compaction
    pub compaction_ratio: f64,

    /// Files smaller than this are never compacted automatically
    pub compaction_min_bytes: u64,

    // -------------------------------------------------------------------------
    // Open Configuration
    // -------------------------------------------------------------------------
    /// Create the backing file (and parent directories) if missing
    pub create_if_missing: bool,
}

/// Sync policy: how often pending records are fsynced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after `max_writes` pending records or once `interval` has passed
    Periodic { max_writes: usize, interval: Duration },

    /// fsync only on explicit flush, close or drop
    #[default]
    OnDemand,
}

impl SyncPolicy {
    /// Periodic policy with the given write threshold and interval
    pub fn periodic(max_writes: usize, interval: Duration) -> Self {
        SyncPolicy::Periodic {
            max_writes,
            interval,
        }
    }

    /// Timer interval for the background flusher, if any
    pub fn flush_interval(&self) -> Option<Duration> {
        match self {
            SyncPolicy::Periodic { interval, .. } => Some(*interval),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::OnDemand,
            write_buffer_size: 64 * 1024,       // 64 KB
            compaction_ratio: 0.5,
            compaction_min_bytes: 1024 * 1024, // 1 MB
            create_if_missing: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the durability engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if !(self.compaction_ratio > 0.0 && self.compaction_ratio <= 1.0) {
            return Err(KvError::Config(format!(
                "compaction_ratio must be in (0, 1], got {}",
                self.compaction_ratio
            )));
        }

        if self.write_buffer_size == 0 {
            return Err(KvError::Config(
                "write_buffer_size must be greater than zero".to_string(),
            ));
        }

        if let SyncPolicy::Periodic {
            max_writes,
            interval,
        } = self.sync_policy
        {
            if max_writes == 0 {
                return Err(KvError::Config(
                    "periodic sync requires max_writes > 0".to_string(),
                ));
            }
            if interval.is_zero() {
                return Err(KvError::Config(
                    "periodic sync requires a non-zero interval".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the sync policy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync_policy = policy;
        self
    }

    /// Set the write buffer size (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Set the dead-bytes ratio that triggers compaction
    pub fn compaction_ratio(mut self, ratio: f64) -> Self {
        self.config.compaction_ratio = ratio;
        self
    }

    /// Set the minimum file size (in bytes) for automatic compaction
    pub fn compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.config.compaction_min_bytes = bytes;
        self
    }

    /// Create missing files and directories on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
