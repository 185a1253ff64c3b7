//! Storage Manager
//!
//! The durability engine: owns the backing file for one store.
//!
//! ## Responsibilities
//! - Rebuild the index from the file on startup
//! - Assign sequence numbers and append records
//! - Decide when dead bytes warrant compaction, and compact
//! - Clear the file atomically

use std::path::{Path, PathBuf};

use crate::codec::{RecordRef, FILE_HEADER_SIZE};
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::index::Index;

use super::compaction::{self, CompactionStats, StagedImage};
use super::{LogRecovery, LogWriter, RecoveryResult};

/// Location of a freshly appended record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub sequence: u64,
    pub encoded_len: u32,
}

/// Manages the backing file
///
/// ## Concurrency:
/// - Not internally synchronized; the store keeps it behind a `Mutex`,
///   which is what serializes every mutation.
pub struct StorageManager {
    /// Backing file path (canonical)
    path: PathBuf,

    config: Config,

    /// Appends to the backing file
    writer: LogWriter,

    /// Sequence number for the next record; never reset
    next_sequence: u64,

    /// Compactions (including clears) run since open
    compactions: u64,
}

impl StorageManager {
    /// Open an existing backing file and replay it into `index`
    ///
    /// On startup:
    /// 1. Remove a temp file left by an interrupted compaction
    /// 2. Replay records into the index, truncating a damaged tail
    /// 3. Position the writer at the end of the last good record
    pub fn open(path: &Path, config: &Config, index: &mut Index) -> Result<(Self, RecoveryResult)> {
        compaction::remove_stale_temp(path).map_err(|e| KvError::open(path, e))?;

        let recovery = LogRecovery::replay(path, |record, len| {
            index.apply(record, len);
        })
        .map_err(|e| match e {
            KvError::CorruptRecord { reason } => {
                KvError::open(path, format!("not a crabykv file: {}", reason))
            }
            other => KvError::open(path, other),
        })?;

        let writer = LogWriter::open_with_buffer(path, config.sync_policy, config.write_buffer_size)
            .map_err(|e| KvError::open(path, e))?;

        tracing::debug!(
            path = %path.display(),
            records = recovery.records_recovered,
            live_keys = index.count(),
            last_sequence = recovery.last_sequence,
            "storage opened"
        );

        let manager = Self {
            path: path.to_path_buf(),
            config: config.clone(),
            writer,
            next_sequence: recovery.last_sequence + 1,
            compactions: 0,
        };

        Ok((manager, recovery))
    }

    /// Append a record setting `key` to `value`
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<Appended> {
        let sequence = self.next_sequence;
        let encoded_len = self.writer.append(RecordRef::put(sequence, key, value))?;
        self.next_sequence += 1;
        Ok(Appended {
            sequence,
            encoded_len,
        })
    }

    /// Append a tombstone for `key`
    pub fn delete(&mut self, key: &str) -> Result<Appended> {
        let sequence = self.next_sequence;
        let encoded_len = self.writer.append(RecordRef::tombstone(sequence, key))?;
        self.next_sequence += 1;
        Ok(Appended {
            sequence,
            encoded_len,
        })
    }

    /// Persist pending records
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync()
    }

    pub fn has_pending(&self) -> bool {
        self.writer.has_pending()
    }

    /// Check whether the dead-byte ratio calls for compaction
    pub fn should_compact(&self, live_bytes: u64) -> bool {
        let log_len = self.log_len();
        if log_len < self.config.compaction_min_bytes {
            return false;
        }

        let dead = self.dead_bytes(live_bytes);
        dead as f64 / log_len as f64 >= self.config.compaction_ratio
    }

    /// Rewrite the file with only the live entries of `index`
    pub fn compact(&mut self, index: &Index) -> Result<CompactionStats> {
        self.writer.sync()?;
        let bytes_before = self.log_len();

        let records = index
            .iter()
            .map(|(key, entry)| RecordRef::put(entry.sequence, key, &entry.value));
        let staged = compaction::stage(&self.path, self.last_sequence(), records)?;
        let bytes_after = staged.bytes();
        let records_written = staged.records();
        self.install(staged)?;

        let stats = CompactionStats {
            bytes_before,
            bytes_after,
            records_written,
        };

        tracing::info!(
            path = %self.path.display(),
            bytes_before,
            bytes_after,
            records = records_written,
            "compaction finished"
        );

        Ok(stats)
    }

    /// Replace the file with an empty log
    ///
    /// The new header keeps the sequence high-water mark, so numbering
    /// continues after a reopen.
    pub fn clear(&mut self) -> Result<()> {
        let staged = compaction::stage(&self.path, self.last_sequence(), std::iter::empty())?;
        self.install(staged)?;

        tracing::debug!(path = %self.path.display(), "storage cleared");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Logical size of the log, including buffered records
    pub fn log_len(&self) -> u64 {
        self.writer.position()
    }

    /// Bytes held by overwritten or deleted records and tombstones
    pub fn dead_bytes(&self, live_bytes: u64) -> u64 {
        self.log_len()
            .saturating_sub(FILE_HEADER_SIZE as u64)
            .saturating_sub(live_bytes)
    }

    /// Sequence number of the most recent record (0 if none)
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn pending_writes(&self) -> usize {
        self.writer.uncommitted_count()
    }

    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Swap a staged image in as the live file
    ///
    /// The writer for the new image is opened on the temp file before the
    /// rename and keeps its handle across it. An error therefore means the
    /// old file and the old writer are both still in place.
    fn install(&mut self, staged: StagedImage) -> Result<()> {
        let mut writer = LogWriter::open_with_buffer(
            staged.path(),
            self.config.sync_policy,
            self.config.write_buffer_size,
        )?;

        staged.commit(&self.path)?;

        writer.renamed(&self.path);
        self.writer = writer;
        self.compactions += 1;
        Ok(())
    }
}
