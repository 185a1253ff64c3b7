//! Log Writer
//!
//! Appends encoded records to the backing file under a sync policy.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::BytesMut;

use crate::codec::{self, RecordRef, FILE_HEADER_SIZE};
use crate::config::SyncPolicy;
use crate::error::Result;

/// Default write buffer capacity (64 KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Appends records to the backing file
///
/// Records are encoded into an in-memory buffer first. The buffer reaches
/// the file when the policy says so or when it grows past `buffer_limit`.
/// The file position always equals `flushed`.
pub struct LogWriter {
    path: PathBuf,
    file: File,

    /// Encoded records not yet written to `file`
    buffer: BytesMut,
    buffer_limit: usize,

    /// Bytes of `file` known to hold complete records
    flushed: u64,

    policy: SyncPolicy,

    /// Records appended since the last fsync
    uncommitted: usize,
    last_sync: Instant,
}

impl LogWriter {
    /// Open or create a log file with the default buffer size
    pub fn open(path: &Path, policy: SyncPolicy) -> Result<Self> {
        Self::open_with_buffer(path, policy, DEFAULT_BUFFER_SIZE)
    }

    /// Open or create a log file
    ///
    /// An empty file gets a fresh header. Existing content is expected to
    /// have been validated (and truncated to its last good record) by
    /// recovery before the writer appends to it.
    pub fn open_with_buffer(path: &Path, policy: SyncPolicy, buffer_limit: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut flushed = file.metadata()?.len();
        if flushed < FILE_HEADER_SIZE as u64 {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&codec::file_header(0))?;
            file.sync_data()?;
            flushed = FILE_HEADER_SIZE as u64;
        }
        file.seek(SeekFrom::Start(flushed))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            buffer: BytesMut::with_capacity(buffer_limit),
            buffer_limit,
            flushed,
            policy,
            uncommitted: 0,
            last_sync: Instant::now(),
        })
    }

    /// Append a record, returning the size of its frame
    ///
    /// If the policy-driven write or sync fails, the record is rolled back:
    /// it leaves neither the buffer nor the file, and earlier pending
    /// records are kept.
    pub fn append(&mut self, record: RecordRef<'_>) -> Result<u32> {
        let checkpoint = self.flushed;
        let start = self.buffer.len();

        let len = codec::encode_into(record, &mut self.buffer)?;
        self.uncommitted += 1;

        if let Err(e) = self.apply_policy() {
            self.rollback(checkpoint, start);
            return Err(e);
        }

        Ok(len as u32)
    }

    /// Write buffered records and fsync
    ///
    /// Returns immediately when nothing is pending.
    pub fn sync(&mut self) -> Result<()> {
        if !self.has_pending() {
            return Ok(());
        }

        self.write_buffer()?;
        self.file.sync_data()?;
        self.uncommitted = 0;
        self.last_sync = Instant::now();
        tracing::trace!(path = %self.path.display(), position = self.flushed, "log synced");
        Ok(())
    }

    /// True if records were appended since the last sync
    pub fn has_pending(&self) -> bool {
        self.uncommitted > 0 || !self.buffer.is_empty()
    }

    /// Logical end of the log, including buffered records
    pub fn position(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    /// Bytes already written to the file
    pub fn flushed_position(&self) -> u64 {
        self.flushed
    }

    /// Bytes waiting in the write buffer
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Records appended since the last sync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the open file now lives at `path` after a rename
    pub(crate) fn renamed(&mut self, path: &Path) {
        self.path = path.to_path_buf();
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn apply_policy(&mut self) -> Result<()> {
        match self.policy {
            SyncPolicy::EveryWrite => self.sync(),
            SyncPolicy::Periodic {
                max_writes,
                interval,
            } => {
                if self.uncommitted >= max_writes || self.last_sync.elapsed() >= interval {
                    self.sync()
                } else if self.buffer.len() >= self.buffer_limit {
                    self.write_buffer()
                } else {
                    Ok(())
                }
            }
            SyncPolicy::OnDemand => {
                if self.buffer.len() >= self.buffer_limit {
                    self.write_buffer()
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Move the buffer into the file (no fsync)
    fn write_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.file.write_all(&self.buffer) {
            self.restore_tail();
            return Err(e.into());
        }

        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Undo the record appended at buffer offset `start`
    fn rollback(&mut self, checkpoint: u64, start: usize) {
        if self.flushed > checkpoint {
            // The buffer reached the file before the failure; cut the
            // failed record off the file tail.
            self.flushed = checkpoint + start as u64;
        } else {
            self.buffer.truncate(start);
        }
        self.uncommitted = self.uncommitted.saturating_sub(1);
        self.restore_tail();
    }

    /// Drop anything past `flushed` from the file and reposition
    fn restore_tail(&mut self) {
        let flushed = self.flushed;
        let result = self
            .file
            .set_len(flushed)
            .and_then(|_| self.file.seek(SeekFrom::Start(flushed)).map(|_| ()));

        if let Err(e) = result {
            tracing::warn!(
                path = %self.path.display(),
                position = flushed,
                error = %e,
                "failed to restore log tail"
            );
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to sync log on drop");
        }
    }
}
