//! Log Recovery
//!
//! Replays the backing file on startup and cuts off torn or damaged tails.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::codec::{self, Record, FILE_HEADER_SIZE};
use crate::error::Result;

use super::LogReader;

/// Handles log recovery after a crash or clean shutdown
pub struct LogRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully decoded
    pub records_recovered: u64,

    /// Highest sequence issued: the larger of the header's base sequence
    /// and every recovered record (0 for a new store)
    pub last_sequence: u64,

    /// Bytes of the original file that hold a valid header and records
    pub valid_len: u64,

    /// Bytes after `valid_len` that were (or would be) discarded
    pub discarded_bytes: u64,

    /// Whether the file had a torn or corrupt tail
    pub was_truncated: bool,

    /// Why decoding stopped early, if it did
    pub stop_reason: Option<String>,
}

impl LogRecovery {
    /// Recover all records from a log file
    ///
    /// This will:
    /// 1. Read all records up to the first undecodable frame
    /// 2. Truncate the file to the end of the last good record
    /// 3. Return the good records in file order
    pub fn recover(path: &Path) -> Result<(Vec<Record>, RecoveryResult)> {
        let mut records = Vec::new();
        let result = Self::replay(path, |record, _| records.push(record))?;
        Ok((records, result))
    }

    /// Recover a log file, handing each good record to `apply`
    ///
    /// A file shorter than the header is reset to an empty log. A file with
    /// a complete but foreign header fails with `CorruptRecord`.
    pub fn replay<F>(path: &Path, apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(Record, u32),
    {
        let data = fs::read(path)?;

        if data.len() < FILE_HEADER_SIZE {
            let result = Self::torn_header(data.len());
            let mut file = OpenOptions::new().write(true).open(path)?;
            file.set_len(0)?;
            file.write_all(&codec::file_header(0))?;
            file.sync_all()?;

            if result.was_truncated {
                tracing::warn!(
                    path = %path.display(),
                    discarded = result.discarded_bytes,
                    "torn file header, starting from an empty log"
                );
            }
            return Ok(result);
        }

        let result = Self::scan(data, apply)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;

            tracing::warn!(
                path = %path.display(),
                valid_len = result.valid_len,
                discarded = result.discarded_bytes,
                reason = result.stop_reason.as_deref().unwrap_or("unknown"),
                "truncated damaged log tail"
            );
        }

        Ok(result)
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let data = fs::read(path)?;
        if data.len() < FILE_HEADER_SIZE {
            return Ok(Self::torn_header(data.len()));
        }
        Self::scan(data, |_, _| {})
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn torn_header(len: usize) -> RecoveryResult {
        RecoveryResult {
            discarded_bytes: len as u64,
            was_truncated: len > 0,
            stop_reason: (len > 0).then(|| "incomplete file header".to_string()),
            ..RecoveryResult::default()
        }
    }

    fn scan<F>(data: Vec<u8>, mut apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(Record, u32),
    {
        let total = data.len() as u64;
        let mut records = LogReader::from_bytes(data)?.records();
        let mut result = RecoveryResult {
            last_sequence: records.base_sequence(),
            ..RecoveryResult::default()
        };

        for item in &mut records {
            match item {
                Ok((record, len)) => {
                    result.records_recovered += 1;
                    result.last_sequence = result.last_sequence.max(record.sequence);
                    apply(record, len);
                }
                Err(e) if e.is_recoverable_decode() => {
                    result.stop_reason = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        result.valid_len = records.position() as u64;
        result.discarded_bytes = total - result.valid_len;
        result.was_truncated = result.discarded_bytes > 0;
        Ok(result)
    }
}
