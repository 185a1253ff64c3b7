//! Log Reader
//!
//! Reads records sequentially from a backing file image.

use std::fs;
use std::path::Path;

use crate::codec::{self, Record, FILE_HEADER_SIZE};
use crate::error::Result;

/// Reads records from a log file
///
/// The whole file image is held in memory while reading.
pub struct LogReader {
    data: Vec<u8>,
    position: usize,

    /// Sequence high-water mark from the file header
    base_sequence: u64,
}

impl LogReader {
    /// Open a log file for reading and validate its header
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Read from an in-memory file image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let base_sequence = codec::check_file_header(&data)?;
        Ok(Self {
            data,
            position: FILE_HEADER_SIZE,
            base_sequence,
        })
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at a clean end of file. A decode error leaves the
    /// position at the start of the bad frame.
    pub fn next_record(&mut self) -> Result<Option<(Record, u32)>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }

        let (record, consumed) = codec::decode(&self.data[self.position..])?;
        self.position += consumed;
        Ok(Some((record, consumed as u32)))
    }

    /// Offset just past the last record read
    pub fn position(&self) -> usize {
        self.position
    }

    /// Highest sequence issued before the file was written
    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    /// Total bytes in the file image
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() <= FILE_HEADER_SIZE
    }

    /// Iterate over records until the end or the first bad frame
    pub fn records(self) -> LogIterator {
        LogIterator {
            reader: self,
            failed: false,
        }
    }
}

/// Iterator over log records
///
/// Yields each decodable record with its frame size, then at most one
/// error, then stops.
pub struct LogIterator {
    reader: LogReader,
    failed: bool,
}

impl LogIterator {
    /// Offset just past the last good record
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn base_sequence(&self) -> u64 {
        self.reader.base_sequence()
    }
}

impl Iterator for LogIterator {
    type Item = Result<(Record, u32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.reader.next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
