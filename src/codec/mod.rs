//! Storage Format Codec
//!
//! Defines the on-disk layout of the backing file.
//!
//! ## Responsibilities
//! - Frame each record with a length prefix and CRC32 checksum
//! - Detect truncated frames (`Incomplete`) and damaged ones (`CorruptRecord`)
//! - Identify crabykv files by a small header
//! - Carry the sequence high-water mark across rewrites in that header
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (16 bytes)                           │
//! │   Magic: "CRKV" (4) | Version (2) | Rsv (2) │
//! │   Base sequence (8)                         │
//! ├─────────────────────────────────────────────┤
//! │ Record 1                                    │
//! │ ┌─────────┬─────────┬─────────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Payload (bincode)   │ │
//! │ └─────────┴─────────┴─────────────────────┘ │
//! ├─────────────────────────────────────────────┤
//! │ Record 2 ...                                │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Payload = `sequence (8) | tombstone (1) | key_len (8) | key | value_len (8) | value`
//!
//! The base sequence is the highest sequence issued before the file was
//! (re)written. Compaction and clear drop records; the next open resumes
//! numbering above both the base and every record it replays.

mod record;

pub use record::{decode, encode, encode_into, Record, RecordRef};

use crate::error::{KvError, Result};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a crabykv file
pub const MAGIC: &[u8; 4] = b"CRKV";

/// Current file format version
pub const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2) + Reserved (2) + Base sequence (8) = 16 bytes
pub const FILE_HEADER_SIZE: usize = 16;

/// Frame header size: PayloadLen (4) + CRC (4) = 8 bytes
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a single record may carry (64 MB)
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// File Header
// =============================================================================

/// Bytes written at the start of every backing file
///
/// `base_sequence` is the highest sequence issued before the file was
/// written (0 for a new store).
pub fn file_header(base_sequence: u64) -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[8..16].copy_from_slice(&base_sequence.to_le_bytes());
    header
}

/// Validate a file header and return its base sequence
///
/// Fails with `Incomplete` when fewer than `FILE_HEADER_SIZE` bytes are
/// available and `CorruptRecord` when magic or version do not match.
pub fn check_file_header(bytes: &[u8]) -> Result<u64> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(KvError::Incomplete {
            needed: FILE_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(KvError::corrupt(format!(
            "invalid magic: expected CRKV, got {:?}",
            &bytes[0..4]
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(KvError::corrupt(format!(
            "unsupported format version: {}",
            version
        )));
    }

    let mut base = [0u8; 8];
    base.copy_from_slice(&bytes[8..16]);
    Ok(u64::from_le_bytes(base))
}
