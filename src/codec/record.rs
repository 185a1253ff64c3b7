//! Record definitions
//!
//! A record is one persisted mutation: a value for a key, or a tombstone.

use bincode::Options;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

use super::{FRAME_HEADER_SIZE, MAX_RECORD_SIZE};

/// A single persisted mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Sequence number - monotonically increasing across the store
    pub sequence: u64,

    /// True when this record deletes `key`
    pub tombstone: bool,

    pub key: String,

    /// Empty for tombstones
    pub value: Vec<u8>,
}

/// Borrowed view of a record, used on the write path to avoid copies.
///
/// Field order matches `Record` so both encode to identical bytes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordRef<'a> {
    pub sequence: u64,
    pub tombstone: bool,
    pub key: &'a str,
    pub value: &'a [u8],
}

impl Record {
    /// A record that sets `key` to `value`
    pub fn put(sequence: u64, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            tombstone: false,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A record that deletes `key`
    pub fn tombstone(sequence: u64, key: impl Into<String>) -> Self {
        Self {
            sequence,
            tombstone: true,
            key: key.into(),
            value: Vec::new(),
        }
    }

    pub fn as_ref(&self) -> RecordRef<'_> {
        RecordRef {
            sequence: self.sequence,
            tombstone: self.tombstone,
            key: &self.key,
            value: &self.value,
        }
    }
}

impl<'a> RecordRef<'a> {
    pub fn put(sequence: u64, key: &'a str, value: &'a [u8]) -> Self {
        Self {
            sequence,
            tombstone: false,
            key,
            value,
        }
    }

    pub fn tombstone(sequence: u64, key: &'a str) -> Self {
        Self {
            sequence,
            tombstone: true,
            key,
            value: &[],
        }
    }
}

/// Bincode options shared by encoder and decoder
fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_RECORD_SIZE as u64)
}

// =============================================================================
// Encoding
// =============================================================================

/// Append the framed encoding of `record` to `buf`
///
/// Returns the number of bytes appended. On error `buf` is left unchanged.
pub fn encode_into(record: RecordRef<'_>, buf: &mut BytesMut) -> Result<usize> {
    let payload_len = payload_options()
        .serialized_size(&record)
        .map_err(|_| KvError::RecordTooLarge {
            size: record.key.len() + record.value.len(),
            max: MAX_RECORD_SIZE,
        })? as usize;

    if payload_len > MAX_RECORD_SIZE {
        return Err(KvError::RecordTooLarge {
            size: payload_len,
            max: MAX_RECORD_SIZE,
        });
    }

    let start = buf.len();
    buf.reserve(FRAME_HEADER_SIZE + payload_len);
    buf.put_u32_le(payload_len as u32);
    buf.put_u32_le(0); // CRC placeholder, patched below

    let payload_start = buf.len();
    if let Err(e) = payload_options().serialize_into((&mut *buf).writer(), &record) {
        buf.truncate(start);
        return Err(KvError::Serialization(e.to_string()));
    }

    let crc = crc32fast::hash(&buf[payload_start..]);
    buf[start + 4..payload_start].copy_from_slice(&crc.to_le_bytes());

    Ok(buf.len() - start)
}

/// Encode `record` into a standalone frame
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    encode_into(record.as_ref(), &mut buf)?;
    Ok(buf.to_vec())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one frame from the front of `bytes`
///
/// Returns the record and the number of bytes consumed. Fails with
/// `Incomplete` when the frame is cut short and `CorruptRecord` when the
/// length is implausible, the checksum does not match, or the payload does
/// not parse.
pub fn decode(bytes: &[u8]) -> Result<(Record, usize)> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(KvError::Incomplete {
            needed: FRAME_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let mut header = &bytes[..FRAME_HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let expected_crc = header.get_u32_le();

    if payload_len == 0 {
        return Err(KvError::corrupt("zero-length payload"));
    }
    if payload_len > MAX_RECORD_SIZE {
        return Err(KvError::corrupt(format!(
            "payload length {} exceeds max {}",
            payload_len, MAX_RECORD_SIZE
        )));
    }

    let total = FRAME_HEADER_SIZE + payload_len;
    if bytes.len() < total {
        return Err(KvError::Incomplete {
            needed: total,
            available: bytes.len(),
        });
    }

    let payload = &bytes[FRAME_HEADER_SIZE..total];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(KvError::corrupt(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    let record: Record = payload_options()
        .deserialize(payload)
        .map_err(|e| KvError::corrupt(format!("undecodable payload: {}", e)))?;

    if record.tombstone && !record.value.is_empty() {
        return Err(KvError::corrupt("tombstone carries a value"));
    }

    Ok((record, total))
}
