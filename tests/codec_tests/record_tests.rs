//! Tests for record encoding and decoding
//!
//! These tests verify:
//! - Round-trip encoding for values and tombstones
//! - CRC32 corruption detection
//! - Truncation detection (Incomplete)
//! - Garbage input never panics

use bytes::BytesMut;
use crabykv::codec::{self, Record, RecordRef, FRAME_HEADER_SIZE, MAX_RECORD_SIZE};
use crabykv::KvError;

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_encode_decode_put() {
    let record = Record::put(1, "hello", b"world".to_vec());

    let bytes = codec::encode(&record).unwrap();
    let (decoded, consumed) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(consumed, bytes.len());
}

#[test]
fn test_encode_decode_tombstone() {
    let record = Record::tombstone(42, "mykey");

    let bytes = codec::encode(&record).unwrap();
    let (decoded, _) = codec::decode(&bytes).unwrap();

    assert!(decoded.tombstone);
    assert!(decoded.value.is_empty());
    assert_eq!(decoded, record);
}

#[test]
fn test_encode_decode_empty_value() {
    let record = Record::put(7, "key_with_empty_value", Vec::new());

    let bytes = codec::encode(&record).unwrap();
    let (decoded, _) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn test_encode_decode_binary_value() {
    let record = Record::put(3, "bin", vec![0x00, 0xFF, 0x00, 0xAB]);

    let bytes = codec::encode(&record).unwrap();
    let (decoded, _) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded.value, vec![0x00, 0xFF, 0x00, 0xAB]);
}

#[test]
fn test_encode_decode_unicode_key() {
    let record = Record::put(9, "키-🦀", "값".as_bytes().to_vec());

    let bytes = codec::encode(&record).unwrap();
    let (decoded, _) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded.key, "키-🦀");
}

#[test]
fn test_large_value() {
    let large_value = vec![0xAB; 1024 * 1024]; // 1 MB value
    let record = Record::put(999, "big_key", large_value.clone());

    let bytes = codec::encode(&record).unwrap();
    let (decoded, _) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded.value, large_value);
}

#[test]
fn test_sequence_preserved() {
    for sequence in [0, 1, u64::MAX, 12345678901234] {
        let record = Record::tombstone(sequence, "key");
        let bytes = codec::encode(&record).unwrap();
        let (decoded, _) = codec::decode(&bytes).unwrap();

        assert_eq!(decoded.sequence, sequence);
    }
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_frame_size() {
    // payload = sequence (8) + tombstone (1) + key len (8) + key (5) + value len (8) + value (5)
    let record = Record::put(1, "hello", b"world".to_vec());

    let bytes = codec::encode(&record).unwrap();

    assert_eq!(bytes.len(), FRAME_HEADER_SIZE + 35);
    assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 35);
}

#[test]
fn test_borrowed_and_owned_encode_identically() {
    let record = Record::put(5, "key", b"value".to_vec());

    let owned = codec::encode(&record).unwrap();
    let mut borrowed = BytesMut::new();
    codec::encode_into(RecordRef::put(5, "key", b"value"), &mut borrowed).unwrap();

    assert_eq!(owned, borrowed.to_vec());
}

#[test]
fn test_encode_into_appends() {
    let mut buf = BytesMut::new();

    let first = codec::encode_into(RecordRef::put(1, "a", b"1"), &mut buf).unwrap();
    let second = codec::encode_into(RecordRef::tombstone(2, "a"), &mut buf).unwrap();

    assert_eq!(buf.len(), first + second);

    let (r1, n1) = codec::decode(&buf).unwrap();
    let (r2, n2) = codec::decode(&buf[n1..]).unwrap();
    assert_eq!(r1, Record::put(1, "a", b"1".to_vec()));
    assert_eq!(r2, Record::tombstone(2, "a"));
    assert_eq!(n1 + n2, buf.len());
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let record = Record::put(1, "k", b"v".to_vec());
    let mut bytes = codec::encode(&record).unwrap();
    let frame_len = bytes.len();
    bytes.extend_from_slice(b"trailing garbage");

    let (decoded, consumed) = codec::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(consumed, frame_len);
}

#[test]
fn test_checksum_is_deterministic() {
    let record = Record::put(42, "key", b"value".to_vec());

    let a = codec::encode(&record).unwrap();
    let b = codec::encode(&record).unwrap();

    assert_eq!(a, b);
}

// =============================================================================
// CRC Corruption Detection Tests
// =============================================================================

#[test]
fn test_crc_corruption_detected() {
    let record = Record::put(1, "key", b"value".to_vec());
    let mut bytes = codec::encode(&record).unwrap();

    // Corrupt a byte in the payload
    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    let result = codec::decode(&bytes);
    assert!(matches!(result, Err(KvError::CorruptRecord { .. })));
}

#[test]
fn test_crc_corruption_in_header_detected() {
    let record = Record::put(1, "key", b"value".to_vec());
    let mut bytes = codec::encode(&record).unwrap();

    // Corrupt the CRC bytes (bytes 4-7)
    bytes[4] ^= 0xFF;

    let result = codec::decode(&bytes);
    assert!(matches!(result, Err(KvError::CorruptRecord { .. })));
}

#[test]
fn test_valid_crc_over_garbage_payload() {
    let payload = [1u8, 2, 3];
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let result = codec::decode(&bytes);
    assert!(matches!(result, Err(KvError::CorruptRecord { .. })));
}

#[test]
fn test_zero_filled_frame_is_corrupt() {
    let bytes = [0u8; 32];

    let result = codec::decode(&bytes);
    assert!(matches!(result, Err(KvError::CorruptRecord { .. })));
}

#[test]
fn test_oversized_length_is_corrupt() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&((MAX_RECORD_SIZE as u32) + 1).to_le_bytes());
    bytes.extend_from_slice(&[0u8; 12]);

    let result = codec::decode(&bytes);
    assert!(matches!(result, Err(KvError::CorruptRecord { .. })));
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncated_payload() {
    let record = Record::tombstone(1, "key");
    let bytes = codec::encode(&record).unwrap();

    let truncated = &bytes[..FRAME_HEADER_SIZE + 2];
    let result = codec::decode(truncated);

    assert!(matches!(
        result,
        Err(KvError::Incomplete { needed, available }) if needed == bytes.len() && available == FRAME_HEADER_SIZE + 2
    ));
}

#[test]
fn test_header_too_small() {
    let bytes = [0xFFu8; 5]; // Less than FRAME_HEADER_SIZE
    let result = codec::decode(&bytes);

    assert!(matches!(result, Err(KvError::Incomplete { .. })));
}

#[test]
fn test_empty_buffer() {
    let bytes: [u8; 0] = [];
    let result = codec::decode(&bytes);

    assert!(matches!(result, Err(KvError::Incomplete { needed: 8, available: 0 })));
}

#[test]
fn test_every_prefix_fails_cleanly() {
    let record = Record::put(11, "prefix", b"never panics".to_vec());
    let bytes = codec::encode(&record).unwrap();

    for cut in 0..bytes.len() {
        let err = codec::decode(&bytes[..cut]).unwrap_err();
        assert!(err.is_recoverable_decode(), "cut at {} gave {:?}", cut, err);
    }
}

#[test]
fn test_oversized_record_rejected() {
    let mut buf = BytesMut::from(&b"existing"[..]);
    let huge = vec![0u8; MAX_RECORD_SIZE];

    let result = codec::encode_into(RecordRef::put(1, "huge", &huge), &mut buf);

    assert!(matches!(result, Err(KvError::RecordTooLarge { .. })));
    assert_eq!(&buf[..], b"existing");
}
