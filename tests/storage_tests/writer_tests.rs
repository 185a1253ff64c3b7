//! Tests for the log writer
//!
//! These tests verify:
//! - Each sync policy decides correctly when records reach the disk
//! - The write buffer spills to the file once it fills
//! - Reopening continues after the existing records
//! - Dropping a writer persists buffered records

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crabykv::codec::{self, Record, RecordRef, FILE_HEADER_SIZE};
use crabykv::storage::{LogReader, LogWriter};
use crabykv::SyncPolicy;
use tempfile::TempDir;

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("test.db");
    (temp_dir, log_path)
}

fn read_all(path: &PathBuf) -> Vec<Record> {
    LogReader::open(path)
        .unwrap()
        .records()
        .map(|item| item.unwrap().0)
        .collect()
}

fn file_len(path: &PathBuf) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_new_file_gets_header() {
    let (_temp_dir, log_path) = setup_temp_log();

    let writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();

    assert_eq!(writer.position(), FILE_HEADER_SIZE as u64);
    assert_eq!(file_len(&log_path), FILE_HEADER_SIZE as u64);

    let bytes = fs::read(&log_path).unwrap();
    codec::check_file_header(&bytes).unwrap();
}

// =============================================================================
// Sync Policy Tests
// =============================================================================

#[test]
fn test_every_write_persists_immediately() {
    let (_temp_dir, log_path) = setup_temp_log();
    let mut writer = LogWriter::open(&log_path, SyncPolicy::EveryWrite).unwrap();

    let len = writer.append(RecordRef::put(1, "key", b"value")).unwrap();

    assert_eq!(writer.uncommitted_count(), 0);
    assert!(!writer.has_pending());
    assert_eq!(file_len(&log_path), FILE_HEADER_SIZE as u64 + len as u64);
}

#[test]
fn test_on_demand_buffers_until_sync() {
    let (_temp_dir, log_path) = setup_temp_log();
    let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();

    for i in 0..5u64 {
        writer.append(RecordRef::put(i + 1, "key", b"value")).unwrap();
    }

    assert_eq!(writer.uncommitted_count(), 5);
    assert!(writer.has_pending());
    assert_eq!(file_len(&log_path), FILE_HEADER_SIZE as u64);

    writer.sync().unwrap();

    assert_eq!(writer.uncommitted_count(), 0);
    assert_eq!(writer.buffered_bytes(), 0);
    assert_eq!(file_len(&log_path), writer.position());
    assert_eq!(read_all(&log_path).len(), 5);
}

#[test]
fn test_periodic_syncs_after_max_writes() {
    let (_temp_dir, log_path) = setup_temp_log();
    let policy = SyncPolicy::periodic(3, Duration::from_secs(3600));
    let mut writer = LogWriter::open(&log_path, policy).unwrap();

    writer.append(RecordRef::put(1, "a", b"1")).unwrap();
    writer.append(RecordRef::put(2, "b", b"2")).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(RecordRef::put(3, "c", b"3")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
    assert_eq!(file_len(&log_path), writer.position());
}

#[test]
fn test_sync_without_pending_is_noop() {
    let (_temp_dir, log_path) = setup_temp_log();
    let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();

    writer.sync().unwrap();
    writer.sync().unwrap();

    assert_eq!(writer.position(), FILE_HEADER_SIZE as u64);
}

// =============================================================================
// Buffer Tests
// =============================================================================

#[test]
fn test_full_buffer_spills_to_file() {
    let (_temp_dir, log_path) = setup_temp_log();
    let mut writer = LogWriter::open_with_buffer(&log_path, SyncPolicy::OnDemand, 16).unwrap();

    writer.append(RecordRef::put(1, "key", b"a value longer than the buffer")).unwrap();

    // Written to the file but not yet fsynced
    assert_eq!(writer.buffered_bytes(), 0);
    assert_eq!(writer.flushed_position(), writer.position());
    assert_eq!(writer.uncommitted_count(), 1);
    assert!(writer.has_pending());
}

#[test]
fn test_position_tracks_appends() {
    let (_temp_dir, log_path) = setup_temp_log();
    let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();

    let first = writer.append(RecordRef::put(1, "k1", b"v1")).unwrap();
    let second = writer.append(RecordRef::tombstone(2, "k1")).unwrap();

    let expected = FILE_HEADER_SIZE as u64 + first as u64 + second as u64;
    assert_eq!(writer.position(), expected);
    assert_eq!(writer.flushed_position(), FILE_HEADER_SIZE as u64);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_reopen_appends_after_existing_records() {
    let (_temp_dir, log_path) = setup_temp_log();

    {
        let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();
        writer.append(RecordRef::put(1, "a", b"1")).unwrap();
        writer.append(RecordRef::put(2, "b", b"2")).unwrap();
        writer.sync().unwrap();
    }

    let end = file_len(&log_path);
    {
        let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();
        assert_eq!(writer.position(), end);
        writer.append(RecordRef::put(3, "c", b"3")).unwrap();
        writer.sync().unwrap();
    }

    let records = read_all(&log_path);
    assert_eq!(records.len(), 3);
    assert_eq!(records[2], Record::put(3, "c", b"3".to_vec()));
}

#[test]
fn test_drop_persists_buffered_records() {
    let (_temp_dir, log_path) = setup_temp_log();

    {
        let mut writer = LogWriter::open(&log_path, SyncPolicy::OnDemand).unwrap();
        writer.append(RecordRef::put(1, "key", b"value")).unwrap();
        assert_eq!(file_len(&log_path), FILE_HEADER_SIZE as u64);
    }

    let records = read_all(&log_path);
    assert_eq!(records, vec![Record::put(1, "key", b"value".to_vec())]);
}
