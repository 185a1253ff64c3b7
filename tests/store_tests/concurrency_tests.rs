//! Concurrency tests for the Store
//!
//! These tests verify:
//! - Readers never observe a half-applied mutation
//! - Concurrent writers lose no updates
//! - The file agrees with memory after concurrent use

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crabykv::Store;
use tempfile::TempDir;

fn setup_temp_store() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    (temp_dir, path)
}

#[test]
fn test_concurrent_writers_distinct_keys() {
    let (_temp_dir, path) = setup_temp_store();
    let store = Arc::new(Store::open_path(&path).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..250 {
                    store.set(&format!("t{}-k{}", t, i), format!("{}", i)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.size(), 1000);
    assert_eq!(store.stats().last_sequence, 1000);
    assert_eq!(store.get("t3-k249"), Some(b"249".to_vec()));
}

#[test]
fn test_readers_see_whole_values() {
    let (_temp_dir, path) = setup_temp_store();
    let store = Arc::new(Store::open_path(&path).unwrap());
    store.set("shared", "a".repeat(64)).unwrap();

    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    let value = store.get("shared").unwrap();
                    assert_eq!(value.len(), 64);
                    assert!(value.iter().all(|&b| b == value[0]));
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 0..2000 {
        let fill = if i % 2 == 0 { "b" } else { "a" };
        store.set("shared", fill.repeat(64)).unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_concurrent_set_and_remove_matches_file() {
    let (_temp_dir, path) = setup_temp_store();
    let store = Arc::new(Store::open_path(&path).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("key{}", i % 20);
                    if (i + t) % 3 == 0 {
                        store.remove(&key).unwrap();
                    } else {
                        store.set(&key, format!("t{}-{}", t, i)).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let keys = store.keys();
    let values: Vec<_> = keys.iter().map(|k| store.get(k)).collect();

    let store = Arc::try_unwrap(store).ok().unwrap();
    store.close().unwrap();

    let reopened = Store::open_path(&path).unwrap();
    assert_eq!(reopened.keys(), keys);
    let reopened_values: Vec<_> = keys.iter().map(|k| reopened.get(k)).collect();
    assert_eq!(reopened_values, values);
}
