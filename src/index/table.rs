//! Index implementation
//!
//! Hash map of slot positions over an insertion-ordered slot vector.

use std::collections::HashMap;

use crate::codec::Record;

use super::IndexEntry;

/// Holes tolerated before a vacuum is considered
const MIN_VACUUM_HOLES: usize = 64;

/// In-memory index of live keys
#[derive(Debug, Default)]
pub struct Index {
    /// key → position in `entries`
    slots: HashMap<String, usize>,

    /// Insertion-ordered entries; `None` marks a removed key
    entries: Vec<Option<(String, IndexEntry)>>,

    /// Sum of `encoded_len` over live entries
    live_bytes: u64,
}

impl Index {
    /// Create a new empty Index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an Index sized for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            live_bytes: 0,
        }
    }

    /// Get the entry for a key
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        let slot = *self.slots.get(key)?;
        self.entries[slot].as_ref().map(|(_, entry)| entry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Insert or overwrite a key, returning the previous entry
    ///
    /// An overwritten key keeps its position in `list_keys`.
    pub fn put(&mut self, key: String, entry: IndexEntry) -> Option<IndexEntry> {
        self.live_bytes += entry.encoded_len as u64;

        if let Some(&slot) = self.slots.get(&key) {
            if let Some((_, current)) = self.entries[slot].as_mut() {
                let previous = std::mem::replace(current, entry);
                self.live_bytes -= previous.encoded_len as u64;
                return Some(previous);
            }
        }

        self.slots.insert(key.clone(), self.entries.len());
        self.entries.push(Some((key, entry)));
        None
    }

    /// Remove a key, returning its entry if it was live
    pub fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let slot = self.slots.remove(key)?;
        let (_, entry) = self.entries[slot].take()?;
        self.live_bytes -= entry.encoded_len as u64;
        self.maybe_vacuum();
        Some(entry)
    }

    /// Replay a persisted record
    ///
    /// Records older than the current entry for the same key are ignored.
    /// Returns true if the index changed.
    pub fn apply(&mut self, record: Record, encoded_len: u32) -> bool {
        if let Some(current) = self.get(&record.key) {
            if current.sequence > record.sequence {
                return false;
            }
        }

        if record.tombstone {
            self.remove(&record.key).is_some()
        } else {
            let entry = IndexEntry::new(record.value, record.sequence, encoded_len);
            self.put(record.key, entry);
            true
        }
    }

    /// Live keys in insertion order
    pub fn list_keys(&self) -> Vec<String> {
        self.iter().map(|(key, _)| key.to_string()).collect()
    }

    /// Number of live keys
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total encoded size of the records backing live keys
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    /// Remove every key
    pub fn clear(&mut self) {
        self.slots.clear();
        self.entries.clear();
        self.live_bytes = 0;
    }

    /// Iterate live entries in insertion order
    pub fn iter(&self) -> IndexIter<'_> {
        IndexIter {
            inner: self.entries.iter(),
        }
    }

    /// Drop holes once they dominate the slot vector
    fn maybe_vacuum(&mut self) {
        let holes = self.entries.len() - self.slots.len();
        if holes < MIN_VACUUM_HOLES || holes <= self.slots.len() {
            return;
        }

        self.entries.retain(Option::is_some);
        for (position, slot) in self.entries.iter().enumerate() {
            if let Some((key, _)) = slot {
                if let Some(target) = self.slots.get_mut(key.as_str()) {
                    *target = position;
                }
            }
        }
    }
}

/// Iterator over live Index entries
pub struct IndexIter<'a> {
    inner: std::slice::Iter<'a, Option<(String, IndexEntry)>>,
}

impl<'a> Iterator for IndexIter<'a> {
    type Item = (&'a str, &'a IndexEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find_map(|slot| slot.as_ref().map(|(key, entry)| (key.as_str(), entry)))
    }
}
