//! Index Module
//!
//! In-memory map from key to the latest live value.
//!
//! ## Responsibilities
//! - O(1) expected point lookups, inserts and removals
//! - Stable insertion-order key listing
//! - Track the encoded size of live records (drives compaction)
//!
//! ## Data Structure Choice
//! A `HashMap<String, usize>` of slot positions plus a slot vector:
//! - Lookups hash once, then index the vector
//! - Removal leaves a hole; holes are vacuumed once they outnumber live slots
//! - Overwriting a key keeps its original position
//!
//! The index has no locking of its own. The store wraps it in a `RwLock`.

mod table;

pub use table::{Index, IndexIter};

/// Entry stored in the Index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The live value
    pub value: Vec<u8>,

    /// Sequence number of the record that wrote `value`
    pub sequence: u64,

    /// Size of that record's frame in the backing file
    pub encoded_len: u32,
}

impl IndexEntry {
    pub fn new(value: Vec<u8>, sequence: u64, encoded_len: u32) -> Self {
        Self {
            value,
            sequence,
            encoded_len,
        }
    }
}
