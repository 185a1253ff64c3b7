//! Storage Module
//!
//! The durability engine behind a store: a single append-only file.
//!
//! ## Responsibilities
//! - Append encoded records under the configured sync policy
//! - Replay the file into the index on startup (crash recovery)
//! - Reclaim space from overwrites and deletes by compaction
//! - Periodic background sync
//!
//! ## Write Path
//! ```text
//! record ──encode──▶ write buffer ──policy──▶ file ──policy──▶ fsync
//! ```
//!
//! ## Compaction
//! ```text
//! live index entries ──▶ <file>.compact ──fsync──▶ open writer ──▶ rename over <file>
//! ```

mod compaction;
mod flusher;
mod manager;
mod reader;
mod recovery;
mod writer;

pub use compaction::{stage, temp_path, CompactionStats, StagedImage};
pub use flusher::Flusher;
pub use manager::{Appended, StorageManager};
pub use reader::{LogIterator, LogReader};
pub use recovery::{LogRecovery, RecoveryResult};
pub use writer::{LogWriter, DEFAULT_BUFFER_SIZE};
