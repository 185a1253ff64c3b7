//! # crabykv
//!
//! An embedded, durable, synchronous key-value store with:
//! - A single append-only backing file with CRC32-checked records
//! - Crash recovery that truncates torn or damaged tails
//! - Compaction to reclaim space from overwrites and deletes
//! - Single-writer/multi-reader concurrency; reads never touch the file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Binding Surface (KvModule)                   │
//! │            initialize/set/get/remove/keys/...                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                 │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Storage   │          │    Index    │
//!   │   (Mutex)   │          │  (RwLock)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │    Codec    │
//!   │ (CRC frames)│
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use crabykv::Store;
//!
//! let store = Store::open_path("/tmp/crabykv.db")?;
//! store.set("test-key", "Hello, world!")?;
//! assert_eq!(store.get("test-key"), Some(b"Hello, world!".to_vec()));
//! store.flush()?;
//! # Ok::<(), crabykv::KvError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod index;
pub mod storage;
pub mod lock;
pub mod store;
pub mod binding;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use binding::{KvModule, NativeKv};
pub use config::{Config, SyncPolicy};
pub use error::{KvError, Result};
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of crabykv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
