//! Background Flusher
//!
//! Syncs pending records on a timer under the periodic sync policy.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::Result;

use super::StorageManager;

/// Handle to the flusher thread
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct Flusher {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    /// Spawn a flusher that syncs `storage` every `interval`
    ///
    /// Holds only a weak reference; the thread exits on its own once the
    /// storage is gone.
    pub fn spawn(storage: Weak<Mutex<StorageManager>>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("crabykv-flusher".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    channel::select! {
                        recv(ticker) -> _ => {
                            let Some(storage) = storage.upgrade() else {
                                break;
                            };
                            let mut storage = storage.lock();
                            if storage.has_pending() {
                                if let Err(e) = storage.sync() {
                                    tracing::warn!(
                                        path = %storage.path().display(),
                                        error = %e,
                                        "periodic sync failed"
                                    );
                                }
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::trace!("flusher stopped");
            })?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "flusher started");

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
