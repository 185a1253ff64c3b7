//! Exclusive Open
//!
//! A backing file may be held by one open store at a time.
//!
//! Two layers enforce this:
//! - A process-wide registry of canonical paths, so a second handle in the
//!   same process fails without touching the filesystem
//! - An advisory `flock` on `<file>.lock`, so a second process fails too
//!
//! The OS lock sits on a sidecar file rather than the backing file itself
//! because compaction renames a new inode over the backing path.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex};

use crate::error::{KvError, Result};

/// Suffix of the sidecar file holding the OS lock
pub const LOCK_SUFFIX: &str = "lock";

/// Canonical paths of every open store in this process
static OPEN_PATHS: Mutex<BTreeSet<PathBuf>> = const_mutex(BTreeSet::new());

/// Claim on a backing file; released on drop
#[derive(Debug)]
pub struct PathLock {
    path: PathBuf,

    /// Holds the OS lock until closed
    _file: File,
}

impl PathLock {
    /// Claim `path`, which must already be canonical
    ///
    /// Fails with `StoreOpen` if another handle in this process or another
    /// process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut open = OPEN_PATHS.lock();
        if !open.insert(path.to_path_buf()) {
            return Err(KvError::open(path, "already held by another open store"));
        }

        match lock_file(path) {
            Ok(file) => Ok(Self {
                path: path.to_path_buf(),
                _file: file,
            }),
            Err(e) => {
                open.remove(path);
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        OPEN_PATHS.lock().remove(&self.path);
    }
}

/// Path of the sidecar lock file for `path`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(LOCK_SUFFIX);
    path.with_file_name(name)
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))
        .map_err(|e| KvError::open(path, e))
}

/// Open the sidecar and take a non-blocking exclusive `flock` on it
#[cfg(unix)]
fn lock_file(path: &Path) -> Result<File> {
    use std::io;
    use std::os::unix::io::AsRawFd;

    let file = open_lock_file(path)?;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return Err(KvError::open(path, "locked by another process"));
        }
        return Err(KvError::open(path, err));
    }

    Ok(file)
}

#[cfg(not(unix))]
fn lock_file(path: &Path) -> Result<File> {
    open_lock_file(path)
}
