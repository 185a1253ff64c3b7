//! Compaction
//!
//! Rewrites the backing file so it holds only the given records.
//!
//! A rewrite happens in two steps:
//! 1. `stage` builds the new image in `<file>.compact` and fsyncs it
//! 2. `StagedImage::commit` renames it over the original
//!
//! A crash before the rename leaves the old file untouched (the stale temp
//! file is removed on the next open); a crash after it leaves the complete
//! new file. The caller can open the temp file between the two steps, so
//! nothing that can fail remains once the rename has landed.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::codec::{self, RecordRef, FILE_HEADER_SIZE};
use crate::error::Result;

/// Suffix of the temporary file a rewrite builds
pub const COMPACT_SUFFIX: &str = "compact";

/// Outcome of a rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Size of the file before the rewrite
    pub bytes_before: u64,

    /// Size of the file after the rewrite
    pub bytes_after: u64,

    /// Records carried over
    pub records_written: u64,
}

impl CompactionStats {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Path of the temporary file used while rewriting `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(COMPACT_SUFFIX);
    path.with_file_name(name)
}

/// Remove a temp file left behind by an interrupted rewrite
///
/// Returns true if one was found.
pub fn remove_stale_temp(path: &Path) -> Result<bool> {
    let temp = temp_path(path);
    match fs::remove_file(&temp) {
        Ok(()) => {
            tracing::warn!(path = %temp.display(), "removed stale compaction file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// A fully written and fsynced image waiting to replace the live file
///
/// Dropping it without calling `commit` deletes the temp file.
#[derive(Debug)]
pub struct StagedImage {
    temp: PathBuf,
    bytes: u64,
    records: u64,
    committed: bool,
}

impl StagedImage {
    /// Path of the temp file holding the image
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Size of the image in bytes, header included
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Records in the image
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Atomically rename the image over `path`
    ///
    /// Once this returns `Ok` the new image is the live file. Failing to
    /// fsync the parent directory afterwards is only logged: the rename has
    /// already landed and cannot be undone.
    pub fn commit(mut self, path: &Path) -> Result<()> {
        fs::rename(&self.temp, path)?;
        self.committed = true;

        if let Err(e) = sync_parent_dir(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to sync directory after rename");
        }
        Ok(())
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Write a log holding exactly `records` next to `path`
///
/// The image starts with a header carrying `base_sequence`. On error no
/// temp file is left behind.
pub fn stage<'a, I>(path: &Path, base_sequence: u64, records: I) -> Result<StagedImage>
where
    I: IntoIterator<Item = RecordRef<'a>>,
{
    let temp = temp_path(path);

    match write_image(&temp, base_sequence, records) {
        Ok((bytes, records)) => Ok(StagedImage {
            temp,
            bytes,
            records,
            committed: false,
        }),
        Err(e) => {
            let _ = fs::remove_file(&temp);
            Err(e)
        }
    }
}

/// Write header plus records to `temp` and fsync it
fn write_image<'a, I>(temp: &Path, base_sequence: u64, records: I) -> Result<(u64, u64)>
where
    I: IntoIterator<Item = RecordRef<'a>>,
{
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);

    writer.write_all(&codec::file_header(base_sequence))?;
    let mut bytes_written = FILE_HEADER_SIZE as u64;
    let mut records_written = 0u64;

    let mut frame = BytesMut::with_capacity(4096);
    for record in records {
        frame.clear();
        codec::encode_into(record, &mut frame)?;
        writer.write_all(&frame)?;
        bytes_written += frame.len() as u64;
        records_written += 1;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    Ok((bytes_written, records_written))
}

/// fsync the directory holding `path` so the rename is durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        fs::File::open(dir)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
