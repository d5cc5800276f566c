//! Signal folder layout, scanning and read selection.
//!
//! ```text
//! <root>/<signal>/
//! ├─ LOCK              # Advisory lock, one live Storage per folder
//! ├─ 1700000000000     # Closed buffer file (name = creation time in ms)
//! ├─ 1700000030000     # ...
//! └─ 1700000060000     # Currently written file
//! ```
//!
//! Anything whose name is not a decimal timestamp is ignored.

use crate::config::StorageConfiguration;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Name of the lock file inside each signal folder.
pub const LOCK_FILE: &str = "LOCK";

/// Extension of the sibling file a partly read buffer file is rewritten
/// through before it is renamed over the original.
pub(crate) const PARTIAL_EXTENSION: &str = "partial";

/// A closed or open buffer file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFileEntry {
    /// Full path of the file.
    pub path: PathBuf,
    /// Creation time parsed from the file name.
    pub created_at_millis: u64,
    /// Size in bytes at scan time.
    pub size: u64,
}

impl BufferFileEntry {
    /// Age of the file relative to `now_millis`.
    pub fn age_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.created_at_millis)
    }

    /// Whether the age falls inside the read eligibility window.
    pub fn is_readable(&self, now_millis: u64, config: &StorageConfiguration) -> bool {
        let age = self.age_millis(now_millis);
        age >= config.min_file_age_for_read_millis() && age <= config.max_file_age_for_read_millis()
    }
}

/// Parses a buffer file name into its creation time.
pub fn parse_file_name(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Formats the file name for a creation time.
pub fn file_name_for(created_at_millis: u64) -> String {
    created_at_millis.to_string()
}

/// Lists buffer files in `dir`, oldest first.
///
/// Files removed between listing and stat are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn scan_folder(dir: &Path) -> StorageResult<Vec<BufferFileEntry>> {
    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name();
        let Some(created_at_millis) = name.to_str().and_then(parse_file_name) else {
            continue;
        };
        let metadata = match dir_entry.metadata() {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            continue;
        }
        entries.push(BufferFileEntry {
            path: dir_entry.path(),
            created_at_millis,
            size: metadata.len(),
        });
    }
    entries.sort_by_key(|e| e.created_at_millis);
    Ok(entries)
}

/// Picks the oldest file inside the read window, skipping the open file.
pub fn select_oldest_readable<'a>(
    entries: &'a [BufferFileEntry],
    open: Option<&Path>,
    now_millis: u64,
    config: &StorageConfiguration,
) -> Option<&'a BufferFileEntry> {
    entries
        .iter()
        .filter(|e| open != Some(e.path.as_path()))
        .find(|e| e.is_readable(now_millis, config))
}

/// An exclusively locked signal folder.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct SignalFolder {
    path: PathBuf,
    _lock_file: File,
}

impl SignalFolder {
    /// Creates the folder if needed and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FolderLocked`] if another handle holds the
    /// lock, or an I/O error.
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::FolderLocked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the folder path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the buffer files in this folder, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read.
    pub fn scan(&self) -> StorageResult<Vec<BufferFileEntry>> {
        scan_folder(&self.path)
    }

    /// Path of the buffer file created at `created_at_millis`.
    #[must_use]
    pub fn file_path(&self, created_at_millis: u64) -> PathBuf {
        self.path.join(file_name_for(created_at_millis))
    }

    /// Deletes `<millis>.partial` files left by a rewrite that never reached
    /// its rename. The original buffer file is still intact in that case.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read or a file cannot be
    /// removed.
    pub fn remove_stale_partials(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.path)? {
            let path = dir_entry?.path();
            let is_partial = path.extension().is_some_and(|e| e == PARTIAL_EXTENSION)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(parse_file_name)
                    .is_some();
            if !is_partial {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}
