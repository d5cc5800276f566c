//! Crash simulation for buffer files.
//!
//! A process that dies mid-append leaves a buffer file ending in part of a
//! record. These helpers produce such files directly so replay can be tested
//! without killing anything.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use diskbuf_testkit::crash::{newest_buffer_file, truncate_tail};
//!
//! let file = newest_buffer_file(&folder.signal_path("spans")).unwrap();
//! truncate_tail(&file, 3)?;
//! ```

use diskbuf_storage::scan_folder;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Cuts `bytes` off the end of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or resized.
pub fn truncate_tail(path: &Path, bytes: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let new_len = len.saturating_sub(bytes);
    file.set_len(new_len)?;
    file.sync_all()?;
    Ok(new_len)
}

/// Appends the start of a record that never finished: a length prefix
/// announcing `claimed_len` bytes followed by `written` of them.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn append_torn_record(path: &Path, claimed_len: u32, written: usize) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&claimed_len.to_be_bytes())?;
    file.write_all(&vec![0xA5; written.min(claimed_len as usize)])?;
    file.sync_all()
}

/// Appends raw bytes to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn append_garbage(path: &Path, garbage: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(garbage)?;
    file.sync_all()
}

/// Every buffer file in a signal folder, oldest first.
pub fn buffer_files(folder: &Path) -> Vec<PathBuf> {
    scan_folder(folder)
        .map(|entries| entries.into_iter().map(|e| e.path).collect())
        .unwrap_or_default()
}

/// The newest buffer file in a signal folder.
pub fn newest_buffer_file(folder: &Path) -> Option<PathBuf> {
    buffer_files(folder).pop()
}
