//! Reading a closed buffer file record by record.
//!
//! The reader never works on the buffer file itself. Opening copies the file
//! to a temporary path and all reads come from the copy; progress is only
//! written back to the buffer file when the reader is closed. A crash before
//! that leaves the buffer file intact, so records are delivered at least once.

use crate::error::StorageResult;
use crate::folder::{BufferFileEntry, PARTIAL_EXTENSION};
use crate::namer::TemporaryFileNamer;
use crate::record::RecordReader;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// What closing a reader did to its buffer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Every record was consumed and the buffer file was deleted.
    Deleted,
    /// The unconsumed records were written back to the buffer file.
    Rewritten,
    /// Nothing was consumed; the buffer file was left as is.
    Untouched,
}

/// A closed buffer file being replayed.
#[derive(Debug)]
pub struct ReadableFile {
    source: PathBuf,
    created_at_millis: u64,
    temp_path: PathBuf,
    reader: RecordReader<BufReader<File>>,
    held: Option<Vec<u8>>,
    consumed: u64,
}

impl ReadableFile {
    /// Opens `entry` for reading through a temporary copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be made or opened.
    pub fn open(entry: &BufferFileEntry, namer: &dyn TemporaryFileNamer) -> StorageResult<Self> {
        let prefix = temp_prefix(&entry.path, entry.created_at_millis);
        let temp_path = namer.temporary_path(&prefix);
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.path, &temp_path)?;

        let file = match File::open(&temp_path) {
            Ok(f) => f,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e.into());
            }
        };

        Ok(Self {
            source: entry.path.clone(),
            created_at_millis: entry.created_at_millis,
            temp_path,
            reader: RecordReader::new(BufReader::new(file)),
            held: None,
            consumed: 0,
        })
    }

    /// Returns the buffer file this reader replays.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the creation time of the buffer file.
    pub fn created_at_millis(&self) -> u64 {
        self.created_at_millis
    }

    /// Returns the next unconsumed record.
    ///
    /// The record stays held until [`ReadableFile::consume`] is called, so a
    /// record that could not be delivered is returned again next time.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the copy fails.
    pub fn next_record(&mut self) -> StorageResult<Option<&[u8]>> {
        if self.held.is_none() {
            self.held = self.reader.next_record()?;
        }
        Ok(self.held.as_deref())
    }

    /// Marks the held record as delivered.
    pub fn consume(&mut self) {
        if self.held.take().is_some() {
            self.consumed = self.reader.position();
        }
    }

    /// Whether every complete record has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.held.is_none() && self.reader.is_finished()
    }

    /// Whether the file ended in an incomplete record.
    pub fn is_truncated(&self) -> bool {
        self.reader.is_truncated()
    }

    /// Commits progress to the buffer file and removes the copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer file cannot be deleted or rewritten.
    pub fn close(mut self) -> StorageResult<CloseOutcome> {
        if self.is_exhausted() {
            match fs::remove_file(&self.source) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(CloseOutcome::Deleted);
        }

        if self.consumed == 0 {
            return Ok(CloseOutcome::Untouched);
        }

        self.write_back_remainder()?;
        Ok(CloseOutcome::Rewritten)
    }

    /// Drops the reader without touching the buffer file.
    pub fn discard(self) {}

    fn write_back_remainder(&mut self) -> StorageResult<()> {
        let partial = self.source.with_extension(PARTIAL_EXTENSION);

        let mut copy = File::open(&self.temp_path)?;
        copy.seek(SeekFrom::Start(self.consumed))?;

        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial)?;
        let result = io::copy(&mut copy, &mut out)
            .and_then(|_| out.sync_data())
            .and_then(|()| fs::rename(&partial, &self.source));

        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for ReadableFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    file = %self.temp_path.display(),
                    error = %e,
                    "could not remove temporary read copy"
                );
            }
        }
    }
}

fn temp_prefix(source: &Path, created_at_millis: u64) -> String {
    match source
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
    {
        Some(folder) => format!("{folder}-{created_at_millis}"),
        None => created_at_millis.to_string(),
    }
}
