//! The buffer file currently accepting appends.

use crate::error::StorageResult;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Result of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written.
    Written,
    /// The file is past its write age; nothing was written.
    Expired,
    /// The record would push the file past its size limit; nothing was written.
    Full,
}

/// Rotation thresholds captured when a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteLimits {
    /// Age in milliseconds at which the file stops accepting appends.
    pub max_age_millis: u64,
    /// Size in bytes the file may not exceed.
    pub max_size: u64,
}

/// Handle the records are appended through.
///
/// Writes must land at the current end of the file, also after `truncate`.
trait AppendTarget: Write + fmt::Debug + Send {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// An open, append-only buffer file.
///
/// Exactly one exists per signal folder at a time and it is owned by the
/// folder's writer state. Once dropped or closed the file is immutable and
/// belongs to the reader and the eviction policy.
///
/// # Durability
///
/// The file is opened in append mode and each record is handed to the OS
/// with a single `write_all`. If that fails the file is cut back to the last
/// complete record, so the next append starts right after it. If even the
/// cut fails the file refuses further appends and reports itself expired,
/// which makes the writer rotate away from it.
///
/// # Age
///
/// Write age is measured from the clock reading at creation, not from the
/// name. After the clock steps back across a restart the name may lie in
/// the future; the file still rotates on time.
#[derive(Debug)]
pub struct WritableFile {
    path: PathBuf,
    created_at_millis: u64,
    opened_at_millis: u64,
    limits: WriteLimits,
    file: Box<dyn AppendTarget>,
    size: u64,
    broken: bool,
}

impl WritableFile {
    /// Creates a new, empty buffer file named for `created_at_millis`.
    ///
    /// `now_millis` starts the write-age window.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create(
        path: &Path,
        created_at_millis: u64,
        now_millis: u64,
        limits: WriteLimits,
    ) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(path)?;
        Ok(Self::with_target(path, created_at_millis, now_millis, limits, Box::new(file)))
    }

    fn with_target(
        path: &Path,
        created_at_millis: u64,
        now_millis: u64,
        limits: WriteLimits,
        file: Box<dyn AppendTarget>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            created_at_millis,
            opened_at_millis: now_millis,
            limits,
            file,
            size: 0,
            broken: false,
        }
    }

    /// Returns the path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the creation time encoded in the file name.
    pub fn created_at_millis(&self) -> u64 {
        self.created_at_millis
    }

    /// Returns the number of bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file has been open for its full write window, or can no
    /// longer be appended to safely.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.broken
            || now_millis.saturating_sub(self.opened_at_millis) >= self.limits.max_age_millis
    }

    /// Appends an already framed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The file is truncated back to
    /// its previous size; if that also fails the file is marked expired.
    pub fn append(&mut self, record: &[u8], now_millis: u64) -> StorageResult<AppendOutcome> {
        if self.is_expired(now_millis) {
            return Ok(AppendOutcome::Expired);
        }
        if self.size + record.len() as u64 > self.limits.max_size {
            return Ok(AppendOutcome::Full);
        }

        if let Err(e) = self.file.write_all(record) {
            if let Err(trunc) = self.file.truncate(self.size) {
                self.broken = true;
                tracing::warn!(
                    file = %self.path.display(),
                    error = %trunc,
                    "could not cut back partially written record"
                );
            }
            return Err(e.into());
        }
        self.size += record.len() as u64;

        Ok(AppendOutcome::Written)
    }

    /// Flushes the file to disk and closes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn close(mut self) -> StorageResult<()> {
        self.file.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{encode_record, RecordReader};
    use tempfile::tempdir;

    /// Passes writes through to a real file, except one that stops after
    /// `partial` bytes and fails.
    #[derive(Debug)]
    struct FlakyFile {
        file: File,
        writes_before_failure: Option<usize>,
        partial: usize,
        fail_truncate: bool,
    }

    impl Write for FlakyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.writes_before_failure {
                Some(0) => {
                    self.writes_before_failure = None;
                    self.file.write_all(&buf[..self.partial.min(buf.len())])?;
                    Err(io::Error::new(io::ErrorKind::Other, "disk full"))
                }
                Some(n) => {
                    self.writes_before_failure = Some(n - 1);
                    self.file.write(buf)
                }
                None => self.file.write(buf),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl AppendTarget for FlakyFile {
        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if self.fail_truncate {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only"));
            }
            self.file.set_len(len)
        }

        fn sync(&mut self) -> io::Result<()> {
            self.file.sync_data()
        }
    }

    /// A file whose second write fails half way.
    fn flaky(path: &Path, fail_truncate: bool) -> WritableFile {
        let file = OpenOptions::new().append(true).create_new(true).open(path).unwrap();
        let target = FlakyFile {
            file,
            writes_before_failure: Some(1),
            partial: 50,
            fail_truncate,
        };
        let limits = WriteLimits {
            max_age_millis: 1_000,
            max_size: 10_000,
        };
        WritableFile::with_target(path, 1_000, 1_000, limits, Box::new(target))
    }

    fn read_back(path: &Path) -> Vec<Vec<u8>> {
        let mut reader = RecordReader::new(std::fs::File::open(path).unwrap());
        let mut out = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            out.push(record);
        }
        assert!(!reader.is_truncated());
        out
    }

    const LIMITS: WriteLimits = WriteLimits {
        max_age_millis: 1_000,
        max_size: 100,
    };

    #[test]
    fn create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1000");

        let file = WritableFile::create(&path, 1_000, 1_000, LIMITS).unwrap();
        assert_eq!(file.size(), 0);
        assert_eq!(file.created_at_millis(), 1_000);
        assert_eq!(file.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1000");
        std::fs::write(&path, b"old").unwrap();

        assert!(WritableFile::create(&path, 1_000, 1_000, LIMITS).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn append_writes_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1000");
        let mut file = WritableFile::create(&path, 1_000, 1_000, LIMITS).unwrap();

        let record = encode_record(b"hello").unwrap();
        assert_eq!(file.append(&record, 1_001).unwrap(), AppendOutcome::Written);
        assert_eq!(file.append(&record, 1_002).unwrap(), AppendOutcome::Written);
        assert_eq!(file.size(), 18);

        file.close().unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 18);
        assert_eq!(&data[4..9], b"hello");
    }

    #[test]
    fn full_when_record_does_not_fit() {
        let dir = tempdir().unwrap();
        let mut file = WritableFile::create(&dir.path().join("1000"), 1_000, 1_000, LIMITS).unwrap();

        let record = vec![0u8; 40];
        assert_eq!(file.append(&record, 1_000).unwrap(), AppendOutcome::Written);
        assert_eq!(file.append(&record, 1_000).unwrap(), AppendOutcome::Written);
        assert_eq!(file.append(&record, 1_000).unwrap(), AppendOutcome::Full);
        assert_eq!(file.size(), 80);
    }

    #[test]
    fn exactly_filling_the_file_is_allowed() {
        let dir = tempdir().unwrap();
        let mut file = WritableFile::create(&dir.path().join("1000"), 1_000, 1_000, LIMITS).unwrap();

        assert_eq!(
            file.append(&[1u8; 100], 1_000).unwrap(),
            AppendOutcome::Written
        );
        assert_eq!(file.append(&[1u8; 1], 1_000).unwrap(), AppendOutcome::Full);
    }

    #[test]
    fn expires_at_write_age() {
        let dir = tempdir().unwrap();
        let mut file = WritableFile::create(&dir.path().join("1000"), 1_000, 1_000, LIMITS).unwrap();

        assert!(!file.is_expired(1_999));
        assert_eq!(file.append(b"x", 1_999).unwrap(), AppendOutcome::Written);
        assert!(file.is_expired(2_000));
        assert_eq!(file.append(b"x", 2_000).unwrap(), AppendOutcome::Expired);
        assert_eq!(file.size(), 1);
    }

    #[test]
    fn failed_write_leaves_no_gap_before_the_next_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1000");
        let mut file = flaky(&path, false);

        let first = encode_record(&[1u8; 997]).unwrap();
        assert_eq!(file.append(&first, 1_000).unwrap(), AppendOutcome::Written);
        assert!(file.append(&encode_record(&[2u8; 96]).unwrap(), 1_000).is_err());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1_001);

        let third = encode_record(b"third").unwrap();
        assert_eq!(file.append(&third, 1_001).unwrap(), AppendOutcome::Written);
        assert_eq!(file.size(), 1_010);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1_010);
        assert_eq!(read_back(&path), vec![vec![1u8; 997], b"third".to_vec()]);
    }

    #[test]
    fn file_that_cannot_be_cut_back_stops_taking_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1000");
        let mut file = flaky(&path, true);

        let record = encode_record(b"kept").unwrap();
        assert_eq!(file.append(&record, 1_000).unwrap(), AppendOutcome::Written);
        assert!(file.append(&encode_record(&[2u8; 96]).unwrap(), 1_000).is_err());

        assert!(file.is_expired(1_000));
        assert_eq!(file.append(&record, 1_000).unwrap(), AppendOutcome::Expired);
        assert_eq!(file.size(), 8);
    }

    #[test]
    fn write_age_counts_from_opening_not_from_the_name() {
        let dir = tempdir().unwrap();
        // Named in the future, as after the clock stepped back.
        let file = WritableFile::create(&dir.path().join("5000"), 5_000, 1_000, LIMITS).unwrap();

        assert!(!file.is_expired(1_999));
        assert!(file.is_expired(2_000));
    }
}
