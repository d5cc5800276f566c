//! Length-prefixed record framing.
//!
//! Every buffer file is a bare sequence of records:
//!
//! ```text
//! | length (4, big-endian) | payload (length) | length | payload | ...
//! ```
//!
//! There is no header, footer or checksum. A record is the unit of
//! atomicity: a length prefix or payload cut short by a crash marks the end
//! of the readable data and is never reported as an error.

use crate::error::{StorageError, StorageResult};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Frames `payload` as `[length][payload]`.
///
/// # Errors
///
/// Returns [`StorageError::RecordTooLarge`] if the payload length does not fit
/// in the 4-byte prefix.
pub fn encode_record(payload: &[u8]) -> StorageResult<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| StorageError::RecordTooLarge {
        len: (payload.len() + LENGTH_PREFIX_SIZE) as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut data = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    data.extend_from_slice(&len.to_be_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// Returns the on-disk size of a record carrying `payload_len` bytes.
pub fn framed_len(payload_len: usize) -> u64 {
    (LENGTH_PREFIX_SIZE + payload_len) as u64
}

/// Streams records out of a reader in append order.
///
/// A short length prefix or payload ends iteration; [`RecordReader::is_truncated`]
/// reports whether that happened. `position` always points just past the last
/// complete record, which is where the unread remainder of a file starts.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    position: u64,
    truncated: bool,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    /// Wraps a reader positioned at the start of a record.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            truncated: false,
            finished: false,
        }
    }

    /// Offset just past the last complete record returned.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether iteration stopped on an incomplete record.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Whether the end of the readable data has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reads the next complete record.
    ///
    /// Returns `Ok(None)` at the end of the data or on a truncated record.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures of the underlying reader.
    pub fn next_record(&mut self) -> StorageResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let got = read_up_to(&mut self.inner, &mut prefix)?;
        if got == 0 {
            self.finished = true;
            return Ok(None);
        }
        if got < LENGTH_PREFIX_SIZE {
            self.finished = true;
            self.truncated = true;
            return Ok(None);
        }

        let len = u64::from(u32::from_be_bytes(prefix));
        // Grows with the data actually present, so a garbage prefix cannot
        // force a huge allocation.
        let mut payload = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < len {
            self.finished = true;
            self.truncated = true;
            return Ok(None);
        }

        self.position += LENGTH_PREFIX_SIZE as u64 + len;
        Ok(Some(payload))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = StorageResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Shape of a buffer file as seen by a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordSummary {
    /// Number of complete records.
    pub records: usize,
    /// Bytes covered by complete records.
    pub valid_len: u64,
    /// Total file length.
    pub file_len: u64,
    /// Whether the file ends in an incomplete record.
    pub truncated: bool,
}

/// Scans a buffer file without decoding payloads.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn summarize(path: &Path) -> StorageResult<RecordSummary> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = RecordReader::new(BufReader::new(file));
    let mut records = 0;
    while reader.next_record()?.is_some() {
        records += 1;
    }
    Ok(RecordSummary {
        records,
        valid_len: reader.position(),
        file_len,
        truncated: reader.is_truncated(),
    })
}
