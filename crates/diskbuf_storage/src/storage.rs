//! Per-signal buffering engine.
//!
//! [`Storage`] ties the writer, the reader and eviction together for one
//! signal folder.
//!
//! ## Locking
//!
//! - The folder lock (`state`) covers the open writable file, rotation,
//!   eviction, read selection and every deletion or rewrite of a buffer file.
//! - The reader lock (`reader`) serialises the single replay path.
//! - Lock order is reader then folder. The record processor runs while only
//!   the reader lock is held, so slow exports never stall appends.

use crate::clock::{Clock, SystemClock};
use crate::config::StorageConfiguration;
use crate::error::{StorageError, StorageResult};
use crate::eviction::{Eviction, EvictionPolicy, EvictionReason};
use crate::folder::{select_oldest_readable, BufferFileEntry, SignalFolder};
use crate::readable::{CloseOutcome, ReadableFile};
use crate::record::encode_record;
use crate::stats::StorageStats;
use crate::writable::{AppendOutcome, WritableFile, WriteLimits};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Number of files an append may try before giving up.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// What the record processor decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    /// The record is done with (delivered, or unusable and skipped).
    Consume,
    /// The record must be offered again on a later pass.
    Retain,
}

/// Result of one [`Storage::read_and_process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A record was processed and consumed.
    Processed,
    /// A record was offered but retained for a later pass.
    Retained,
    /// No eligible record is available right now.
    NoData,
}

#[derive(Debug)]
struct FolderState {
    writable: Option<WritableFile>,
    last_created_millis: u64,
    closed: bool,
}

enum HeldFile {
    Live,
    Gone,
    Expired,
}

/// Durable buffer for one signal kind.
///
/// # Example
///
/// ```no_run
/// use diskbuf_storage::{ReadOutcome, RecordDisposition, Storage, StorageConfiguration};
/// use std::path::Path;
///
/// let storage = Storage::open(Path::new("buffer/spans"), StorageConfiguration::default())?;
/// storage.write(b"serialized batch")?;
///
/// // Later, once the file is old enough to be read:
/// while storage.read_and_process(|_payload| RecordDisposition::Consume)? == ReadOutcome::Processed {}
/// # Ok::<(), diskbuf_storage::StorageError>(())
/// ```
pub struct Storage {
    folder: SignalFolder,
    name: String,
    config: StorageConfiguration,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<FolderState>,
    reader: Mutex<Option<ReadableFile>>,
    stats: StorageStats,
}

impl Storage {
    /// Opens the signal folder at `path` using the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or is locked.
    pub fn open(path: &Path, config: StorageConfiguration) -> StorageResult<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock))
    }

    /// Opens the signal folder at `path` with an explicit clock.
    ///
    /// Files left behind by an earlier process are treated as closed; new
    /// appends always go to a fresh file. Leftovers of an interrupted
    /// rewrite are deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or is locked.
    pub fn open_with_clock(
        path: &Path,
        config: StorageConfiguration,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<Self> {
        let folder = SignalFolder::open(path)?;
        let stale = folder.remove_stale_partials()?;
        if stale > 0 {
            tracing::debug!(folder = %path.display(), files = stale, "removed interrupted rewrites");
        }
        let last_created_millis = folder
            .scan()?
            .last()
            .map_or(0, |e| e.created_at_millis);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            folder,
            name,
            policy: EvictionPolicy::from_config(&config),
            config,
            clock,
            state: Mutex::new(FolderState {
                writable: None,
                last_created_millis,
                closed: false,
            }),
            reader: Mutex::new(None),
            stats: StorageStats::new(),
        })
    }

    /// Returns the signal folder path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.folder.path()
    }

    /// Returns the storage configuration.
    pub fn config(&self) -> &StorageConfiguration {
        &self.config
    }

    /// Returns the statistics counters.
    pub fn stats(&self) -> &StorageStats {
        &self.stats
    }

    /// Appends one serialized batch.
    ///
    /// Rotates to a new file when the open one is too old or too full, then
    /// runs the eviction pass (age cap, then size cap). Eviction problems
    /// after a successful append are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch can never fit in a file, the storage
    /// is closed, or the append fails.
    pub fn write(&self, payload: &[u8]) -> StorageResult<()> {
        let record = encode_record(payload)?;
        let len = record.len() as u64;
        if len > self.config.max_file_size() {
            self.stats.record_write_failure();
            return Err(StorageError::RecordTooLarge {
                len,
                max: self.config.max_file_size(),
            });
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }

        let now = self.clock.now_millis();
        if let Err(e) = self.append_locked(&mut state, &record, now) {
            self.stats.record_write_failure();
            tracing::error!(signal = %self.name, error = %e, "failed to buffer batch");
            return Err(e);
        }
        self.stats.record_write(len);

        if let Err(e) = self.evict_locked(&mut state, now) {
            tracing::warn!(signal = %self.name, error = %e, "eviction after write failed");
        }
        Ok(())
    }

    fn append_locked(&self, state: &mut FolderState, record: &[u8], now: u64) -> StorageResult<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            if state.writable.is_none() {
                let writable = self.create_writable(&mut state.last_created_millis, now)?;
                state.writable = Some(writable);
            }
            let Some(writable) = state.writable.as_mut() else {
                continue;
            };
            match writable.append(record, now)? {
                AppendOutcome::Written => return Ok(()),
                AppendOutcome::Expired | AppendOutcome::Full => self.rotate(state),
            }
        }

        Err(StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            "exceeded max number of attempts to write buffered data",
        )))
    }

    fn create_writable(&self, last_created_millis: &mut u64, now: u64) -> StorageResult<WritableFile> {
        let mut created = now.max(last_created_millis.saturating_add(1));
        while self.folder.file_path(created).exists() {
            created += 1;
        }

        let limits = WriteLimits {
            max_age_millis: self.config.max_file_age_for_write_millis(),
            max_size: self.config.max_file_size(),
        };
        let writable =
            WritableFile::create(&self.folder.file_path(created), created, now, limits)?;
        *last_created_millis = created;
        self.stats.record_file_created();
        tracing::debug!(signal = %self.name, file = %writable.path().display(), "opened buffer file");
        Ok(writable)
    }

    fn rotate(&self, state: &mut FolderState) {
        if let Some(writable) = state.writable.take() {
            tracing::debug!(
                signal = %self.name,
                file = %writable.path().display(),
                bytes = writable.size(),
                "closed buffer file"
            );
            if let Err(e) = writable.close() {
                tracing::warn!(signal = %self.name, error = %e, "failed to sync closed buffer file");
            }
        }
    }

    fn evict_locked(&self, state: &mut FolderState, now: u64) -> StorageResult<usize> {
        let entries = self.folder.scan()?;
        let open = state.writable.as_ref().map(|w| w.path().to_path_buf());
        let evictions = self.policy.plan(&entries, open.as_deref(), now);
        let count = evictions.len();
        self.apply_evictions(state, evictions);
        Ok(count)
    }

    fn apply_evictions(&self, state: &mut FolderState, evictions: Vec<Eviction>) {
        for eviction in evictions {
            let is_open = state
                .writable
                .as_ref()
                .is_some_and(|w| w.path() == eviction.entry.path);
            if is_open {
                // The next append opens a fresh file.
                state.writable = None;
            }
            self.delete_evicted(&eviction.entry, eviction.reason);
        }
    }

    fn delete_evicted(&self, entry: &BufferFileEntry, reason: EvictionReason) {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                self.stats.record_eviction(reason, entry.size);
                tracing::warn!(
                    signal = %self.name,
                    file = %entry.path.display(),
                    bytes = entry.size,
                    reason = reason.as_str(),
                    "evicted buffered data without delivering it"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    signal = %self.name,
                    file = %entry.path.display(),
                    error = %e,
                    "failed to evict buffer file"
                );
            }
        }
    }

    /// Runs a standalone eviction pass: the age cap, then the size cap.
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be scanned.
    pub fn evict(&self) -> StorageResult<usize> {
        let mut state = self.state.lock();
        let now = self.clock.now_millis();
        self.evict_locked(&mut state, now)
    }

    /// Offers the next eligible record to `process`.
    ///
    /// Records are offered oldest file first, in append order within a file.
    /// A retained record is offered again on the next call before anything
    /// else. Exhausted files are deleted; files past the max read age are
    /// evicted instead of being offered.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or a file cannot be read.
    pub fn read_and_process<F>(&self, mut process: F) -> StorageResult<ReadOutcome>
    where
        F: FnMut(&[u8]) -> RecordDisposition,
    {
        let mut reader = self.reader.lock();
        loop {
            if reader.is_none() {
                *reader = self.open_next_readable()?;
            }
            let Some(readable) = reader.as_mut() else {
                return Ok(ReadOutcome::NoData);
            };

            match self.check_held_file(readable) {
                HeldFile::Live => {}
                HeldFile::Gone | HeldFile::Expired => {
                    if let Some(dropped) = reader.take() {
                        dropped.discard();
                    }
                    continue;
                }
            }

            let disposition = match readable.next_record()? {
                Some(payload) => process(payload),
                None => {
                    if let Some(done) = reader.take() {
                        self.finish(done)?;
                    }
                    continue;
                }
            };

            return Ok(match disposition {
                RecordDisposition::Consume => {
                    readable.consume();
                    self.stats.record_delivered();
                    ReadOutcome::Processed
                }
                RecordDisposition::Retain => ReadOutcome::Retained,
            });
        }
    }

    fn open_next_readable(&self) -> StorageResult<Option<ReadableFile>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }
        let now = self.clock.now_millis();

        if state.writable.as_ref().is_some_and(|w| w.is_expired(now)) {
            self.rotate(&mut state);
        }

        let entries = self.folder.scan()?;
        let open = state.writable.as_ref().map(|w| w.path().to_path_buf());
        let evictions = self.policy.plan(&entries, open.as_deref(), now);
        let remaining: Vec<BufferFileEntry> = entries
            .into_iter()
            .filter(|e| !evictions.iter().any(|ev| ev.entry.path == e.path))
            .collect();
        self.apply_evictions(&mut state, evictions);

        let open = state.writable.as_ref().map(|w| w.path().to_path_buf());
        let Some(entry) = select_oldest_readable(&remaining, open.as_deref(), now, &self.config)
        else {
            return Ok(None);
        };

        tracing::debug!(signal = %self.name, file = %entry.path.display(), "reading buffer file");
        let readable = ReadableFile::open(entry, self.config.temporary_file_namer().as_ref())?;
        Ok(Some(readable))
    }

    fn check_held_file(&self, readable: &ReadableFile) -> HeldFile {
        let _state = self.state.lock();
        let size = match fs::metadata(readable.source()) {
            Ok(m) => m.len(),
            Err(_) => return HeldFile::Gone,
        };
        let entry = BufferFileEntry {
            path: readable.source().to_path_buf(),
            created_at_millis: readable.created_at_millis(),
            size,
        };
        if self.policy.is_expired(&entry, self.clock.now_millis()) {
            self.delete_evicted(&entry, EvictionReason::MaxAge);
            return HeldFile::Expired;
        }
        HeldFile::Live
    }

    fn finish(&self, readable: ReadableFile) -> StorageResult<()> {
        let state = self.state.lock();
        self.finish_locked(&state, readable)
    }

    // `_state` proves the folder lock is held while the source is rewritten.
    fn finish_locked(&self, _state: &FolderState, readable: ReadableFile) -> StorageResult<()> {
        if !readable.source().exists() {
            readable.discard();
            return Ok(());
        }
        let truncated = readable.is_truncated();
        let source = readable.source().to_path_buf();
        match readable.close()? {
            CloseOutcome::Deleted => {
                self.stats.record_exhausted(truncated);
                tracing::debug!(
                    signal = %self.name,
                    file = %source.display(),
                    truncated,
                    "buffer file fully delivered"
                );
            }
            CloseOutcome::Rewritten | CloseOutcome::Untouched => {}
        }
        Ok(())
    }

    /// Total size of all buffer files in the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be scanned.
    pub fn folder_size(&self) -> StorageResult<u64> {
        Ok(self.folder.scan()?.iter().map(|e| e.size).sum())
    }

    /// Number of buffer files in the folder, open file included.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be scanned.
    pub fn file_count(&self) -> StorageResult<usize> {
        Ok(self.folder.scan()?.len())
    }

    /// Persists reader progress and closes the open file.
    ///
    /// Idempotent. Later writes and reads fail with [`StorageError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if reader progress cannot be written back or the
    /// open file cannot be synced.
    pub fn close(&self) -> StorageResult<()> {
        let mut reader = self.reader.lock();
        let mut state = self.state.lock();
        let mut result = Ok(());
        if let Some(readable) = reader.take() {
            result = self.finish_locked(&state, readable);
        }
        state.closed = true;
        if let Some(writable) = state.writable.take() {
            let closed = writable.close();
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(signal = %self.name, error = %e, "failed to close storage cleanly");
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.folder.path())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
