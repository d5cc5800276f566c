//! Storage statistics.
//!
//! Delivery and loss are counted separately: records leave a folder either
//! because the reader consumed them or because eviction gave up on the file
//! that held them.

use crate::eviction::EvictionReason;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one signal folder.
#[derive(Debug, Default)]
pub struct StorageStats {
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    write_failures: AtomicU64,
    files_created: AtomicU64,
    records_delivered: AtomicU64,
    files_exhausted: AtomicU64,
    truncated_tails: AtomicU64,
    files_evicted_for_size: AtomicU64,
    files_evicted_for_age: AtomicU64,
    bytes_evicted: AtomicU64,
}

impl StorageStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_created(&self) {
        self.files_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self, truncated: bool) {
        self.files_exhausted.fetch_add(1, Ordering::Relaxed);
        if truncated {
            self.truncated_tails.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_eviction(&self, reason: EvictionReason, bytes: u64) {
        match reason {
            EvictionReason::FolderSize => &self.files_evicted_for_size,
            EvictionReason::MaxAge => &self.files_evicted_for_age,
        }
        .fetch_add(1, Ordering::Relaxed);
        self.bytes_evicted.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Returns the number of records appended.
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Returns the number of records consumed by the reader.
    pub fn records_delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of files deleted by eviction for either reason.
    pub fn files_evicted(&self) -> u64 {
        self.files_evicted_for_size.load(Ordering::Relaxed)
            + self.files_evicted_for_age.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StorageStatsSnapshot {
        StorageStatsSnapshot {
            records_written: self.records_written(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            files_created: self.files_created.load(Ordering::Relaxed),
            records_delivered: self.records_delivered(),
            files_exhausted: self.files_exhausted.load(Ordering::Relaxed),
            truncated_tails: self.truncated_tails.load(Ordering::Relaxed),
            files_evicted_for_size: self.files_evicted_for_size.load(Ordering::Relaxed),
            files_evicted_for_age: self.files_evicted_for_age.load(Ordering::Relaxed),
            bytes_evicted: self.bytes_evicted.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`StorageStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageStatsSnapshot {
    /// Records appended.
    pub records_written: u64,
    /// Framed bytes appended.
    pub bytes_written: u64,
    /// Appends that failed with an error.
    pub write_failures: u64,
    /// Buffer files created.
    pub files_created: u64,
    /// Records consumed by the reader.
    pub records_delivered: u64,
    /// Files deleted after their last record was consumed.
    pub files_exhausted: u64,
    /// Exhausted files that ended in an incomplete record.
    pub truncated_tails: u64,
    /// Files deleted to honour the folder size cap.
    pub files_evicted_for_size: u64,
    /// Files deleted for exceeding the max read age.
    pub files_evicted_for_age: u64,
    /// Bytes removed by eviction.
    pub bytes_evicted: u64,
}
