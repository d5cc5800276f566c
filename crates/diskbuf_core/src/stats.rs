//! Exporter statistics.
//!
//! These count batches as the exporter sees them. File level counters,
//! including data lost to eviction, live in
//! [`diskbuf_storage::StorageStats`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one buffering exporter.
#[derive(Debug, Default)]
pub struct ExportStats {
    batches_buffered: AtomicU64,
    buffering_failures: AtomicU64,
    serialization_failures: AtomicU64,
    batches_exported: AtomicU64,
    export_failures: AtomicU64,
    records_skipped: AtomicU64,
}

impl ExportStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_buffered(&self) {
        self.batches_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_buffering_failure(&self) {
        self.buffering_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_serialization_failure(&self) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exported(&self) {
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_export_failure(&self) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> ExportStatsSnapshot {
        ExportStatsSnapshot {
            batches_buffered: self.batches_buffered.load(Ordering::Relaxed),
            buffering_failures: self.buffering_failures.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            batches_exported: self.batches_exported.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`ExportStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportStatsSnapshot {
    /// Batches written to disk by `export`.
    pub batches_buffered: u64,
    /// Batches `export` could not write to disk.
    pub buffering_failures: u64,
    /// Batches that failed to serialize on `export`.
    pub serialization_failures: u64,
    /// Stored batches the wrapped exporter accepted.
    pub batches_exported: u64,
    /// Stored batches the wrapped exporter failed or timed out on.
    pub export_failures: u64,
    /// Stored records dropped because they could not be decoded.
    pub records_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters() {
        let stats = ExportStats::new();
        stats.record_buffered();
        stats.record_buffered();
        stats.record_exported();
        stats.record_export_failure();
        stats.record_skipped();

        let snap = stats.snapshot();
        assert_eq!(snap.batches_buffered, 2);
        assert_eq!(snap.batches_exported, 1);
        assert_eq!(snap.export_failures, 1);
        assert_eq!(snap.records_skipped, 1);
        assert_eq!(snap.serialization_failures, 0);
        assert_eq!(snap.buffering_failures, 0);
    }
}
