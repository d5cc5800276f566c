//! The disk-buffering exporter.
//!
//! ```text
//!  export(batch) ──► serialize ──► Storage::write ──► <root>/<signal>/<millis>
//!                                                          │
//!  flush() / retry worker ──► Storage::read_and_process ◄──┘
//!                                   │
//!                                   ▼
//!                    deserialize ──► wrapped.export(batch)
//! ```
//!
//! `export` never talks to the wrapped exporter. Batches reach it only when
//! stored data is replayed, oldest first, and a batch leaves the disk only
//! after the wrapped exporter reports success. Replay stops at the first
//! failure so that nothing overtakes a batch still waiting for delivery.

use crate::config::ExporterConfig;
use crate::error::{CoreError, CoreResult, ExportError};
use crate::exporter::SignalExporter;
use crate::result::ResultCode;
use crate::retry::RetryWorker;
use crate::serializer::SignalSerializer;
use crate::signal::SignalKind;
use crate::stats::ExportStats;
use diskbuf_storage::{Clock, ReadOutcome, RecordDisposition, Storage, StorageStats, SystemClock};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one drain of stored batches did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Batches the wrapped exporter accepted.
    pub exported: usize,
    /// Records dropped because they could not be decoded.
    pub skipped: usize,
    /// Batches that failed or timed out and stay on disk.
    pub retained: usize,
}

struct Inner<T> {
    kind: SignalKind,
    wrapped: Box<dyn SignalExporter<T>>,
    serializer: Box<dyn SignalSerializer<T>>,
    storage: Storage,
    config: ExporterConfig,
    stats: ExportStats,
    shut_down: AtomicBool,
}

/// Wraps an exporter so that every batch goes through disk first.
///
/// # Example
///
/// ```rust,ignore
/// use diskbuf_core::{DiskBufferingExporter, ExporterConfig, JsonSerializer, SignalKind};
/// use std::path::Path;
///
/// let exporter = DiskBufferingExporter::new(
///     SignalKind::Spans,
///     my_network_exporter,
///     JsonSerializer::new(),
///     Path::new("/var/cache/telemetry"),
///     ExporterConfig::default(),
/// )?;
///
/// exporter.export(spans);   // stored on disk
/// exporter.flush();         // replays eligible files to the network exporter
/// ```
pub struct DiskBufferingExporter<T> {
    inner: Arc<Inner<T>>,
    worker: Mutex<Option<RetryWorker>>,
}

impl<T: Send + 'static> DiskBufferingExporter<T> {
    /// Opens the signal folder under `root` and wraps `wrapped`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened or locked, or the
    /// retry worker cannot be started.
    pub fn new<E, S>(
        kind: SignalKind,
        wrapped: E,
        serializer: S,
        root: &Path,
        config: ExporterConfig,
    ) -> CoreResult<Self>
    where
        E: SignalExporter<T> + 'static,
        S: SignalSerializer<T> + 'static,
    {
        Self::with_clock(kind, wrapped, serializer, root, config, Arc::new(SystemClock))
    }

    /// Like [`DiskBufferingExporter::new`] with an explicit clock for file ages.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be opened or locked, or the
    /// retry worker cannot be started.
    pub fn with_clock<E, S>(
        kind: SignalKind,
        wrapped: E,
        serializer: S,
        root: &Path,
        config: ExporterConfig,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self>
    where
        E: SignalExporter<T> + 'static,
        S: SignalSerializer<T> + 'static,
    {
        let folder = root.join(kind.folder_name());
        let storage = Storage::open_with_clock(&folder, config.storage.clone(), clock)?;
        tracing::debug!(signal = %kind, folder = %folder.display(), "disk buffer opened");

        let inner = Arc::new(Inner {
            kind,
            wrapped: Box::new(wrapped),
            serializer: Box::new(serializer),
            storage,
            config,
            stats: ExportStats::new(),
            shut_down: AtomicBool::new(false),
        });

        let worker = match inner.config.retry_interval {
            Some(interval) => {
                let background = Arc::clone(&inner);
                Some(RetryWorker::spawn(
                    format!("diskbuf-retry-{kind}"),
                    interval,
                    move || background.retry_tick(),
                )?)
            }
            None => None,
        };

        Ok(Self {
            inner,
            worker: Mutex::new(worker),
        })
    }

    /// Replays stored batches to the wrapped exporter.
    ///
    /// Keeps going until nothing eligible is left, a batch fails, or
    /// `timeout` runs out. A wrapped export still pending at the deadline
    /// counts as failed and its batch stays on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter is shut down or the buffer cannot be
    /// read.
    pub fn flush_stored(&self, timeout: Duration) -> CoreResult<FlushReport> {
        if self.inner.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        self.inner.drain(timeout)
    }

    /// Runs the age and size eviction pass on the signal folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be scanned.
    pub fn evict(&self) -> CoreResult<usize> {
        Ok(self.inner.storage.evict()?)
    }

    /// The signal this exporter buffers.
    pub fn signal(&self) -> SignalKind {
        self.inner.kind
    }

    /// Name of the folder under the root that holds this signal's files.
    pub fn storage_folder_name(&self) -> &'static str {
        self.inner.kind.folder_name()
    }

    /// Full path of the signal folder.
    pub fn storage_path(&self) -> &Path {
        self.inner.storage.path()
    }

    /// Exporter level counters.
    pub fn stats(&self) -> &ExportStats {
        &self.inner.stats
    }

    /// File level counters, including data lost to eviction.
    pub fn storage_stats(&self) -> &StorageStats {
        self.inner.storage.stats()
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    fn stop_worker(&self) -> CoreResult<()> {
        match self.worker.lock().take() {
            Some(worker) => worker.stop(),
            None => Ok(()),
        }
    }

    fn shutdown_inner(&self) -> CoreResult<()> {
        let inner = &self.inner;
        let stopped = self.stop_worker();
        let drained = inner.drain(inner.config.shutdown_timeout).map(|report| {
            if report.retained > 0 {
                tracing::info!(
                    signal = %inner.kind,
                    retained = report.retained,
                    "batches left on disk at shutdown"
                );
            }
        });
        let closed = inner.storage.close().map_err(CoreError::from);
        stopped.and(drained).and(closed)
    }
}

impl<T: Send + 'static> SignalExporter<T> for DiskBufferingExporter<T> {
    /// Stores the batch on disk. Never contacts the wrapped exporter.
    fn export(&self, items: Vec<T>) -> ResultCode {
        if self.inner.is_shut_down() {
            return ResultCode::failure(ExportError::ShutDown);
        }
        ResultCode::from_result(self.inner.buffer(&items).map_err(ExportError::from))
    }

    /// Replays stored batches, then flushes the wrapped exporter.
    fn flush(&self) -> ResultCode {
        if let Err(e) = self.flush_stored(self.inner.config.flush_timeout) {
            tracing::warn!(signal = %self.inner.kind, error = %e, "flush of stored batches failed");
            return ResultCode::failure(e.into());
        }
        self.inner.wrapped.flush()
    }

    /// Drains what it can, closes the buffer and shuts the wrapped exporter
    /// down. Calling it again has no further effect.
    fn shutdown(&self) -> ResultCode {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return ResultCode::success();
        }

        let result = self.shutdown_inner();
        let wrapped = self.inner.wrapped.shutdown();
        match result {
            Ok(()) => wrapped,
            Err(e) => {
                tracing::warn!(signal = %self.inner.kind, error = %e, "disk buffer shutdown failed");
                ResultCode::failure(e.into())
            }
        }
    }
}

impl<T> Drop for DiskBufferingExporter<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            if let Err(e) = worker.stop() {
                tracing::warn!(signal = %self.inner.kind, error = %e, "retry worker did not stop cleanly");
            }
        }
    }
}

impl<T> std::fmt::Debug for DiskBufferingExporter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskBufferingExporter")
            .field("signal", &self.inner.kind)
            .field("storage", &self.inner.storage)
            .finish_non_exhaustive()
    }
}

impl<T> Inner<T> {
    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn buffer(&self, items: &[T]) -> CoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let payload = self.serializer.serialize(items).map_err(|e| {
            self.stats.record_serialization_failure();
            tracing::warn!(signal = %self.kind, error = %e, "could not serialize batch");
            e
        })?;

        if let Err(e) = self.storage.write(&payload) {
            self.stats.record_buffering_failure();
            return Err(e.into());
        }
        self.stats.record_buffered();
        Ok(())
    }

    fn drain(&self, timeout: Duration) -> CoreResult<FlushReport> {
        let started = Instant::now();
        let mut report = FlushReport::default();

        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            let outcome = self
                .storage
                .read_and_process(|payload| self.replay(payload, started, timeout, &mut report))?;
            match outcome {
                ReadOutcome::Processed => {}
                ReadOutcome::Retained | ReadOutcome::NoData => break,
            }
        }

        if report != FlushReport::default() {
            tracing::debug!(
                signal = %self.kind,
                exported = report.exported,
                skipped = report.skipped,
                retained = report.retained,
                "replayed stored batches"
            );
        }
        Ok(report)
    }

    fn replay(
        &self,
        payload: &[u8],
        started: Instant,
        timeout: Duration,
        report: &mut FlushReport,
    ) -> RecordDisposition {
        let items = match self.serializer.deserialize(payload) {
            Ok(items) => items,
            Err(e) => {
                self.stats.record_skipped();
                report.skipped += 1;
                tracing::warn!(
                    signal = %self.kind,
                    bytes = payload.len(),
                    error = %e,
                    "dropping stored record that could not be decoded"
                );
                return RecordDisposition::Consume;
            }
        };

        let budget = timeout.saturating_sub(started.elapsed());
        match self.wrapped.export(items).join(budget) {
            Ok(()) => {
                self.stats.record_exported();
                report.exported += 1;
                RecordDisposition::Consume
            }
            Err(e) => {
                self.stats.record_export_failure();
                report.retained += 1;
                tracing::warn!(
                    signal = %self.kind,
                    error = %e,
                    "export of stored batch failed, keeping it for a later attempt"
                );
                RecordDisposition::Retain
            }
        }
    }

    fn retry_tick(&self) {
        if self.is_shut_down() {
            return;
        }
        if let Err(e) = self.drain(self.config.flush_timeout) {
            tracing::warn!(signal = %self.kind, error = %e, "background retry failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;
    use diskbuf_storage::{DefaultTemporaryFileNamer, ManualClock, StorageConfiguration};
    use parking_lot::Mutex as PlMutex;
    use std::collections::VecDeque;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct Script {
        exported: PlMutex<Vec<Vec<u32>>>,
        results: PlMutex<VecDeque<ResultCode>>,
        flushes: PlMutex<usize>,
        shutdowns: PlMutex<usize>,
    }

    impl SignalExporter<u32> for Script {
        fn export(&self, items: Vec<u32>) -> ResultCode {
            let code = self.results.lock().pop_front().unwrap_or_else(ResultCode::success);
            if code.outcome() == Some(Ok(())) {
                self.exported.lock().push(items);
            }
            code
        }

        fn flush(&self) -> ResultCode {
            *self.flushes.lock() += 1;
            ResultCode::success()
        }

        fn shutdown(&self) -> ResultCode {
            *self.shutdowns.lock() += 1;
            ResultCode::success()
        }
    }

    struct Fixture {
        dir: TempDir,
        clock: Arc<ManualClock>,
        script: Arc<Script>,
        exporter: DiskBufferingExporter<u32>,
    }

    fn config(dir: &Path) -> ExporterConfig {
        let storage = StorageConfiguration::builder()
            .max_file_age_for_write(Duration::from_millis(100))
            .min_file_age_for_read(Duration::from_millis(500))
            .max_file_age_for_read(Duration::from_secs(10))
            .temporary_file_namer(Arc::new(DefaultTemporaryFileNamer::in_dir(dir.join("tmp"))))
            .build()
            .unwrap();
        ExporterConfig::new()
            .with_storage(storage)
            .with_flush_timeout(Duration::from_secs(2))
            .with_shutdown_timeout(Duration::from_secs(2))
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let script = Arc::new(Script::default());
        let exporter = DiskBufferingExporter::with_clock(
            SignalKind::Spans,
            Arc::clone(&script),
            JsonSerializer::new(),
            dir.path(),
            config(dir.path()),
            clock.clone(),
        )
        .unwrap();
        Fixture {
            dir,
            clock,
            script,
            exporter,
        }
    }

    #[test]
    fn export_only_touches_disk() {
        let fx = fixture();
        assert!(fx.exporter.export(vec![1, 2, 3]).join(Duration::ZERO).is_ok());

        assert!(fx.script.exported.lock().is_empty());
        assert!(fx.dir.path().join("spans").is_dir());
        assert_eq!(fx.exporter.storage_folder_name(), "spans");
        assert_eq!(fx.exporter.stats().snapshot().batches_buffered, 1);
    }

    #[test]
    fn flush_waits_for_the_read_window() {
        let fx = fixture();
        fx.exporter.export(vec![7]);

        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report.exported, 0);

        fx.clock.advance(Duration::from_millis(600));
        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report.exported, 1);
        assert_eq!(*fx.script.exported.lock(), vec![vec![7]]);
    }

    #[test]
    fn failed_export_is_retried_first() {
        let fx = fixture();
        fx.exporter.export(vec![1]);
        fx.exporter.export(vec![2]);
        fx.clock.advance(Duration::from_millis(600));

        fx.script
            .results
            .lock()
            .push_back(ResultCode::failure(ExportError::rejected("offline")));
        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report, FlushReport { exported: 0, skipped: 0, retained: 1 });

        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report.exported, 2);
        assert_eq!(*fx.script.exported.lock(), vec![vec![1], vec![2]]);
    }

    #[test]
    fn pending_export_times_out_and_is_kept() {
        let fx = fixture();
        fx.exporter.export(vec![5]);
        fx.clock.advance(Duration::from_millis(600));

        fx.script.results.lock().push_back(ResultCode::pending());
        let report = fx.exporter.flush_stored(Duration::from_millis(50)).unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(fx.exporter.stats().snapshot().export_failures, 1);

        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report.exported, 1);
    }

    #[test]
    fn undecodable_records_are_skipped() {
        let fx = fixture();
        fx.exporter.export(vec![1]);
        // Written straight to storage, bypassing the serializer.
        fx.exporter.inner.storage.write(b"not json").unwrap();
        fx.exporter.export(vec![2]);
        fx.clock.advance(Duration::from_millis(600));

        let report = fx.exporter.flush_stored(Duration::from_secs(1)).unwrap();
        assert_eq!(report, FlushReport { exported: 2, skipped: 1, retained: 0 });
    }

    #[test]
    fn empty_batches_are_not_stored() {
        let fx = fixture();
        assert!(fx.exporter.export(Vec::new()).join(Duration::ZERO).is_ok());
        assert_eq!(fx.exporter.inner.storage.file_count().unwrap(), 0);
    }

    #[test]
    fn flush_calls_wrapped_flush() {
        let fx = fixture();
        assert!(fx.exporter.flush().join(Duration::ZERO).is_ok());
        assert_eq!(*fx.script.flushes.lock(), 1);
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let fx = fixture();
        assert!(fx.exporter.shutdown().join(Duration::from_secs(1)).is_ok());
        assert!(fx.exporter.shutdown().join(Duration::from_secs(1)).is_ok());
        assert_eq!(*fx.script.shutdowns.lock(), 1);

        assert_eq!(
            fx.exporter.export(vec![1]).join(Duration::ZERO),
            Err(ExportError::ShutDown)
        );
        assert!(matches!(
            fx.exporter.flush_stored(Duration::from_secs(1)),
            Err(CoreError::ShutDown)
        ));
    }

    #[test]
    fn second_exporter_on_same_root_is_refused() {
        let fx = fixture();
        let again = DiskBufferingExporter::<u32>::new(
            SignalKind::Spans,
            Script::default(),
            JsonSerializer::new(),
            fx.dir.path(),
            config(fx.dir.path()),
        );
        assert!(matches!(again, Err(CoreError::Storage(_))));

        // Other signals use their own folder.
        let logs = DiskBufferingExporter::<u32>::new(
            SignalKind::Logs,
            Script::default(),
            JsonSerializer::new(),
            fx.dir.path(),
            config(fx.dir.path()),
        );
        assert!(logs.is_ok());
    }
}
