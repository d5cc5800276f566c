//! An in-memory exporter that records what it is sent.
//!
//! Wrap it in an `Arc`, hand a clone to the disk buffer and keep the other
//! to script outcomes and inspect deliveries.

use diskbuf_core::{ExportError, ResultCode, SignalExporter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Outcome of one scripted `export` call.
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    /// Accept the batch.
    Succeed,
    /// Refuse the batch with the given error.
    Fail(ExportError),
    /// Return a handle that never completes.
    Hang,
}

/// Exporter double with scripted outcomes.
///
/// Unscripted calls succeed unless the exporter is offline. Only accepted
/// batches are recorded.
#[derive(Debug)]
pub struct RecordingExporter<T> {
    exported: Mutex<Vec<Vec<T>>>,
    script: Mutex<VecDeque<ScriptedResult>>,
    offline: AtomicBool,
    shut_down: AtomicBool,
    latency_millis: AtomicU64,
    export_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

impl<T> Default for RecordingExporter<T> {
    fn default() -> Self {
        Self {
            exported: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            latency_millis: AtomicU64::new(0),
            export_calls: AtomicUsize::new(0),
            flush_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> RecordingExporter<T> {
    /// Creates an exporter that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for a future `export` call.
    pub fn push_result(&self, result: ScriptedResult) {
        self.script.lock().push_back(result);
    }

    /// Fails the next `n` exports.
    pub fn fail_next(&self, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(ScriptedResult::Fail(ExportError::rejected("scripted failure")));
        }
    }

    /// Makes the next export return a handle that never completes.
    pub fn hang_next(&self) {
        self.push_result(ScriptedResult::Hang);
    }

    /// While offline, every unscripted export fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every export block the caller for `latency` before completing.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_millis
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Accepted batches, in the order they arrived.
    pub fn exported_batches(&self) -> Vec<Vec<T>> {
        self.exported.lock().clone()
    }

    /// Accepted items, flattened.
    pub fn exported_items(&self) -> Vec<T> {
        self.exported.lock().iter().flatten().cloned().collect()
    }

    /// Number of `export` calls, accepted or not.
    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    /// Number of `flush` calls.
    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    /// Number of `shutdown` calls.
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send> SignalExporter<T> for RecordingExporter<T> {
    fn export(&self, items: Vec<T>) -> ResultCode {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        if self.shut_down.load(Ordering::SeqCst) {
            return ResultCode::failure(ExportError::ShutDown);
        }

        let latency = self.latency_millis.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(ScriptedResult::Succeed) => {}
            Some(ScriptedResult::Fail(e)) => return ResultCode::failure(e),
            Some(ScriptedResult::Hang) => return ResultCode::pending(),
            None if self.offline.load(Ordering::SeqCst) => {
                return ResultCode::failure(ExportError::rejected("offline"));
            }
            None => {}
        }

        self.exported.lock().push(items);
        ResultCode::success()
    }

    fn flush(&self) -> ResultCode {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        ResultCode::success()
    }

    fn shutdown(&self) -> ResultCode {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
        ResultCode::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn records_accepted_batches() {
        let exporter = RecordingExporter::new();
        assert!(exporter.export(vec![1, 2]).is_done());
        exporter.export(vec![3]);

        assert_eq!(exporter.exported_batches(), vec![vec![1, 2], vec![3]]);
        assert_eq!(exporter.exported_items(), vec![1, 2, 3]);
        assert_eq!(exporter.export_calls(), 2);
    }

    #[test]
    fn scripted_outcomes_apply_in_order() {
        let exporter = RecordingExporter::new();
        exporter.fail_next(1);
        exporter.hang_next();

        assert!(exporter.export(vec![1]).join(Duration::ZERO).is_err());
        assert_eq!(
            exporter.export(vec![2]).join(Duration::from_millis(5)),
            Err(ExportError::Timeout)
        );
        assert!(exporter.export(vec![3]).join(Duration::ZERO).is_ok());
        assert_eq!(exporter.exported_items(), vec![3]);
    }

    #[test]
    fn offline_fails_until_back() {
        let exporter = RecordingExporter::new();
        exporter.set_offline(true);
        assert!(exporter.export(vec![1]).join(Duration::ZERO).is_err());
        exporter.set_offline(false);
        assert!(exporter.export(vec![1]).join(Duration::ZERO).is_ok());
    }

    #[test]
    fn shutdown_is_counted_and_final() {
        let exporter = RecordingExporter::<u8>::new();
        exporter.shutdown();
        assert_eq!(exporter.shutdown_calls(), 1);
        assert_eq!(
            exporter.export(vec![1]).join(Duration::ZERO),
            Err(ExportError::ShutDown)
        );
    }

    #[test]
    fn latency_delays_the_caller() {
        let exporter = RecordingExporter::new();
        exporter.set_latency(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert!(exporter.export(vec![1]).is_done());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
