//! Background retry of stored batches.

use crate::error::{CoreError, CoreResult};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A thread that runs a task every `interval` until stopped.
#[derive(Debug)]
pub(crate) struct RetryWorker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl RetryWorker {
    /// Starts the worker. `tick` runs on the worker thread.
    pub(crate) fn spawn<F>(name: String, interval: Duration, mut tick: F) -> CoreResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new().name(name).spawn(move || {
            tracing::debug!("retry worker started");
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    // A stop message or a dropped sender both end the loop.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("retry worker exiting");
        })?;

        Ok(Self { stop, handle })
    }

    /// Signals the worker and waits for the current tick to finish.
    pub(crate) fn stop(self) -> CoreResult<()> {
        let _ = self.stop.send(());
        self.handle.join().map_err(|_| CoreError::WorkerPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = RetryWorker::spawn("test-retry".into(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop().unwrap();

        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_is_prompt_with_long_interval() {
        let worker = RetryWorker::spawn("test-idle".into(), Duration::from_secs(3600), || {}).unwrap();
        let started = Instant::now();
        worker.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn panicking_tick_is_reported() {
        let worker = RetryWorker::spawn("test-panic".into(), Duration::from_millis(1), || {
            panic!("tick failed");
        })
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(worker.stop(), Err(CoreError::WorkerPanicked)));
    }
}
