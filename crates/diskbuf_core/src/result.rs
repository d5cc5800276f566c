//! Completion handles for export, flush and shutdown.

use crate::error::ExportError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Completion {
    outcome: Mutex<Option<Result<(), ExportError>>>,
    done: Condvar,
}

/// Outcome of an exporter operation that may finish later.
///
/// A `ResultCode` is either created already completed or created pending and
/// completed from any thread. Only the first completion counts. Clones share
/// the same outcome.
///
/// # Example
///
/// ```rust
/// use diskbuf_core::ResultCode;
/// use std::time::Duration;
///
/// let code = ResultCode::pending();
/// let remote = code.clone();
/// std::thread::spawn(move || remote.succeed());
///
/// assert!(code.join(Duration::from_secs(5)).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultCode {
    inner: Arc<Completion>,
}

impl ResultCode {
    /// Creates a handle that has not completed yet.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// Creates a successfully completed handle.
    #[must_use]
    pub fn success() -> Self {
        let code = Self::pending();
        code.succeed();
        code
    }

    /// Creates a handle that completed with `error`.
    #[must_use]
    pub fn failure(error: ExportError) -> Self {
        let code = Self::pending();
        code.fail(error);
        code
    }

    /// Creates a completed handle from a result.
    #[must_use]
    pub fn from_result(result: Result<(), ExportError>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(e) => Self::failure(e),
        }
    }

    /// Marks the operation successful. Returns `false` if already completed.
    pub fn succeed(&self) -> bool {
        self.complete(Ok(()))
    }

    /// Marks the operation failed. Returns `false` if already completed.
    pub fn fail(&self, error: ExportError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, result: Result<(), ExportError>) -> bool {
        let mut outcome = self.inner.outcome.lock();
        if outcome.is_some() {
            return false;
        }
        *outcome = Some(result);
        self.inner.done.notify_all();
        true
    }

    /// Whether the operation has completed.
    pub fn is_done(&self) -> bool {
        self.inner.outcome.lock().is_some()
    }

    /// Returns the outcome if completed, without waiting.
    pub fn outcome(&self) -> Option<Result<(), ExportError>> {
        self.inner.outcome.lock().clone()
    }

    /// Waits up to `timeout` for completion.
    ///
    /// # Errors
    ///
    /// Returns the failure the operation completed with, or
    /// [`ExportError::Timeout`] if it is still pending.
    pub fn join(&self, timeout: Duration) -> Result<(), ExportError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut outcome = self.inner.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.done.wait_until(&mut outcome, deadline).timed_out() {
                        return outcome.clone().unwrap_or(Err(ExportError::Timeout));
                    }
                }
                None => self.inner.done.wait(&mut outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completed_handles() {
        assert!(ResultCode::success().is_done());
        assert_eq!(ResultCode::success().join(Duration::ZERO), Ok(()));
        assert_eq!(
            ResultCode::failure(ExportError::ShutDown).join(Duration::ZERO),
            Err(ExportError::ShutDown)
        );
    }

    #[test]
    fn pending_times_out() {
        let code = ResultCode::pending();
        assert!(!code.is_done());
        assert_eq!(code.outcome(), None);
        assert_eq!(
            code.join(Duration::from_millis(10)),
            Err(ExportError::Timeout)
        );
    }

    #[test]
    fn first_completion_wins() {
        let code = ResultCode::pending();
        assert!(code.fail(ExportError::rejected("first")));
        assert!(!code.succeed());
        assert_eq!(
            code.join(Duration::ZERO),
            Err(ExportError::rejected("first"))
        );
    }

    #[test]
    fn completed_from_another_thread() {
        let code = ResultCode::pending();
        let remote = code.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.succeed();
        });

        assert_eq!(code.join(Duration::from_secs(5)), Ok(()));
        handle.join().unwrap();
    }
}
