//! The exporter capability wrapped by the disk buffer.

use crate::result::ResultCode;

/// Sends batches of telemetry to their destination.
///
/// Every method returns a [`ResultCode`] that may already be complete or may
/// complete later from another thread. The disk-buffering exporter implements
/// this trait itself, so it can stand in wherever a plain exporter is used.
pub trait SignalExporter<T>: Send + Sync {
    /// Sends one batch.
    fn export(&self, items: Vec<T>) -> ResultCode;

    /// Pushes out anything the exporter holds internally.
    fn flush(&self) -> ResultCode;

    /// Releases resources. Later exports should fail.
    fn shutdown(&self) -> ResultCode;
}

impl<T, E> SignalExporter<T> for std::sync::Arc<E>
where
    E: SignalExporter<T> + ?Sized,
{
    fn export(&self, items: Vec<T>) -> ResultCode {
        (**self).export(items)
    }

    fn flush(&self) -> ResultCode {
        (**self).flush()
    }

    fn shutdown(&self) -> ResultCode {
        (**self).shutdown()
    }
}
