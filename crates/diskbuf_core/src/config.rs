//! Exporter configuration.

use diskbuf_storage::StorageConfiguration;
use std::time::Duration;

/// Configuration for a [`crate::DiskBufferingExporter`].
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Rotation, read window and eviction settings for the signal folder.
    pub storage: StorageConfiguration,

    /// Time budget for draining stored batches on `flush`.
    pub flush_timeout: Duration,

    /// Time budget for draining stored batches on `shutdown`.
    pub shutdown_timeout: Duration,

    /// How often the background worker retries stored batches.
    /// `None` disables the worker; stored data then only moves on `flush`.
    pub retry_interval: Option<Duration>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfiguration::default(),
            flush_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            retry_interval: None,
        }
    }
}

impl ExporterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage configuration.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfiguration) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the flush drain budget.
    #[must_use]
    pub const fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Sets the shutdown drain budget.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Enables the background retry worker.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.flush_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert!(config.retry_interval.is_none());
        assert_eq!(config.storage.max_file_size(), 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = ExporterConfig::new()
            .with_flush_timeout(Duration::from_secs(1))
            .with_shutdown_timeout(Duration::from_secs(2))
            .with_retry_interval(Duration::from_millis(500));

        assert_eq!(config.flush_timeout, Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_interval, Some(Duration::from_millis(500)));
    }
}
