//! Storage configuration.

use crate::error::{StorageError, StorageResult};
use crate::namer::{DefaultTemporaryFileNamer, TemporaryFileNamer};
use std::sync::Arc;
use std::time::Duration;

/// Policy bundle controlling rotation, read eligibility and eviction.
///
/// Build one with [`StorageConfiguration::builder`]. The builder validates
/// that a file stops being written before it can become readable and that
/// the read window is not empty.
#[derive(Debug, Clone)]
pub struct StorageConfiguration {
    max_file_age_for_write: Duration,
    min_file_age_for_read: Duration,
    max_file_age_for_read: Duration,
    max_file_size: u64,
    max_folder_size: u64,
    temporary_file_namer: Arc<dyn TemporaryFileNamer>,
}

impl StorageConfiguration {
    /// Returns a builder initialised with the defaults.
    #[must_use]
    pub fn builder() -> StorageConfigurationBuilder {
        StorageConfigurationBuilder::default()
    }

    /// How long a file accepts appends before it is rotated.
    pub fn max_file_age_for_write(&self) -> Duration {
        self.max_file_age_for_write
    }

    /// How old a file must be before the reader may pick it.
    pub fn min_file_age_for_read(&self) -> Duration {
        self.min_file_age_for_read
    }

    /// Age after which a file is discarded unread.
    pub fn max_file_age_for_read(&self) -> Duration {
        self.max_file_age_for_read
    }

    /// Maximum size of a single buffer file in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Maximum combined size of a signal folder in bytes.
    pub fn max_folder_size(&self) -> u64 {
        self.max_folder_size
    }

    /// Naming strategy for temporary read copies.
    pub fn temporary_file_namer(&self) -> &Arc<dyn TemporaryFileNamer> {
        &self.temporary_file_namer
    }

    pub(crate) fn max_file_age_for_write_millis(&self) -> u64 {
        self.max_file_age_for_write.as_millis() as u64
    }

    pub(crate) fn min_file_age_for_read_millis(&self) -> u64 {
        self.min_file_age_for_read.as_millis() as u64
    }

    pub(crate) fn max_file_age_for_read_millis(&self) -> u64 {
        self.max_file_age_for_read.as_millis() as u64
    }
}

impl Default for StorageConfiguration {
    fn default() -> Self {
        let builder = StorageConfigurationBuilder::default();
        StorageConfiguration {
            max_file_age_for_write: builder.max_file_age_for_write,
            min_file_age_for_read: builder.min_file_age_for_read,
            max_file_age_for_read: builder.max_file_age_for_read,
            max_file_size: builder.max_file_size,
            max_folder_size: builder.max_folder_size,
            temporary_file_namer: builder.temporary_file_namer,
        }
    }
}

/// Builder for [`StorageConfiguration`].
#[derive(Debug, Clone)]
pub struct StorageConfigurationBuilder {
    max_file_age_for_write: Duration,
    min_file_age_for_read: Duration,
    max_file_age_for_read: Duration,
    max_file_size: u64,
    max_folder_size: u64,
    temporary_file_namer: Arc<dyn TemporaryFileNamer>,
}

impl Default for StorageConfigurationBuilder {
    fn default() -> Self {
        Self {
            max_file_age_for_write: Duration::from_secs(30),
            min_file_age_for_read: Duration::from_secs(33),
            max_file_age_for_read: Duration::from_secs(18 * 60 * 60),
            max_file_size: 1024 * 1024,        // 1 MiB
            max_folder_size: 10 * 1024 * 1024, // 10 MiB
            temporary_file_namer: Arc::new(DefaultTemporaryFileNamer::new()),
        }
    }
}

impl StorageConfigurationBuilder {
    /// Sets how long a file accepts appends.
    #[must_use]
    pub fn max_file_age_for_write(mut self, value: Duration) -> Self {
        self.max_file_age_for_write = value;
        self
    }

    /// Sets the minimum age before a file is readable.
    #[must_use]
    pub fn min_file_age_for_read(mut self, value: Duration) -> Self {
        self.min_file_age_for_read = value;
        self
    }

    /// Sets the age after which a file is discarded unread.
    #[must_use]
    pub fn max_file_age_for_read(mut self, value: Duration) -> Self {
        self.max_file_age_for_read = value;
        self
    }

    /// Sets the maximum size of a single file.
    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Sets the maximum size of a signal folder.
    #[must_use]
    pub fn max_folder_size(mut self, bytes: u64) -> Self {
        self.max_folder_size = bytes;
        self
    }

    /// Sets the temporary file naming strategy.
    #[must_use]
    pub fn temporary_file_namer(mut self, namer: Arc<dyn TemporaryFileNamer>) -> Self {
        self.temporary_file_namer = namer;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfiguration`] if:
    /// - `min_file_age_for_read >= max_file_age_for_read`
    /// - `max_file_age_for_write > min_file_age_for_read` or is zero
    /// - `max_file_size` is zero or larger than `max_folder_size`
    pub fn build(self) -> StorageResult<StorageConfiguration> {
        if self.min_file_age_for_read >= self.max_file_age_for_read {
            return Err(StorageError::invalid_configuration(format!(
                "min_file_age_for_read ({:?}) must be less than max_file_age_for_read ({:?})",
                self.min_file_age_for_read, self.max_file_age_for_read
            )));
        }
        if self.max_file_age_for_write > self.min_file_age_for_read {
            return Err(StorageError::invalid_configuration(format!(
                "max_file_age_for_write ({:?}) must not exceed min_file_age_for_read ({:?})",
                self.max_file_age_for_write, self.min_file_age_for_read
            )));
        }
        if self.max_file_age_for_write.is_zero() {
            return Err(StorageError::invalid_configuration(
                "max_file_age_for_write must be greater than zero",
            ));
        }
        if self.max_file_size == 0 {
            return Err(StorageError::invalid_configuration(
                "max_file_size must be greater than zero",
            ));
        }
        if self.max_file_size > self.max_folder_size {
            return Err(StorageError::invalid_configuration(format!(
                "max_file_size ({}) must not exceed max_folder_size ({})",
                self.max_file_size, self.max_folder_size
            )));
        }

        Ok(StorageConfiguration {
            max_file_age_for_write: self.max_file_age_for_write,
            min_file_age_for_read: self.min_file_age_for_read,
            max_file_age_for_read: self.max_file_age_for_read,
            max_file_size: self.max_file_size,
            max_folder_size: self.max_folder_size,
            temporary_file_namer: self.temporary_file_namer,
        })
    }
}
