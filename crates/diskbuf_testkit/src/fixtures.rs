//! Test fixtures for buffer folders.
//!
//! Provides a temporary buffer root and a storage configuration with short
//! windows, so tests can cross every age threshold with a manual clock.

use diskbuf_core::ExporterConfig;
use diskbuf_storage::{DefaultTemporaryFileNamer, ManualClock, StorageConfiguration};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Write window of [`test_configuration`].
pub const TEST_WRITE_AGE: Duration = Duration::from_secs(1);
/// Minimum read age of [`test_configuration`].
pub const TEST_MIN_READ_AGE: Duration = Duration::from_millis(1500);
/// Maximum read age of [`test_configuration`].
pub const TEST_MAX_READ_AGE: Duration = Duration::from_secs(10);
/// File size cap of [`test_configuration`].
pub const TEST_MAX_FILE_SIZE: u64 = 10_000;
/// Folder size cap of [`test_configuration`].
pub const TEST_MAX_FOLDER_SIZE: u64 = 30_000;

/// A temporary buffer root, removed on drop.
///
/// Temporary read copies go to a `tmp` directory inside the root rather
/// than the OS temp directory, so tests can check none are left behind.
pub struct TestFolder {
    dir: TempDir,
}

impl TestFolder {
    /// Creates a fresh root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The buffer root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a signal folder under the root.
    pub fn signal_path(&self, folder_name: &str) -> PathBuf {
        self.dir.path().join(folder_name)
    }

    /// Where temporary read copies are placed.
    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    /// Number of temporary read copies currently on disk.
    pub fn temp_file_count(&self) -> usize {
        std::fs::read_dir(self.temp_dir())
            .map(|d| d.count())
            .unwrap_or(0)
    }

    /// [`test_configuration`] with temporary copies kept under this root.
    pub fn configuration(&self) -> StorageConfiguration {
        self.configuration_builder()
            .build()
            .expect("Test configuration should be valid")
    }

    /// A builder preset to [`test_configuration`], for tests that tweak one limit.
    pub fn configuration_builder(&self) -> diskbuf_storage::StorageConfigurationBuilder {
        test_configuration_builder()
            .temporary_file_namer(Arc::new(DefaultTemporaryFileNamer::in_dir(self.temp_dir())))
    }

    /// An exporter configuration wrapping [`TestFolder::configuration`].
    pub fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig::new()
            .with_storage(self.configuration())
            .with_flush_timeout(Duration::from_secs(2))
            .with_shutdown_timeout(Duration::from_secs(2))
    }
}

impl Default for TestFolder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder preset to the test limits: write 1 s, read window 1.5 s to 10 s,
/// 10 000 byte files and a 30 000 byte folder.
pub fn test_configuration_builder() -> diskbuf_storage::StorageConfigurationBuilder {
    StorageConfiguration::builder()
        .max_file_age_for_write(TEST_WRITE_AGE)
        .min_file_age_for_read(TEST_MIN_READ_AGE)
        .max_file_age_for_read(TEST_MAX_READ_AGE)
        .max_file_size(TEST_MAX_FILE_SIZE)
        .max_folder_size(TEST_MAX_FOLDER_SIZE)
}

/// The test limits with the default temporary file namer.
pub fn test_configuration() -> StorageConfiguration {
    test_configuration_builder()
        .build()
        .expect("Test configuration should be valid")
}

/// A manual clock at a fixed, realistic epoch time.
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::default())
}

/// Time to advance a clock so that a file written now becomes readable.
pub fn past_min_read_age() -> Duration {
    TEST_MIN_READ_AGE + Duration::from_millis(1)
}
