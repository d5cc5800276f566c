//! Benchmark utilities.

use diskbuf_core::{ResultCode, SignalExporter};
use diskbuf_storage::{
    DefaultTemporaryFileNamer, ManualClock, Storage, StorageConfiguration,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Deterministic payload of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Configuration with room for large runs; temp copies stay inside `dir`.
pub fn bench_configuration(dir: &Path) -> StorageConfiguration {
    StorageConfiguration::builder()
        .max_file_age_for_write(Duration::from_secs(1))
        .min_file_age_for_read(Duration::from_secs(2))
        .max_file_age_for_read(Duration::from_secs(3600))
        .max_file_size(1024 * 1024)
        .max_folder_size(256 * 1024 * 1024)
        .temporary_file_namer(Arc::new(DefaultTemporaryFileNamer::in_dir(dir.join("tmp"))))
        .build()
        .expect("valid bench configuration")
}

/// Opens a `spans` folder under `dir` driven by a manual clock.
pub fn open_storage(dir: &Path) -> (Storage, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let storage = Storage::open_with_clock(&dir.join("spans"), bench_configuration(dir), clock.clone())
        .expect("open bench storage");
    (storage, clock)
}

/// Exporter that accepts everything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExporter;

impl<T> SignalExporter<T> for NullExporter {
    fn export(&self, items: Vec<T>) -> ResultCode {
        drop(items);
        ResultCode::success()
    }

    fn flush(&self) -> ResultCode {
        ResultCode::success()
    }

    fn shutdown(&self) -> ResultCode {
        ResultCode::success()
    }
}
