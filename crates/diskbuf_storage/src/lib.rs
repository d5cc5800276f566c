//! # diskbuf storage
//!
//! Rotating append-only buffer files for telemetry batches.
//!
//! Each signal kind gets its own folder of buffer files. A file is written
//! for a bounded time and size, then closed. Closed files become readable
//! once they are old enough and are replayed oldest first, record by
//! record. Files that outlive the retry horizon, or that push the folder
//! over its size cap, are evicted.
//!
//! This crate knows nothing about what a record contains: payloads are
//! opaque bytes framed with a 4-byte big-endian length.
//!
//! ## Example
//!
//! ```rust
//! use diskbuf_storage::{ManualClock, ReadOutcome, RecordDisposition, Storage, StorageConfiguration};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let clock = Arc::new(ManualClock::default());
//! let storage = Storage::open_with_clock(
//!     &dir.path().join("spans"),
//!     StorageConfiguration::default(),
//!     clock.clone(),
//! )
//! .unwrap();
//!
//! storage.write(b"batch").unwrap();
//! clock.advance(Duration::from_secs(40));
//!
//! let outcome = storage
//!     .read_and_process(|payload| {
//!         assert_eq!(payload, b"batch");
//!         RecordDisposition::Consume
//!     })
//!     .unwrap();
//! assert_eq!(outcome, ReadOutcome::Processed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod eviction;
mod folder;
mod namer;
mod readable;
mod record;
mod stats;
mod storage;
mod writable;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StorageConfiguration, StorageConfigurationBuilder};
pub use error::{StorageError, StorageResult};
pub use eviction::{Eviction, EvictionPolicy, EvictionReason};
pub use folder::{
    file_name_for, parse_file_name, scan_folder, select_oldest_readable, BufferFileEntry,
    SignalFolder, LOCK_FILE,
};
pub use namer::{DefaultTemporaryFileNamer, TemporaryFileNamer};
pub use readable::{CloseOutcome, ReadableFile};
pub use record::{encode_record, framed_len, summarize, RecordReader, RecordSummary, LENGTH_PREFIX_SIZE};
pub use stats::{StorageStats, StorageStatsSnapshot};
pub use storage::{ReadOutcome, RecordDisposition, Storage};
pub use writable::{AppendOutcome, WritableFile, WriteLimits};
