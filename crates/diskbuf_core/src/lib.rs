//! # diskbuf core
//!
//! A telemetry exporter wrapper that writes every batch to disk first and
//! replays stored batches to the real exporter later.
//!
//! This crate provides:
//! - [`DiskBufferingExporter`], a drop-in [`SignalExporter`] backed by a
//!   [`diskbuf_storage::Storage`] folder per signal
//! - The [`SignalExporter`] and [`SignalSerializer`] capability traits
//! - [`ResultCode`], a completion handle for blocking or deferred outcomes
//! - A background retry worker, enabled through [`ExporterConfig`]
//!
//! Delivery is at least once: a batch whose export outcome is lost to a
//! crash is sent again after restart.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod disk_exporter;
mod error;
mod exporter;
mod result;
mod retry;
mod serializer;
mod signal;
mod stats;

pub use config::ExporterConfig;
pub use disk_exporter::{DiskBufferingExporter, FlushReport};
pub use error::{CoreError, CoreResult, ExportError};
pub use exporter::SignalExporter;
pub use result::ResultCode;
pub use serializer::{JsonSerializer, SerializationError, SignalSerializer};
pub use signal::SignalKind;
pub use stats::{ExportStats, ExportStatsSnapshot};

pub use diskbuf_storage::{StorageConfiguration, StorageConfigurationBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
