//! # diskbuf testkit
//!
//! Test utilities for diskbuf.
//!
//! This crate provides:
//! - Temporary buffer roots with a configuration sized for fast tests
//! - A scriptable in-memory exporter to stand behind the disk buffer
//! - A sample telemetry type and proptest strategies for batches
//! - Helpers that damage buffer files the way a crash would
//!
//! ## Usage
//!
//! ```rust,ignore
//! use diskbuf_testkit::prelude::*;
//!
//! #[test]
//! fn buffered_spans_are_replayed() {
//!     let folder = TestFolder::new();
//!     let recording = RecordingExporter::<TestSpan>::new();
//!     // ... wrap `recording` in a DiskBufferingExporter rooted at `folder.path()`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use recording::*;
