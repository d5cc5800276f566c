//! Sample telemetry and property-based test generators using proptest.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

/// A small span-like telemetry item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpan {
    /// Trace the span belongs to, as 32 hex digits.
    pub trace_id: String,
    /// Span identifier, unique within a batch sequence.
    pub span_id: u64,
    /// Operation name.
    pub name: String,
    /// Start time in nanoseconds since the epoch.
    pub start_unix_nanos: u64,
    /// End time in nanoseconds since the epoch.
    pub end_unix_nanos: u64,
    /// Key/value attributes.
    pub attributes: Vec<(String, String)>,
}

impl TestSpan {
    /// Creates a span with a derived name and timing.
    pub fn new(span_id: u64) -> Self {
        let start = 1_700_000_000_000_000_000 + span_id * 1_000;
        Self {
            trace_id: format!("{:032x}", u128::from(span_id / 8) + 1),
            span_id,
            name: format!("operation-{span_id}"),
            start_unix_nanos: start,
            end_unix_nanos: start + 500,
            attributes: vec![("service.name".into(), "diskbuf-test".into())],
        }
    }
}

/// `n` spans with consecutive ids starting at `first_id`.
pub fn span_batch_from(first_id: u64, n: usize) -> Vec<TestSpan> {
    (first_id..first_id + n as u64).map(TestSpan::new).collect()
}

/// `n` spans with ids `0..n`.
pub fn span_batch(n: usize) -> Vec<TestSpan> {
    span_batch_from(0, n)
}

/// Strategy for a single span.
pub fn test_span_strategy() -> impl Strategy<Value = TestSpan> {
    (
        any::<u128>(),
        any::<u64>(),
        "[a-z][a-z0-9_.]{0,23}",
        any::<u32>(),
        prop::collection::vec(("[a-z.]{1,12}", "[ -~]{0,16}"), 0..4),
    )
        .prop_map(|(trace_id, span_id, name, duration, attributes)| TestSpan {
            trace_id: format!("{trace_id:032x}"),
            span_id,
            name,
            start_unix_nanos: 1_700_000_000_000_000_000,
            end_unix_nanos: 1_700_000_000_000_000_000 + u64::from(duration),
            attributes,
        })
}

/// Strategy for a non-empty batch of spans.
pub fn span_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<TestSpan>> {
    prop::collection::vec(test_span_strategy(), 1..=max_len.max(1))
}

/// Strategy for raw record payloads, empty payloads included.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Strategy for a sequence of raw payloads.
pub fn payload_sequence_strategy(
    max_payloads: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(max_len), 0..=max_payloads)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    ///
    /// Storage properties touch the file system on every case, so this is
    /// the usual choice for them.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
