//! Telemetry signal kinds.

use std::fmt;

/// The kind of telemetry a buffering exporter handles.
///
/// Each kind owns one folder under the buffer root, so signals never share
/// files, size caps or read order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Trace spans.
    Spans,
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
}

impl SignalKind {
    /// Every signal kind, in folder order.
    pub const ALL: [SignalKind; 3] = [Self::Spans, Self::Metrics, Self::Logs];

    /// Name of the folder this signal is buffered in.
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Spans => "spans",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
        }
    }

    /// Looks a signal up by folder name.
    pub fn from_folder_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.folder_name() == name)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_are_distinct() {
        assert_eq!(SignalKind::Spans.folder_name(), "spans");
        assert_eq!(SignalKind::Metrics.folder_name(), "metrics");
        assert_eq!(SignalKind::Logs.to_string(), "logs");
    }

    #[test]
    fn lookup_by_folder_name() {
        for kind in SignalKind::ALL {
            assert_eq!(SignalKind::from_folder_name(kind.folder_name()), Some(kind));
        }
        assert_eq!(SignalKind::from_folder_name("traces"), None);
    }
}
