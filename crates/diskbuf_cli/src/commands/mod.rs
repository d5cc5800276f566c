//! CLI command implementations.

pub mod evict;
pub mod inspect;
pub mod verify;

use diskbuf_core::SignalKind;
use std::path::{Path, PathBuf};

/// Signal folders that exist under `root`.
pub fn signal_folders(root: &Path) -> Result<Vec<(SignalKind, PathBuf)>, Box<dyn std::error::Error>> {
    if !root.is_dir() {
        return Err(format!("No buffer root found at {:?}", root).into());
    }
    Ok(SignalKind::ALL
        .into_iter()
        .map(|kind| (kind, root.join(kind.folder_name())))
        .filter(|(_, path)| path.is_dir())
        .collect())
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> u64 {
    use diskbuf_storage::{Clock, SystemClock};
    SystemClock.now_millis()
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Formats a millisecond age for humans.
pub fn format_age(millis: u64) -> String {
    let secs = millis / 1000;
    if secs < 60 {
        format!("{}.{:03}s", secs, millis % 1000)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_existing_signal_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();
        std::fs::create_dir(dir.path().join("other")).unwrap();

        let folders = signal_folders(dir.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].0, SignalKind::Logs);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(signal_folders(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn human_formats() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_age(1_500), "1.500s");
        assert_eq!(format_age(125_000), "2m05s");
        assert_eq!(format_age(7_380_000), "2h03m");
    }
}
