//! Evict command implementation.

use super::{format_size, now_millis, signal_folders};
use diskbuf_storage::{Eviction, EvictionPolicy, SignalFolder, StorageError};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Outcome of evicting one signal folder.
#[derive(Debug, Default)]
pub struct EvictResult {
    /// Files that were (or would be) deleted.
    pub evicted: Vec<Eviction>,
    /// Bytes that were (or would be) freed.
    pub bytes_freed: u64,
}

/// Plans and optionally applies eviction for one signal folder.
///
/// Takes the folder lock first, so a running exporter is never raced.
/// Offline there is no open file, so every file is subject to the age cap.
pub fn evict_folder(
    path: &Path,
    policy: &EvictionPolicy,
    now_millis: u64,
    dry_run: bool,
) -> Result<EvictResult, Box<dyn std::error::Error>> {
    let folder = match SignalFolder::open(path) {
        Ok(folder) => folder,
        Err(StorageError::FolderLocked { .. }) => {
            return Err(format!("{:?} is in use by a running exporter", path).into());
        }
        Err(e) => return Err(e.into()),
    };

    let evicted = policy.plan(&folder.scan()?, None, now_millis);
    let mut bytes_freed = 0;
    for eviction in &evicted {
        if !dry_run {
            match fs::remove_file(&eviction.entry.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        bytes_freed += eviction.entry.size;
    }

    Ok(EvictResult {
        evicted,
        bytes_freed,
    })
}

/// Runs the evict command.
pub fn run(
    root: &Path,
    max_folder_size: u64,
    max_read_age_secs: u64,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Evicting buffers at {:?}", root);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let policy = EvictionPolicy::new(max_folder_size, Duration::from_secs(max_read_age_secs));
    let now = now_millis();

    for (kind, path) in signal_folders(root)? {
        let result = evict_folder(&path, &policy, now, dry_run)?;
        println!(
            "{}: {} files, {}",
            kind,
            result.evicted.len(),
            format_size(result.bytes_freed)
        );
        for eviction in &result.evicted {
            println!(
                "  {} ({}, {})",
                eviction.entry.created_at_millis,
                eviction.reason,
                format_size(eviction.entry.size)
            );
        }
        if !dry_run && !result.evicted.is_empty() {
            tracing::info!(
                signal = %kind,
                files = result.evicted.len(),
                bytes = result.bytes_freed,
                "evicted buffered data without delivering it"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskbuf_storage::EvictionReason;

    const NOW: u64 = 1_700_000_100_000;

    fn populate(dir: &Path) {
        fs::write(dir.join((NOW - 20_000).to_string()), vec![0u8; 40]).unwrap();
        fs::write(dir.join((NOW - 5_000).to_string()), vec![0u8; 40]).unwrap();
        fs::write(dir.join((NOW - 4_000).to_string()), vec![0u8; 40]).unwrap();
        fs::write(dir.join((NOW - 3_000).to_string()), vec![0u8; 40]).unwrap();
    }

    #[test]
    fn applies_age_then_size() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let policy = EvictionPolicy::new(100, Duration::from_secs(10));

        let result = evict_folder(dir.path(), &policy, NOW, false).unwrap();
        let reasons: Vec<_> = result.evicted.iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec![EvictionReason::MaxAge, EvictionReason::FolderSize]);
        assert_eq!(result.bytes_freed, 80);
        assert!(!dir.path().join((NOW - 20_000).to_string()).exists());
        assert!(!dir.path().join((NOW - 5_000).to_string()).exists());
        assert!(dir.path().join((NOW - 3_000).to_string()).exists());
    }

    #[test]
    fn dry_run_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let policy = EvictionPolicy::new(100, Duration::from_secs(10));

        let result = evict_folder(dir.path(), &policy, NOW, true).unwrap();
        assert_eq!(result.evicted.len(), 2);
        assert!(dir.path().join((NOW - 20_000).to_string()).exists());
    }

    #[test]
    fn refuses_a_locked_folder() {
        let dir = tempfile::tempdir().unwrap();
        let _held = SignalFolder::open(dir.path()).unwrap();
        let policy = EvictionPolicy::new(100, Duration::from_secs(10));

        assert!(evict_folder(dir.path(), &policy, NOW, false).is_err());
    }
}
