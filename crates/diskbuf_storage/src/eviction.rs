//! Age and size based eviction planning.
//!
//! Planning is pure: it takes a scan of the folder and returns the files to
//! delete. [`crate::Storage`] applies the plan while holding the folder lock,
//! so eviction and the writer always agree on which file is open.

use crate::config::StorageConfiguration;
use crate::folder::BufferFileEntry;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Why a file is being discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// The folder exceeded its size cap.
    FolderSize,
    /// The file aged past the retry horizon.
    MaxAge,
}

impl EvictionReason {
    /// Stable label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FolderSize => "folder_size",
            Self::MaxAge => "max_age",
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// The file to delete.
    pub entry: BufferFileEntry,
    /// Why it goes.
    pub reason: EvictionReason,
}

/// Decides which buffer files to give up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    max_folder_size: u64,
    max_file_age_for_read_millis: u64,
}

impl EvictionPolicy {
    /// Creates a policy from explicit limits.
    pub fn new(max_folder_size: u64, max_file_age_for_read: Duration) -> Self {
        Self {
            max_folder_size,
            max_file_age_for_read_millis: max_file_age_for_read.as_millis() as u64,
        }
    }

    /// Creates a policy from a storage configuration.
    pub fn from_config(config: &StorageConfiguration) -> Self {
        Self {
            max_folder_size: config.max_folder_size(),
            max_file_age_for_read_millis: config.max_file_age_for_read_millis(),
        }
    }

    /// Whether `entry` is past the retry horizon.
    pub fn is_expired(&self, entry: &BufferFileEntry, now_millis: u64) -> bool {
        entry.age_millis(now_millis) > self.max_file_age_for_read_millis
    }

    /// Closed files older than the max read age.
    ///
    /// The open file is skipped: it is rotated long before it could reach
    /// this age, and the size pass covers it otherwise.
    pub fn expired(
        &self,
        entries: &[BufferFileEntry],
        open: Option<&Path>,
        now_millis: u64,
    ) -> Vec<Eviction> {
        entries
            .iter()
            .filter(|e| open != Some(e.path.as_path()))
            .filter(|e| self.is_expired(e, now_millis))
            .map(|e| Eviction {
                entry: e.clone(),
                reason: EvictionReason::MaxAge,
            })
            .collect()
    }

    /// Oldest files to drop until the folder fits under its cap.
    ///
    /// `entries` must be sorted oldest first. Every file counts, including
    /// the open one, and read eligibility is ignored.
    pub fn over_capacity(&self, entries: &[BufferFileEntry]) -> Vec<Eviction> {
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        let mut evictions = Vec::new();
        for entry in entries {
            if total <= self.max_folder_size {
                break;
            }
            total -= entry.size;
            evictions.push(Eviction {
                entry: entry.clone(),
                reason: EvictionReason::FolderSize,
            });
        }
        evictions
    }

    /// Full pass: the age cap first, then the size cap on what remains.
    pub fn plan(
        &self,
        entries: &[BufferFileEntry],
        open: Option<&Path>,
        now_millis: u64,
    ) -> Vec<Eviction> {
        let mut evictions = self.expired(entries, open, now_millis);
        let remaining: Vec<BufferFileEntry> = entries
            .iter()
            .filter(|e| !evictions.iter().any(|ev| ev.entry.path == e.path))
            .cloned()
            .collect();
        evictions.extend(self.over_capacity(&remaining));
        evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(created: u64, size: u64) -> BufferFileEntry {
        BufferFileEntry {
            path: PathBuf::from(format!("/buf/{created}")),
            created_at_millis: created,
            size,
        }
    }

    fn policy() -> EvictionPolicy {
        EvictionPolicy::new(100, Duration::from_secs(10))
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let entries = vec![entry(1, 40), entry(2, 60)];
        assert!(policy().over_capacity(&entries).is_empty());
    }

    #[test]
    fn over_capacity_drops_oldest_first() {
        let entries = vec![entry(1, 40), entry(2, 40), entry(3, 40)];
        let evictions = policy().over_capacity(&entries);
        assert_eq!(evictions.len(), 1);
        assert_eq!(evictions[0].entry.created_at_millis, 1);
        assert_eq!(evictions[0].reason, EvictionReason::FolderSize);
    }

    #[test]
    fn over_capacity_may_drop_several() {
        let entries = vec![entry(1, 90), entry(2, 90), entry(3, 50)];
        let evictions = policy().over_capacity(&entries);
        let dropped: Vec<u64> = evictions.iter().map(|e| e.entry.created_at_millis).collect();
        assert_eq!(dropped, vec![1, 2]);
    }

    #[test]
    fn expired_skips_open_file() {
        let entries = vec![entry(1_000, 1), entry(2_000, 1), entry(50_000, 1)];
        let open = entries[1].path.clone();
        let evictions = policy().expired(&entries, Some(&open), 20_000);
        assert_eq!(evictions.len(), 1);
        assert_eq!(evictions[0].entry.created_at_millis, 1_000);
        assert_eq!(evictions[0].reason, EvictionReason::MaxAge);
    }

    #[test]
    fn expiry_is_strictly_after_max_age() {
        let e = entry(0, 1);
        assert!(!policy().is_expired(&e, 10_000));
        assert!(policy().is_expired(&e, 10_001));
    }

    #[test]
    fn plan_does_not_double_count() {
        // The expired file alone would satisfy the size cap.
        let entries = vec![entry(0, 80), entry(15_000, 30), entry(16_000, 30)];
        let evictions = policy().plan(&entries, None, 16_000);
        assert_eq!(evictions.len(), 1);
        assert_eq!(evictions[0].reason, EvictionReason::MaxAge);
    }

    #[test]
    fn reason_labels() {
        assert_eq!(EvictionReason::FolderSize.to_string(), "folder_size");
        assert_eq!(EvictionReason::MaxAge.as_str(), "max_age");
    }
}
