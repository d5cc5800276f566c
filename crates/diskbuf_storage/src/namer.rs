//! Naming strategy for temporary read copies.

use std::fmt::Debug;
use std::path::PathBuf;
use uuid::Uuid;

/// Produces paths for the temporary copies the reader works from.
///
/// Returned paths must not collide with each other for the lifetime of the
/// process. They should live outside the signal folders so the copies are
/// never counted against the folder size cap.
pub trait TemporaryFileNamer: Send + Sync + Debug {
    /// Returns a fresh, unused path. `prefix` identifies the source file.
    fn temporary_path(&self, prefix: &str) -> PathBuf;
}

/// Names temporary files `<prefix>-<uuid>.tmp` inside a directory.
///
/// Uses the OS temporary directory unless one is given.
#[derive(Debug, Clone, Default)]
pub struct DefaultTemporaryFileNamer {
    dir: Option<PathBuf>,
}

impl DefaultTemporaryFileNamer {
    /// Creates a namer using the OS temporary directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a namer that places files in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl TemporaryFileNamer for DefaultTemporaryFileNamer {
    fn temporary_path(&self, prefix: &str) -> PathBuf {
        let dir = self.dir.clone().unwrap_or_else(std::env::temp_dir);
        dir.join(format!("{prefix}-{}.tmp", Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let namer = DefaultTemporaryFileNamer::in_dir("/buffers/tmp");
        let a = namer.temporary_path("spans-1");
        let b = namer.temporary_path("spans-1");
        assert_ne!(a, b);
        assert!(a.starts_with("/buffers/tmp"));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("spans-1-"));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn defaults_to_os_temp_dir() {
        let path = DefaultTemporaryFileNamer::new().temporary_path("logs");
        assert!(path.starts_with(std::env::temp_dir()));
    }
}
