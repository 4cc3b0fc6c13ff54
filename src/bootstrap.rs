//! Storage directory layout and startup bootstrap.
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::info;

/// Directory holding one `.grprf` record per group, relative to the root.
pub const PREFS_DIR: &str = "GroupPrefs";
/// Directory holding one warning store per group, relative to the root.
pub const DB_DIR: &str = "GroupPrefs/DB";

/// Fixed on-disk layout anchored at a root directory (the process working
/// directory in production, a temp dir in tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn prefs_dir(&self) -> PathBuf {
        self.root.join(PREFS_DIR)
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join(DB_DIR)
    }

    /// Resolve a root-relative path as stored in a record file.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Create whichever of `GroupPrefs/` and `GroupPrefs/DB/` are missing.
    pub fn ensure(&self) -> Result<(), io::Error> {
        for dir in [self.prefs_dir(), self.db_dir()] {
            if !dir.is_dir() {
                fs::create_dir_all(&dir)?;
                info!(dir = %dir.display(), "created storage directory");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_creates_both_dirs() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.ensure().unwrap();
        assert!(td.path().join("GroupPrefs").is_dir());
        assert!(td.path().join("GroupPrefs/DB").is_dir());
    }

    #[test]
    fn ensure_fills_in_missing_db_dir() {
        let td = tempdir().unwrap();
        fs::create_dir(td.path().join("GroupPrefs")).unwrap();
        fs::write(td.path().join("GroupPrefs/a.grprf"), "[GROUP_NAMES]\nNAME = a\n").unwrap();
        let layout = Layout::new(td.path());
        layout.ensure().unwrap();
        assert!(layout.db_dir().is_dir());
        assert!(layout.prefs_dir().join("a.grprf").exists());
    }

    #[test]
    fn ensure_is_idempotent() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(layout.db_dir().is_dir());
    }

    #[test]
    fn ensure_fails_when_root_is_a_file() {
        let td = tempdir().unwrap();
        let file = td.path().join("not_a_dir");
        fs::write(&file, "").unwrap();
        assert!(Layout::new(&file).ensure().is_err());
    }
}
