//! Durable state for fixloop.
//!
//! Everything that survives a restart lives under one state directory:
//!
//! ```text
//! <state_dir>/
//!   checkpoint.json         last (phase, iteration) pair
//!   fingerprint.json        last failure report seen
//!   build_status            completion signal written by the pipeline
//!   artifacts/
//!     files_report.txt      per-file error listing
//!     summary_report.txt    failure summary
//! ```
//!
//! The two records are replaced atomically on every write, so a crash
//! mid-write never leaves a torn file for the next read.

mod artifacts;
mod checkpoint;
mod fingerprint;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;

pub use artifacts::{ErrorArtifacts, LoadedFailure};
pub use checkpoint::CheckpointStore;
pub use fingerprint::FingerprintStore;

/// Well-known file locations inside a state directory
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("checkpoint.json")
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.root.join("fingerprint.json")
    }

    pub fn completion_signal_path(&self) -> PathBuf {
        self.root.join("build_status")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn files_report_path(&self) -> PathBuf {
        self.artifacts_dir().join("files_report.txt")
    }

    pub fn summary_report_path(&self) -> PathBuf {
        self.artifacts_dir().join("summary_report.txt")
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(self.checkpoint_path())
    }

    pub fn fingerprint_store(&self) -> FingerprintStore {
        FingerprintStore::new(self.fingerprint_path())
    }

    pub fn artifacts(&self) -> ErrorArtifacts {
        ErrorArtifacts::new(self.files_report_path(), self.summary_report_path())
    }
}

/// Replace `path` with `bytes` via a temp file in the same directory and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/record.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_remove_if_exists_tolerates_missing() {
        let temp = TempDir::new().unwrap();
        remove_if_exists(&temp.path().join("missing")).unwrap();
    }

    #[test]
    fn test_layout_paths() {
        let layout = StateLayout::new("/var/lib/fixloop");
        assert_eq!(
            layout.summary_report_path(),
            PathBuf::from("/var/lib/fixloop/artifacts/summary_report.txt")
        );
        assert_eq!(
            layout.checkpoint_path(),
            PathBuf::from("/var/lib/fixloop/checkpoint.json")
        );
    }
}
