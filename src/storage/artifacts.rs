//! Failure artifacts left by a failed build.
//!
//! The pipeline writes these; the engine only reads them. Absence is normal
//! (no failure yet, or the artifacts are still arriving) and is reported as
//! `None`, never as an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::{ErrorBundle, ErrorFingerprint};
use crate::error::{FixloopError, Result};

/// A bundle together with the fingerprint of the summary it was read from
#[derive(Debug, Clone)]
pub struct LoadedFailure {
    pub bundle: ErrorBundle,
    pub fingerprint: ErrorFingerprint,
}

/// Read access to the two failure artifacts
#[derive(Debug, Clone)]
pub struct ErrorArtifacts {
    files_report: PathBuf,
    summary_report: PathBuf,
}

impl ErrorArtifacts {
    pub fn new(files_report: impl Into<PathBuf>, summary_report: impl Into<PathBuf>) -> Self {
        Self {
            files_report: files_report.into(),
            summary_report: summary_report.into(),
        }
    }

    pub fn files_report_path(&self) -> &Path {
        &self.files_report
    }

    pub fn summary_report_path(&self) -> &Path {
        &self.summary_report
    }

    /// Fingerprint the current summary report, if there is one
    pub fn current_fingerprint(&self, iteration: u32) -> Result<Option<ErrorFingerprint>> {
        Ok(read_stamped(&self.summary_report)?
            .map(|(bytes, observed_at)| ErrorFingerprint::compute(&bytes, observed_at, iteration)))
    }

    /// Read both reports. `None` unless both are present.
    pub fn load(&self, iteration: u32) -> Result<Option<LoadedFailure>> {
        let Some((summary_bytes, observed_at)) = read_stamped(&self.summary_report)? else {
            return Ok(None);
        };
        let Some((files_bytes, _)) = read_stamped(&self.files_report)? else {
            return Ok(None);
        };

        Ok(Some(LoadedFailure {
            fingerprint: ErrorFingerprint::compute(&summary_bytes, observed_at, iteration),
            bundle: ErrorBundle {
                files_report: String::from_utf8_lossy(&files_bytes).into_owned(),
                summary_report: String::from_utf8_lossy(&summary_bytes).into_owned(),
            },
        }))
    }
}

/// Read a file's bytes along with its modification time
fn read_stamped(path: &Path) -> Result<Option<(Vec<u8>, DateTime<Utc>)>> {
    let io = |e: std::io::Error| FixloopError::Artifact(format!("{}: {}", path.display(), e));

    // Stat before reading: a rewrite between the two calls then shows up as a
    // newer report on the next comparison rather than being missed.
    let modified = match fs::metadata(path) {
        Ok(meta) => meta.modified().map_err(io)?,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io(e)),
    };
    match fs::read(path) {
        Ok(bytes) => Ok(Some((bytes, DateTime::<Utc>::from(modified)))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io(e)),
    }
}
