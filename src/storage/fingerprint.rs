//! Fingerprint of the last failure report the loop acted on.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use super::{remove_if_exists, write_atomic};
use crate::domain::ErrorFingerprint;
use crate::error::{FixloopError, Result};

/// Single-record store for the last-seen failure fingerprint.
///
/// Never cleared by triggering a build or by a passing build; only an explicit
/// reset removes it.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored fingerprint; corrupt records read as absent
    pub fn load(&self) -> Option<ErrorFingerprint> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Fingerprint {} unreadable, ignoring: {}", self.path.display(), e);
                return None;
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| warn!("Fingerprint {} corrupt, ignoring: {}", self.path.display(), e))
            .ok()
    }

    /// Atomically replace the stored fingerprint
    pub fn save(&self, fingerprint: &ErrorFingerprint) -> Result<()> {
        let json = serde_json::to_vec_pretty(fingerprint)?;
        write_atomic(&self.path, &json).map_err(|e| {
            FixloopError::Fingerprint(format!("write {}: {}", self.path.display(), e))
        })
    }

    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }

    /// True if `current` carries information the loop has not acted on yet.
    ///
    /// That is the case for the first failure ever seen, and for any report
    /// whose modification time or bytes differ from the stored one. Noisy but
    /// otherwise unchanged output counts as new.
    pub fn has_new_failure(&self, current: &ErrorFingerprint) -> bool {
        match self.load() {
            Some(stored) => stored != *current,
            None => true,
        }
    }
}
