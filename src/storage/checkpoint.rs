//! Checkpoint persistence: the (phase, iteration) pair the engine resumes from.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{remove_if_exists, write_atomic};
use crate::domain::LoopState;
use crate::error::{FixloopError, Result};

/// Single-record store for the loop checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last checkpoint.
    ///
    /// A missing, unreadable, or corrupt record is reported as `None`; the
    /// caller then starts from the initial phase at iteration 0.
    pub fn load(&self) -> Option<LoopState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Checkpoint {} unreadable, ignoring: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<LoopState>(&bytes) {
            Ok(state) => {
                debug!("Loaded checkpoint {} @ iteration {}", state.phase, state.iteration);
                Some(state)
            }
            Err(e) => {
                warn!("Checkpoint {} corrupt, ignoring: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Atomically replace the stored checkpoint
    pub fn save(&self, state: &LoopState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json).map_err(|e| {
            FixloopError::Checkpoint(format!("write {}: {}", self.path.display(), e))
        })
    }

    /// Remove the stored checkpoint
    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }
}
