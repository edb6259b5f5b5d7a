//! Persisted loop records: the checkpoint, the failure fingerprint, and the
//! failure bundle handed to the chat surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Phase;

/// Checkpoint record, written before every phase transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub phase: Phase,
    /// Completed correction cycles
    pub iteration: u32,
    /// The pending prompt is the stale-failure nudge. Only meaningful at
    /// `SubmittingPrompt`.
    #[serde(default)]
    pub nudge: bool,
    pub updated_at: DateTime<Utc>,
}

impl LoopState {
    pub fn new(phase: Phase, iteration: u32) -> Self {
        Self {
            phase,
            iteration,
            nudge: false,
            updated_at: Utc::now(),
        }
    }

    /// Same record, marked as waiting to send the nudge
    pub fn with_nudge(self, nudge: bool) -> Self {
        Self { nudge, ..self }
    }

    /// Checkpoint a fresh loop starts from
    pub fn initial() -> Self {
        Self::new(Phase::INITIAL, 0)
    }

    /// Same record with its phase passed through resume normalization
    pub fn normalized(&self) -> Self {
        let phase = self.phase.normalize_for_resume();
        Self {
            phase,
            nudge: self.nudge && phase == Phase::SubmittingPrompt,
            ..self.clone()
        }
    }
}

/// Identity of one failure report.
///
/// Equality deliberately ignores `iteration`: two fingerprints match iff the
/// report was observed at the same modification time with the same bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFingerprint {
    /// Modification time of the summary report
    pub observed_at: DateTime<Utc>,
    /// Hex SHA-256 of the summary report bytes
    pub content_hash: String,
    /// Loop iteration the report was first seen in
    pub iteration: u32,
}

impl ErrorFingerprint {
    /// Fingerprint raw report bytes
    pub fn compute(bytes: &[u8], observed_at: DateTime<Utc>, iteration: u32) -> Self {
        Self {
            observed_at,
            content_hash: content_hash(bytes),
            iteration,
        }
    }
}

impl PartialEq for ErrorFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.observed_at == other.observed_at && self.content_hash == other.content_hash
    }
}

impl Eq for ErrorFingerprint {}

/// Hex SHA-256 digest of the given bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The two artifacts a failed build leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBundle {
    /// Per-file error listing
    pub files_report: String,
    /// Condensed failure summary (the fingerprinted artifact)
    pub summary_report: String,
}
