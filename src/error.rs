//! Error types for fixloop
//!
//! Centralized error handling using thiserror. Collaborator failures are not
//! errors here: the engine turns them into phase transitions. What remains is
//! storage faults and broken invariants.

use thiserror::Error;

use crate::domain::Phase;

/// All error types that can escape the orchestration loop
#[derive(Debug, Error)]
pub enum FixloopError {
    /// Checkpoint could not be written
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Fingerprint could not be written
    #[error("Fingerprint error: {0}")]
    Fingerprint(String),

    /// Failure artifacts could not be read for a reason other than absence
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Corrective prompt template could not be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// A phase received a signal it has no transition for
    #[error("Invalid transition: {phase} cannot handle {signal}")]
    InvalidTransition { phase: Phase, signal: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for fixloop operations
pub type Result<T> = std::result::Result<T, FixloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_error() {
        let err = FixloopError::Checkpoint("disk full".to_string());
        assert_eq!(err.to_string(), "Checkpoint error: disk full");
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = FixloopError::InvalidTransition {
            phase: Phase::TriggeringBuild,
            signal: "NewFailure".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: triggering_build cannot handle NewFailure"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FixloopError = io_err.into();
        assert!(matches!(err, FixloopError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: FixloopError = json_err.into();
        assert!(matches!(err, FixloopError::Json(_)));
    }
}
