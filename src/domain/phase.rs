//! Phases of the build-fix loop.
//!
//! A Phase is the unit of resumability: the checkpoint stores exactly one, and
//! the engine resumes from it after a restart.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named state of the orchestration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Engine not running
    Idle,
    /// Waiting for the chat surface to go quiet
    WaitingForResponse,
    /// Materializing the AI output onto disk
    ExtractingOutput,
    /// Starting a remote build
    TriggeringBuild,
    /// Polling the remote build for an outcome
    WaitingForBuild,
    /// Comparing the latest failure against the stored fingerprint
    CheckingFreshness,
    /// Loading the failure artifacts
    ReadingErrorLogs,
    /// Attaching failure artifacts and filling the corrective prompt
    AttachingFiles,
    /// Sending the filled prompt
    SubmittingPrompt,
    /// Build passed, loop is done
    BuildSucceeded,
    /// Backing off before returning to WaitingForResponse
    TimeoutRecovery,
}

/// Phases rewritten on load. Anything not listed resumes as-is.
///
/// - `Idle` has no action; a run always starts at the initial phase.
/// - `AttachingFiles` lives on an in-memory bundle that does not survive a
///   restart, and the chat surface may hold a half-attached prompt. Reading
///   the artifacts again rebuilds the bundle.
/// - `TimeoutRecovery` only forwards to `WaitingForResponse` once its delay
///   elapses; the retry count it backs off on is not persisted.
pub const RESUME_NORMALIZATION: &[(Phase, Phase)] = &[
    (Phase::Idle, Phase::WaitingForResponse),
    (Phase::AttachingFiles, Phase::ReadingErrorLogs),
    (Phase::TimeoutRecovery, Phase::WaitingForResponse),
];

impl Phase {
    /// Phase a fresh loop starts in
    pub const INITIAL: Phase = Phase::WaitingForResponse;

    /// All phases, in loop order
    pub const ALL: [Phase; 11] = [
        Phase::Idle,
        Phase::WaitingForResponse,
        Phase::ExtractingOutput,
        Phase::TriggeringBuild,
        Phase::WaitingForBuild,
        Phase::CheckingFreshness,
        Phase::ReadingErrorLogs,
        Phase::AttachingFiles,
        Phase::SubmittingPrompt,
        Phase::BuildSucceeded,
        Phase::TimeoutRecovery,
    ];

    /// Stable name used in checkpoints and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::WaitingForResponse => "waiting_for_response",
            Phase::ExtractingOutput => "extracting_output",
            Phase::TriggeringBuild => "triggering_build",
            Phase::WaitingForBuild => "waiting_for_build",
            Phase::CheckingFreshness => "checking_freshness",
            Phase::ReadingErrorLogs => "reading_error_logs",
            Phase::AttachingFiles => "attaching_files",
            Phase::SubmittingPrompt => "submitting_prompt",
            Phase::BuildSucceeded => "build_succeeded",
            Phase::TimeoutRecovery => "timeout_recovery",
        }
    }

    /// Returns true if the loop exits once this phase is reached
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::BuildSucceeded)
    }

    /// Map a loaded checkpoint phase to the phase the loop may safely resume in
    pub fn normalize_for_resume(self) -> Phase {
        RESUME_NORMALIZATION
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .unwrap_or(self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
