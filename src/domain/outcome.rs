//! Outcome types for builds, output extraction, and whole loop runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Phase;

/// Result of polling the remote build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failure,
    /// No completion signal before the deadline
    Timeout,
}

/// How the chat surface's output is turned into an artifact on disk.
///
/// The engine only passes this through; each strategy belongs to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Copy the last fenced code block
    #[default]
    InlineBlock,
    /// Save the file the response offers for download
    DownloadedFile,
    /// Take the response text verbatim
    PlainText,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::InlineBlock => "inline_block",
            OutputMode::DownloadedFile => "downloaded_file",
            OutputMode::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which ceiling ended the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    /// Timeout recovery ran out of attempts
    RecoveryCeiling,
    /// Too many correction cycles without a passing build
    IterationCeiling,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustionReason::RecoveryCeiling => f.write_str("retry ceiling exceeded"),
            ExhaustionReason::IterationCeiling => f.write_str("iteration ceiling exceeded"),
        }
    }
}

/// How a loop run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The build passed
    Succeeded { iteration: u32 },
    /// A retry or iteration ceiling was hit
    Exhausted {
        phase: Phase,
        iteration: u32,
        reason: ExhaustionReason,
    },
    /// The stop flag was observed at an iteration boundary
    Cancelled { phase: Phase, iteration: u32 },
    /// A storage fault or broken transition stopped the loop in `phase`
    Faulted {
        phase: Phase,
        iteration: u32,
        message: String,
    },
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoopOutcome::Succeeded { .. })
    }

    pub fn iteration(&self) -> u32 {
        match self {
            LoopOutcome::Succeeded { iteration }
            | LoopOutcome::Exhausted { iteration, .. }
            | LoopOutcome::Cancelled { iteration, .. }
            | LoopOutcome::Faulted { iteration, .. } => *iteration,
        }
    }
}

impl fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopOutcome::Succeeded { iteration } => {
                write!(f, "build succeeded after {} iteration(s)", iteration)
            }
            LoopOutcome::Exhausted {
                phase,
                iteration,
                reason,
            } => write!(f, "{} in {} (iteration {})", reason, phase, iteration),
            LoopOutcome::Cancelled { phase, iteration } => {
                write!(f, "cancelled before {} (iteration {})", phase, iteration)
            }
            LoopOutcome::Faulted {
                phase,
                iteration,
                message,
            } => write!(f, "fault in {} (iteration {}): {}", phase, iteration, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_serde() {
        let mode: OutputMode = serde_json::from_str("\"downloaded_file\"").unwrap();
        assert_eq!(mode, OutputMode::DownloadedFile);
        assert_eq!(OutputMode::default(), OutputMode::InlineBlock);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = LoopOutcome::Exhausted {
            phase: Phase::TimeoutRecovery,
            iteration: 3,
            reason: ExhaustionReason::RecoveryCeiling,
        };
        assert_eq!(
            outcome.to_string(),
            "retry ceiling exceeded in timeout_recovery (iteration 3)"
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.iteration(), 3);
    }

    #[test]
    fn test_cancelled_is_distinct_from_exhausted() {
        let cancelled = LoopOutcome::Cancelled {
            phase: Phase::WaitingForBuild,
            iteration: 1,
        };
        assert!(cancelled.to_string().starts_with("cancelled"));
        assert!(!cancelled.is_success());
    }

    #[test]
    fn test_faulted_display() {
        let faulted = LoopOutcome::Faulted {
            phase: Phase::ReadingErrorLogs,
            iteration: 2,
            message: "Fingerprint error: disk full".to_string(),
        };
        assert_eq!(
            faulted.to_string(),
            "fault in reading_error_logs (iteration 2): Fingerprint error: disk full"
        );
        assert!(!faulted.is_success());
        assert_eq!(faulted.iteration(), 2);
    }
}
