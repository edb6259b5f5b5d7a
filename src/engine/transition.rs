//! Pure transition logic for the loop.
//!
//! `transition` maps the current cursor and the signal produced by the phase's
//! action to the next cursor, or to the end of the run. It performs no I/O, so
//! every rule of the state machine is testable without collaborators.

use std::fmt;

use super::retry::RetryPolicy;
use crate::domain::{ExhaustionReason, LoopOutcome, Phase};
use crate::error::{FixloopError, Result};

/// What a phase's action reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The action succeeded
    Done,
    /// The action failed or timed out
    Failed,
    BuildPassed,
    BuildFailed,
    BuildTimedOut,
    /// The failure report differs from the stored fingerprint
    NewFailure,
    /// The failure report matches the stored fingerprint
    StaleFailure,
    /// The recovery delay ran out
    BackoffElapsed,
    /// No recovery attempts left
    RecoveryExhausted,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Machine state. `phase`, `iteration` and `nudge` are checkpointed; the
/// counters start over after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub phase: Phase,
    /// Completed correction cycles
    pub iteration: u32,
    /// Consecutive failed attempts of `phase`
    pub retries: u32,
    /// Timeout recoveries since the last completed cycle
    pub recoveries: u32,
    /// SubmittingPrompt must fill the nudge text before sending
    pub nudge: bool,
}

impl Cursor {
    pub fn new(phase: Phase, iteration: u32) -> Self {
        Self {
            phase,
            iteration,
            retries: 0,
            recoveries: 0,
            nudge: false,
        }
    }

    /// Enter `phase` with a fresh retry counter
    fn advance(self, phase: Phase) -> Self {
        Self {
            phase,
            retries: 0,
            nudge: false,
            ..self
        }
    }

    /// A prompt is about to go out: one more correction cycle, and the
    /// recovery budget starts over
    fn complete_cycle(self, nudge: bool) -> Self {
        Self {
            phase: Phase::SubmittingPrompt,
            iteration: self.iteration.saturating_add(1),
            retries: 0,
            recoveries: 0,
            nudge,
        }
    }

    /// Re-enter the current phase, or escalate once retries are spent
    fn retry_or_recover(self, policy: &RetryPolicy) -> Self {
        if policy.can_retry(self.retries) {
            Self {
                retries: self.retries + 1,
                ..self
            }
        } else {
            self.advance(Phase::TimeoutRecovery)
        }
    }
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Next(Cursor),
    Finish(LoopOutcome),
}

/// Compute the step that follows `signal` in `cursor.phase`
pub fn transition(cursor: Cursor, signal: Signal, policy: &RetryPolicy) -> Result<Step> {
    use Phase::*;
    use Signal::*;

    let next = match (cursor.phase, signal) {
        (Idle, Done) => cursor.advance(Phase::INITIAL),

        (WaitingForResponse, Done) => cursor.advance(ExtractingOutput),
        (WaitingForResponse, Failed) => cursor.advance(TimeoutRecovery),

        (ExtractingOutput, Done) => cursor.advance(TriggeringBuild),
        (ExtractingOutput, Failed) => cursor.retry_or_recover(policy),

        (TriggeringBuild, Done) => cursor.advance(WaitingForBuild),

        (WaitingForBuild, BuildPassed) => cursor.advance(BuildSucceeded),
        (WaitingForBuild, BuildFailed) => cursor.advance(CheckingFreshness),
        (WaitingForBuild, BuildTimedOut) => cursor.advance(TimeoutRecovery),

        (CheckingFreshness, NewFailure) => cursor.advance(ReadingErrorLogs),
        (CheckingFreshness, StaleFailure) => cursor.complete_cycle(true),

        (ReadingErrorLogs, Done) => cursor.advance(AttachingFiles),
        (ReadingErrorLogs, Failed) => cursor.advance(TimeoutRecovery),

        (AttachingFiles, Done) => cursor.complete_cycle(false),
        (AttachingFiles, Failed) => cursor.retry_or_recover(policy),

        (SubmittingPrompt, Done) => cursor.advance(WaitingForResponse),
        (SubmittingPrompt, Failed) => cursor.retry_or_recover(policy),

        (BuildSucceeded, Done) => {
            return Ok(Step::Finish(LoopOutcome::Succeeded {
                iteration: cursor.iteration,
            }));
        }

        (TimeoutRecovery, BackoffElapsed) => Cursor {
            recoveries: cursor.recoveries + 1,
            ..cursor.advance(WaitingForResponse)
        },
        (TimeoutRecovery, RecoveryExhausted) => {
            return Ok(Step::Finish(LoopOutcome::Exhausted {
                phase: TimeoutRecovery,
                iteration: cursor.iteration,
                reason: ExhaustionReason::RecoveryCeiling,
            }));
        }

        (phase, signal) => {
            return Err(FixloopError::InvalidTransition {
                phase,
                signal: signal.to_string(),
            });
        }
    };

    Ok(Step::Next(next))
}

/// Ends the run once more cycles than allowed have been started
pub fn check_iteration_ceiling(cursor: &Cursor, policy: &RetryPolicy) -> Option<LoopOutcome> {
    (cursor.iteration > policy.max_iterations).then(|| LoopOutcome::Exhausted {
        phase: cursor.phase,
        iteration: cursor.iteration,
        reason: ExhaustionReason::IterationCeiling,
    })
}
