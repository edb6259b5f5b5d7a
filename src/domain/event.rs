//! Events delivered to observers.

use super::{LoopOutcome, Phase};

/// One observer notification, in owned form for channel delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    PhaseChanged { iteration: u32, phase: Phase },
    LogLine { message: String, is_error: bool },
    Finished(LoopOutcome),
}

impl LoopEvent {
    pub fn is_error(&self) -> bool {
        match self {
            LoopEvent::LogLine { is_error, .. } => *is_error,
            LoopEvent::Finished(outcome) => !outcome.is_success(),
            LoopEvent::PhaseChanged { .. } => false,
        }
    }
}
