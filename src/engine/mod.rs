//! The orchestration engine.
//!
//! - `transition`: pure `(cursor, signal) -> step` rules
//! - `retry`: per-phase retry, recovery backoff, and iteration bounds
//! - `prompt`: texts sent back to the chat surface
//! - `runner`: the `Engine`, which checkpoints, runs each phase's action
//!   against the collaborators, and feeds the result through `transition`

mod prompt;
mod retry;
mod runner;
mod transition;

use std::time::Duration;

use crate::domain::OutputMode;

pub use prompt::{DEFAULT_CORRECTIVE_PROMPT, DEFAULT_NUDGE_PROMPT, render_corrective};
pub use retry::RetryPolicy;
pub use runner::Engine;
pub use transition::{Cursor, Signal, Step, check_iteration_ceiling, transition};

/// Everything the engine needs besides its collaborators and state directory
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub policy: RetryPolicy,
    /// Extraction strategy passed to the response agent
    pub output_mode: OutputMode,
    /// Deadline for the chat surface to go quiet
    pub response_timeout: Duration,
    /// Deadline for the build to report an outcome
    pub build_timeout: Duration,
    /// Sent when a failure repeats unchanged
    pub nudge_prompt: String,
    /// Template sent with fresh failure artifacts
    pub corrective_prompt: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            output_mode: OutputMode::default(),
            response_timeout: Duration::from_secs(300),
            build_timeout: Duration::from_secs(1200),
            nudge_prompt: DEFAULT_NUDGE_PROMPT.to_string(),
            corrective_prompt: DEFAULT_CORRECTIVE_PROMPT.to_string(),
        }
    }
}
