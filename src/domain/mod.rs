//! Domain types for fixloop
//!
//! - Phase: the named states of the loop and their resume normalization
//! - LoopState / ErrorFingerprint / ErrorBundle: persisted and in-flight records
//! - BuildOutcome / OutputMode / LoopOutcome: results flowing through the engine
//! - LoopEvent: observer notifications

pub mod event;
pub mod outcome;
pub mod phase;
pub mod state;

pub use event::LoopEvent;
pub use outcome::{BuildOutcome, ExhaustionReason, LoopOutcome, OutputMode};
pub use phase::{Phase, RESUME_NORMALIZATION};
pub use state::{ErrorBundle, ErrorFingerprint, LoopState, content_hash};
