//! Collaborator contracts the engine consumes.
//!
//! Both collaborators report failure through their return values. They never
//! return errors: anything that goes wrong on their side is a transient
//! condition the engine retries or escalates.

mod command;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{BuildOutcome, OutputMode};

pub use command::{AgentCommands, CommandPipeline, CommandResponseAgent, PipelineCommands};

/// The AI chat surface
#[async_trait]
pub trait ResponseAgent: Send + Sync {
    /// True once the surface has been quiet for its quiescence window with no
    /// in-progress indicator; false if `timeout` elapses first
    async fn wait_for_stability(&self, timeout: Duration) -> bool;

    /// Write the latest response's output artifact to disk
    async fn materialize_output(&self, mode: OutputMode) -> bool;

    /// Replace the prompt box contents with `text`
    async fn fill_prompt(&self, text: &str) -> bool;

    /// Attach a file to the pending prompt
    async fn attach_file(&self, path: &Path) -> bool;

    /// Send the pending prompt
    async fn submit(&self) -> bool;
}

/// The remote build pipeline
#[async_trait]
pub trait PipelineGateway: Send + Sync {
    /// Forget any completion signal left by a previous build
    async fn clear_signal(&self);

    /// Start a build. Fire-and-forget: problems surface as a poll timeout.
    async fn trigger(&self);

    /// Wait up to `timeout` for the build to report an outcome
    async fn poll_outcome(&self, timeout: Duration) -> BuildOutcome;
}
