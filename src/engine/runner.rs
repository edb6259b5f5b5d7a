//! Engine implementation - drives one build-fix loop to success or abandonment.
//!
//! Each iteration of the control loop:
//! 1. Checks the stop flag and the iteration ceiling (the only places a run
//!    can end early)
//! 2. Notifies the observer of the phase about to run
//! 3. Runs the phase's action against the collaborators and stores
//! 4. Feeds the resulting signal through `transition`
//! 5. Checkpoints the next phase before its action can start

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::EngineConfig;
use super::prompt::render_corrective;
use super::transition::{Cursor, Signal, Step, check_iteration_ceiling, transition};
use crate::domain::{BuildOutcome, ErrorBundle, LoopOutcome, LoopState, Phase};
use crate::error::Result;
use crate::gateway::{PipelineGateway, ResponseAgent};
use crate::observer::Observer;
use crate::storage::{CheckpointStore, ErrorArtifacts, FingerprintStore, StateLayout};
use crate::wait::sleep_unless_cancelled;

/// The orchestration engine.
///
/// Owns all mutable loop data: the cursor (phase, iteration, retry counters,
/// pending nudge) and the error bundle in flight. The checkpoint and
/// fingerprint stores are the only state that outlives it.
pub struct Engine<A, P>
where
    A: ResponseAgent,
    P: PipelineGateway,
{
    agent: Arc<A>,
    pipeline: Arc<P>,
    observer: Arc<dyn Observer>,
    checkpoints: CheckpointStore,
    fingerprints: FingerprintStore,
    artifacts: ErrorArtifacts,
    config: EngineConfig,
    cancel: CancellationToken,
    cursor: Cursor,
    /// Bundle read in ReadingErrorLogs, consumed by AttachingFiles
    bundle: Option<ErrorBundle>,
}

impl<A, P> Engine<A, P>
where
    A: ResponseAgent,
    P: PipelineGateway,
{
    /// Create an engine positioned at the last checkpoint in `layout`.
    ///
    /// Without a usable checkpoint the engine starts at the initial phase,
    /// iteration 0.
    pub fn new(
        agent: Arc<A>,
        pipeline: Arc<P>,
        observer: Arc<dyn Observer>,
        layout: &StateLayout,
        config: EngineConfig,
    ) -> Self {
        let checkpoints = layout.checkpoint_store();
        let cursor = match checkpoints.load() {
            Some(state) => {
                let resumed = state.normalized();
                if resumed.phase != state.phase {
                    info!(
                        "Checkpoint phase {} is not resumable, continuing from {}",
                        state.phase, resumed.phase
                    );
                }
                info!(
                    "Resuming at {} (iteration {}, checkpointed {})",
                    resumed.phase, resumed.iteration, state.updated_at
                );
                Cursor {
                    nudge: resumed.nudge,
                    ..Cursor::new(resumed.phase, resumed.iteration)
                }
            }
            None => {
                info!("No checkpoint found, starting fresh");
                Cursor::new(Phase::INITIAL, 0)
            }
        };

        Self {
            agent,
            pipeline,
            observer,
            checkpoints,
            fingerprints: layout.fingerprint_store(),
            artifacts: layout.artifacts(),
            config,
            cancel: CancellationToken::new(),
            cursor,
            bundle: None,
        }
    }

    /// Handle for stopping the loop at the next iteration boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Forget the checkpoint and the failure fingerprint and start over.
    ///
    /// This is the only operation that clears either record.
    pub fn reset(&mut self) -> Result<()> {
        self.checkpoints.clear()?;
        self.fingerprints.clear()?;
        self.cursor = Cursor::new(Phase::INITIAL, 0);
        self.bundle = None;
        info!("Engine reset: checkpoint and fingerprint cleared");
        Ok(())
    }

    /// Run the loop until the build passes, a ceiling is hit, or a stop is
    /// requested.
    ///
    /// Collaborator failures never surface here; they drive transitions.
    /// An `Err` means a storage fault or a broken transition invariant. The
    /// observer has already been sent a `Faulted` outcome when it returns.
    pub async fn run(&mut self) -> Result<LoopOutcome> {
        self.log_line(
            format!(
                "Loop starting at {} (iteration {})",
                self.cursor.phase, self.cursor.iteration
            ),
            false,
        );

        match self.drive().await {
            Ok(outcome) => {
                self.finish(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.finish(&LoopOutcome::Faulted {
                    phase: self.cursor.phase,
                    iteration: self.cursor.iteration,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn finish(&self, outcome: &LoopOutcome) {
        match outcome {
            LoopOutcome::Cancelled { .. } => self.log_line("Loop stopped by request", false),
            LoopOutcome::Faulted { .. } => self.log_line(format!("Loop aborted: {}", outcome), true),
            other => self.log_line(format!("Loop finished: {}", other), !other.is_success()),
        }
        self.observer.on_phase_change(self.cursor.iteration, Phase::Idle);
        self.observer.on_finished(outcome);
    }

    async fn drive(&mut self) -> Result<LoopOutcome> {
        self.persist()?;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(LoopOutcome::Cancelled {
                    phase: self.cursor.phase,
                    iteration: self.cursor.iteration,
                });
            }
            if let Some(outcome) = check_iteration_ceiling(&self.cursor, &self.config.policy) {
                return Ok(outcome);
            }

            let phase = self.cursor.phase;
            self.observer.on_phase_change(self.cursor.iteration, phase);

            let signal = self.execute(phase).await?;
            debug!("{} reported {}", phase, signal);

            match transition(self.cursor, signal, &self.config.policy)? {
                Step::Next(next) => {
                    if next.phase == Phase::TimeoutRecovery && phase != Phase::TimeoutRecovery {
                        self.log_line(format!("Escalating {} to timeout recovery", phase), true);
                    }
                    self.cursor = next;
                    self.persist()?;
                }
                Step::Finish(outcome) => return Ok(outcome),
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let state = LoopState::new(self.cursor.phase, self.cursor.iteration)
            .with_nudge(self.cursor.nudge);
        self.checkpoints.save(&state)
    }

    async fn execute(&mut self, phase: Phase) -> Result<Signal> {
        let signal = match phase {
            Phase::Idle => Signal::Done,
            Phase::WaitingForResponse => self.wait_for_response().await,
            Phase::ExtractingOutput => self.extract_output().await,
            Phase::TriggeringBuild => self.trigger_build().await,
            Phase::WaitingForBuild => self.wait_for_build().await,
            Phase::CheckingFreshness => self.check_freshness(),
            Phase::ReadingErrorLogs => self.read_error_logs()?,
            Phase::AttachingFiles => self.attach_files().await,
            Phase::SubmittingPrompt => self.submit_prompt().await,
            Phase::BuildSucceeded => {
                self.log_line("Build succeeded", false);
                Signal::Done
            }
            Phase::TimeoutRecovery => self.recover().await,
        };
        Ok(signal)
    }

    /// 1-based attempt number of the current phase
    fn attempt(&self) -> u32 {
        self.cursor.retries + 1
    }

    async fn wait_for_response(&mut self) -> Signal {
        let timeout = self.config.response_timeout;
        if self.agent.wait_for_stability(timeout).await {
            Signal::Done
        } else {
            self.log_line(
                format!("No stable response within {}s", timeout.as_secs()),
                true,
            );
            Signal::Failed
        }
    }

    async fn extract_output(&mut self) -> Signal {
        let mode = self.config.output_mode;
        if self.agent.materialize_output(mode).await {
            self.log_line(format!("Extracted output ({})", mode), false);
            Signal::Done
        } else {
            self.log_line(
                format!("Output extraction failed ({}, attempt {})", mode, self.attempt()),
                true,
            );
            Signal::Failed
        }
    }

    async fn trigger_build(&mut self) -> Signal {
        self.pipeline.clear_signal().await;
        self.pipeline.trigger().await;
        self.log_line("Build triggered", false);
        Signal::Done
    }

    async fn wait_for_build(&mut self) -> Signal {
        match self.pipeline.poll_outcome(self.config.build_timeout).await {
            BuildOutcome::Success => {
                self.log_line("Build passed", false);
                Signal::BuildPassed
            }
            BuildOutcome::Failure => {
                self.log_line("Build failed", true);
                Signal::BuildFailed
            }
            BuildOutcome::Timeout => {
                self.log_line(
                    format!(
                        "Build reported no outcome within {}s",
                        self.config.build_timeout.as_secs()
                    ),
                    true,
                );
                Signal::BuildTimedOut
            }
        }
    }

    /// Unreadable or missing reports count as new; ReadingErrorLogs then
    /// escalates.
    fn check_freshness(&mut self) -> Signal {
        match self.artifacts.current_fingerprint(self.cursor.iteration) {
            Ok(None) => {
                warn!("Failure summary not present yet, treating the failure as new");
                Signal::NewFailure
            }
            Ok(Some(current)) if self.fingerprints.has_new_failure(&current) => {
                self.log_line("New failure report", false);
                Signal::NewFailure
            }
            Ok(Some(_)) => {
                self.log_line("Failure unchanged since the last report, nudging", false);
                Signal::StaleFailure
            }
            Err(e) => {
                self.log_line(format!("Failure summary unreadable: {}", e), true);
                Signal::NewFailure
            }
        }
    }

    fn read_error_logs(&mut self) -> Result<Signal> {
        let loaded = match self.artifacts.load(self.cursor.iteration) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.log_line(format!("Error artifacts unreadable: {}", e), true);
                return Ok(Signal::Failed);
            }
        };

        match loaded {
            Some(loaded) => {
                // Record before anything else: the next build may overwrite
                // the artifacts with a report carrying the same cause.
                self.fingerprints.save(&loaded.fingerprint)?;
                debug!(
                    "Recorded fingerprint {} observed at {}",
                    loaded.fingerprint.content_hash, loaded.fingerprint.observed_at
                );
                self.bundle = Some(loaded.bundle);
                Ok(Signal::Done)
            }
            None => {
                self.log_line("Build failed but its error artifacts are missing", true);
                Ok(Signal::Failed)
            }
        }
    }

    async fn attach_files(&mut self) -> Signal {
        let Some(bundle) = self.bundle.as_ref() else {
            self.log_line("No error bundle loaded to attach", true);
            return Signal::Failed;
        };

        let files_report = self.artifacts.files_report_path();
        let summary_report = self.artifacts.summary_report_path();
        let prompt = match render_corrective(
            &self.config.corrective_prompt,
            bundle,
            files_report,
            summary_report,
            self.cursor.iteration.saturating_add(1),
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.log_line(e.to_string(), true);
                return Signal::Failed;
            }
        };

        for path in [files_report, summary_report] {
            if !self.agent.attach_file(path).await {
                self.log_line(
                    format!("Failed to attach {} (attempt {})", display_name(path), self.attempt()),
                    true,
                );
                return Signal::Failed;
            }
        }

        if !self.agent.fill_prompt(&prompt).await {
            self.log_line(
                format!("Failed to fill corrective prompt (attempt {})", self.attempt()),
                true,
            );
            return Signal::Failed;
        }

        self.log_line("Attached error logs", false);
        Signal::Done
    }

    async fn submit_prompt(&mut self) -> Signal {
        if self.cursor.nudge && !self.agent.fill_prompt(&self.config.nudge_prompt).await {
            self.log_line(
                format!("Failed to fill nudge prompt (attempt {})", self.attempt()),
                true,
            );
            return Signal::Failed;
        }

        if !self.agent.submit().await {
            self.log_line(
                format!("Prompt submission failed (attempt {})", self.attempt()),
                true,
            );
            return Signal::Failed;
        }

        self.bundle = None;
        self.log_line(
            format!("Prompt submitted (iteration {})", self.cursor.iteration),
            false,
        );
        Signal::Done
    }

    async fn recover(&mut self) -> Signal {
        let policy = &self.config.policy;
        let recoveries = self.cursor.recoveries;

        if policy.recovery_exhausted(recoveries) {
            self.log_line(
                format!("Giving up after {} timeout recoveries", recoveries),
                true,
            );
            return Signal::RecoveryExhausted;
        }

        let delay = policy.backoff_delay(recoveries);
        tracing::warn!(
            attempt = recoveries + 1,
            max = policy.max_recoveries,
            delay_ms = delay.as_millis() as u64,
            "Backing off before waiting for a response again"
        );
        self.log_line(
            format!(
                "Recovery {}/{}: retrying in {:.1}s",
                recoveries + 1,
                policy.max_recoveries,
                delay.as_secs_f64()
            ),
            false,
        );

        if !sleep_unless_cancelled(delay, &self.cancel).await {
            debug!("Backoff cut short by stop request");
        }
        Signal::BackoffElapsed
    }

    fn log_line(&self, message: impl AsRef<str>, is_error: bool) {
        let message = message.as_ref();
        if is_error {
            warn!("{}", message);
        } else {
            info!("{}", message);
        }
        self.observer.on_log_line(message, is_error);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
