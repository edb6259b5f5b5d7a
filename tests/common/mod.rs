//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fixloop::domain::{BuildOutcome, LoopOutcome, OutputMode, Phase};
use fixloop::engine::{Engine, EngineConfig, RetryPolicy};
use fixloop::gateway::{PipelineGateway, ResponseAgent};
use fixloop::observer::Observer;
use fixloop::storage::{CheckpointStore, StateLayout};

/// One call made against the chat surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Wait,
    Materialize(OutputMode),
    Fill(String),
    Attach(PathBuf),
    Submit,
}

/// Chat surface that succeeds unless told otherwise and records every call
#[derive(Default)]
pub struct ScriptedAgent {
    calls: Mutex<Vec<AgentCall>>,
    /// Remaining failures per capability; `u32::MAX` fails forever
    failures: Mutex<HashMap<&'static str, u32>>,
    /// File whose existence is sampled on each attach
    attach_sample_path: Option<PathBuf>,
    attach_samples: Mutex<Vec<bool>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `capability` for its next `times` calls
    pub fn failing(mut self, capability: &'static str, times: u32) -> Self {
        self.failures.get_mut().unwrap().insert(capability, times);
        self
    }

    pub fn sampling_on_attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attach_sample_path = Some(path.into());
        self
    }

    fn respond(&self, capability: &'static str, call: AgentCall) -> bool {
        self.calls.lock().unwrap().push(call);
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(capability) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                false
            }
            _ => true,
        }
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&AgentCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn fills(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AgentCall::Fill(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn attach_samples(&self) -> Vec<bool> {
        self.attach_samples.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseAgent for ScriptedAgent {
    async fn wait_for_stability(&self, _timeout: Duration) -> bool {
        self.respond("wait_for_stability", AgentCall::Wait)
    }

    async fn materialize_output(&self, mode: OutputMode) -> bool {
        self.respond("materialize_output", AgentCall::Materialize(mode))
    }

    async fn fill_prompt(&self, text: &str) -> bool {
        self.respond("fill_prompt", AgentCall::Fill(text.to_string()))
    }

    async fn attach_file(&self, path: &Path) -> bool {
        if let Some(sample) = &self.attach_sample_path {
            self.attach_samples.lock().unwrap().push(sample.exists());
        }
        self.respond("attach_file", AgentCall::Attach(path.to_path_buf()))
    }

    async fn submit(&self) -> bool {
        self.respond("submit", AgentCall::Submit)
    }
}

/// What the next triggered build does
#[derive(Debug, Clone, Copy)]
pub enum BuildStep {
    Pass,
    /// Fail, leaving a summary with this text. Identical text is not
    /// rewritten, so the report keeps its modification time.
    Fail(&'static str),
    FailWithoutArtifacts,
    /// Never report an outcome
    Hang,
}

/// Pipeline that plays back a list of build results into a state directory
pub struct ScriptedPipeline {
    layout: StateLayout,
    steps: Mutex<VecDeque<BuildStep>>,
    current: Mutex<BuildOutcome>,
    triggers: AtomicU32,
    clears: AtomicU32,
}

impl ScriptedPipeline {
    pub fn new(layout: &StateLayout, steps: impl IntoIterator<Item = BuildStep>) -> Self {
        Self {
            layout: layout.clone(),
            steps: Mutex::new(steps.into_iter().collect()),
            current: Mutex::new(BuildOutcome::Timeout),
            triggers: AtomicU32::new(0),
            clears: AtomicU32::new(0),
        }
    }

    pub fn triggers(&self) -> u32 {
        self.triggers.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> u32 {
        self.clears.load(Ordering::SeqCst)
    }
}

/// Leave a failure report in the state directory, skipping identical rewrites
pub fn write_failure(layout: &StateLayout, summary: &str) {
    let summary_path = layout.summary_report_path();
    if fs::read_to_string(&summary_path).ok().as_deref() == Some(summary) {
        return;
    }
    fs::create_dir_all(layout.artifacts_dir()).unwrap();
    fs::write(layout.files_report_path(), format!("src/main.rs: {}", summary)).unwrap();
    fs::write(&summary_path, summary).unwrap();
}

#[async_trait]
impl PipelineGateway for ScriptedPipeline {
    async fn clear_signal(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = BuildOutcome::Timeout;
    }

    async fn trigger(&self) {
        self.triggers.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BuildStep::Hang);
        let outcome = match step {
            BuildStep::Pass => BuildOutcome::Success,
            BuildStep::Fail(summary) => {
                write_failure(&self.layout, summary);
                BuildOutcome::Failure
            }
            BuildStep::FailWithoutArtifacts => {
                let _ = fs::remove_dir_all(self.layout.artifacts_dir());
                BuildOutcome::Failure
            }
            BuildStep::Hang => BuildOutcome::Timeout,
        };
        *self.current.lock().unwrap() = outcome;
    }

    async fn poll_outcome(&self, _timeout: Duration) -> BuildOutcome {
        *self.current.lock().unwrap()
    }
}

/// Observer that checks the checkpoint on disk whenever a phase starts
pub struct CheckpointWatcher {
    store: CheckpointStore,
    entries: Mutex<Vec<(u32, Phase)>>,
    submit_nudges: Mutex<Vec<bool>>,
    mismatches: Mutex<Vec<(Phase, Option<Phase>)>>,
    finished: Mutex<Vec<LoopOutcome>>,
    error_lines: AtomicU32,
}

impl CheckpointWatcher {
    pub fn new(layout: &StateLayout) -> Self {
        Self {
            store: layout.checkpoint_store(),
            entries: Mutex::new(Vec::new()),
            submit_nudges: Mutex::new(Vec::new()),
            mismatches: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            error_lines: AtomicU32::new(0),
        }
    }

    /// Phases entered, in order, excluding the final Idle notification
    pub fn phases(&self) -> Vec<Phase> {
        self.entries().into_iter().map(|(_, phase)| phase).collect()
    }

    /// `(iteration, phase)` for every phase entered
    pub fn entries(&self) -> Vec<(u32, Phase)> {
        self.entries.lock().unwrap().clone()
    }

    /// Checkpointed nudge flag each time SubmittingPrompt starts
    pub fn submit_nudges(&self) -> Vec<bool> {
        self.submit_nudges.lock().unwrap().clone()
    }

    /// Phases whose action started without a matching checkpoint
    pub fn mismatches(&self) -> Vec<(Phase, Option<Phase>)> {
        self.mismatches.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<LoopOutcome> {
        self.finished.lock().unwrap().clone()
    }

    pub fn error_lines(&self) -> u32 {
        self.error_lines.load(Ordering::SeqCst)
    }
}

impl Observer for CheckpointWatcher {
    fn on_phase_change(&self, iteration: u32, phase: Phase) {
        if phase == Phase::Idle {
            return;
        }
        let stored = self.store.load();
        let stored_phase = stored.as_ref().map(|s| s.phase);
        if stored_phase != Some(phase) {
            self.mismatches.lock().unwrap().push((phase, stored_phase));
        }
        if phase == Phase::SubmittingPrompt {
            let nudge = stored.is_some_and(|s| s.nudge);
            self.submit_nudges.lock().unwrap().push(nudge);
        }
        self.entries.lock().unwrap().push((iteration, phase));
    }

    fn on_log_line(&self, _message: &str, is_error: bool) {
        if is_error {
            self.error_lines.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_finished(&self, outcome: &LoopOutcome) {
        self.finished.lock().unwrap().push(outcome.clone());
    }
}

/// Engine settings with every wait shortened for tests
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        policy: RetryPolicy {
            backoff_base: Duration::from_millis(1),
            backoff_cap_exponent: 2,
            ..Default::default()
        },
        response_timeout: Duration::from_millis(10),
        build_timeout: Duration::from_millis(10),
        ..Default::default()
    }
}

pub struct Harness {
    pub layout: StateLayout,
    pub agent: Arc<ScriptedAgent>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub watcher: Arc<CheckpointWatcher>,
}

impl Harness {
    pub fn new(state_dir: &Path, agent: ScriptedAgent, steps: impl IntoIterator<Item = BuildStep>) -> Self {
        let layout = StateLayout::new(state_dir);
        Self {
            pipeline: Arc::new(ScriptedPipeline::new(&layout, steps)),
            watcher: Arc::new(CheckpointWatcher::new(&layout)),
            agent: Arc::new(agent),
            layout,
        }
    }

    pub fn engine(&self, config: EngineConfig) -> Engine<ScriptedAgent, ScriptedPipeline> {
        Engine::new(
            self.agent.clone(),
            self.pipeline.clone(),
            self.watcher.clone(),
            &self.layout,
            config,
        )
    }
}
