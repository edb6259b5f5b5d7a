//! Shell-command backed collaborators.
//!
//! Each agent capability is a `sh -c` command; success means exit status 0.
//! Arguments reach the command through environment variables:
//!
//! - `FIXLOOP_TIMEOUT_MS` for `wait_for_stability`
//! - `FIXLOOP_OUTPUT_MODE` for `materialize_output`
//! - `FIXLOOP_PROMPT` for `fill_prompt`
//! - `FIXLOOP_ATTACHMENT` for `attach_file`
//!
//! The pipeline runs a trigger command and then watches a completion signal
//! file that the CI side writes `success` or `failure` into.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::{PipelineGateway, ResponseAgent};
use crate::domain::{BuildOutcome, OutputMode};
use crate::wait::poll_until;

/// Commands implementing the chat-surface capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCommands {
    pub wait_for_stability: String,
    pub materialize_output: String,
    pub fill_prompt: String,
    pub attach_file: String,
    pub submit: String,
    /// Directory the commands run in (defaults to the current directory)
    pub workdir: Option<PathBuf>,
    /// Timeout for every command except `wait_for_stability`
    pub command_timeout_ms: u64,
}

impl Default for AgentCommands {
    fn default() -> Self {
        Self {
            wait_for_stability: String::new(),
            materialize_output: String::new(),
            fill_prompt: String::new(),
            attach_file: String::new(),
            submit: String::new(),
            workdir: None,
            command_timeout_ms: 60000,
        }
    }
}

/// Commands and polling cadence for the build pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineCommands {
    pub trigger_command: String,
    pub poll_interval_ms: u64,
    pub workdir: Option<PathBuf>,
    pub command_timeout_ms: u64,
}

impl Default for PipelineCommands {
    fn default() -> Self {
        Self {
            trigger_command: "git push".to_string(),
            poll_interval_ms: 5000,
            workdir: None,
            command_timeout_ms: 120000,
        }
    }
}

/// Run `command` under `sh -c`, true iff it exits 0 within `timeout`
async fn run_command(
    name: &str,
    command: &str,
    workdir: Option<&Path>,
    env: &[(&str, String)],
    timeout: Duration,
) -> bool {
    if command.trim().is_empty() {
        warn!("No command configured for {}", name);
        return false;
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("{}: failed to spawn '{}': {}", name, command, e);
            return false;
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => {
            debug!("{}: ok", name);
            true
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "{}: exit code {:?}: {}",
                name,
                output.status.code(),
                stderr.trim()
            );
            false
        }
        Ok(Err(e)) => {
            warn!("{}: {}", name, e);
            false
        }
        Err(_) => {
            warn!("{}: timed out after {}ms", name, timeout.as_millis());
            false
        }
    }
}

/// Chat-surface automation driven by shell commands
pub struct CommandResponseAgent {
    commands: AgentCommands,
}

impl CommandResponseAgent {
    pub fn new(commands: AgentCommands) -> Self {
        Self { commands }
    }

    async fn run(&self, name: &str, command: &str, env: &[(&str, String)], timeout: Duration) -> bool {
        run_command(name, command, self.commands.workdir.as_deref(), env, timeout).await
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.commands.command_timeout_ms)
    }
}

#[async_trait]
impl ResponseAgent for CommandResponseAgent {
    async fn wait_for_stability(&self, timeout: Duration) -> bool {
        let env = [("FIXLOOP_TIMEOUT_MS", timeout.as_millis().to_string())];
        self.run(
            "wait_for_stability",
            &self.commands.wait_for_stability,
            &env,
            timeout,
        )
        .await
    }

    async fn materialize_output(&self, mode: OutputMode) -> bool {
        let env = [("FIXLOOP_OUTPUT_MODE", mode.to_string())];
        self.run(
            "materialize_output",
            &self.commands.materialize_output,
            &env,
            self.command_timeout(),
        )
        .await
    }

    async fn fill_prompt(&self, text: &str) -> bool {
        let env = [("FIXLOOP_PROMPT", text.to_string())];
        self.run(
            "fill_prompt",
            &self.commands.fill_prompt,
            &env,
            self.command_timeout(),
        )
        .await
    }

    async fn attach_file(&self, path: &Path) -> bool {
        let env = [("FIXLOOP_ATTACHMENT", path.display().to_string())];
        self.run(
            "attach_file",
            &self.commands.attach_file,
            &env,
            self.command_timeout(),
        )
        .await
    }

    async fn submit(&self) -> bool {
        self.run("submit", &self.commands.submit, &[], self.command_timeout())
            .await
    }
}

/// Build pipeline driven by a trigger command and a completion signal file
pub struct CommandPipeline {
    commands: PipelineCommands,
    signal_path: PathBuf,
}

impl CommandPipeline {
    pub fn new(commands: PipelineCommands, signal_path: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            signal_path: signal_path.into(),
        }
    }

    async fn read_signal(&self) -> Option<BuildOutcome> {
        let content = tokio::fs::read_to_string(&self.signal_path).await.ok()?;
        parse_signal(&content)
    }
}

/// Interpret the contents of a completion signal file
fn parse_signal(content: &str) -> Option<BuildOutcome> {
    match content.trim().to_ascii_lowercase().as_str() {
        "success" | "succeeded" | "passed" => Some(BuildOutcome::Success),
        "failure" | "failed" => Some(BuildOutcome::Failure),
        _ => None,
    }
}

#[async_trait]
impl PipelineGateway for CommandPipeline {
    async fn clear_signal(&self) {
        match tokio::fs::remove_file(&self.signal_path).await {
            Ok(()) => debug!("Cleared completion signal {}", self.signal_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to clear completion signal {}: {}",
                self.signal_path.display(),
                e
            ),
        }
    }

    async fn trigger(&self) {
        info!("Triggering build: {}", self.commands.trigger_command);
        let ok = run_command(
            "trigger",
            &self.commands.trigger_command,
            self.commands.workdir.as_deref(),
            &[],
            Duration::from_millis(self.commands.command_timeout_ms),
        )
        .await;
        if !ok {
            warn!("Trigger command failed; the build poll will time out");
        }
    }

    async fn poll_outcome(&self, timeout: Duration) -> BuildOutcome {
        let interval = Duration::from_millis(self.commands.poll_interval_ms.max(1));
        poll_until(timeout, interval, || self.read_signal())
            .await
            .unwrap_or(BuildOutcome::Timeout)
    }
}
