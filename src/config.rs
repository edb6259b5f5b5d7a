use eyre::{Context, Result};
use fixloop::domain::OutputMode;
use fixloop::engine::{DEFAULT_CORRECTIVE_PROMPT, DEFAULT_NUDGE_PROMPT, EngineConfig, RetryPolicy};
use fixloop::gateway::{AgentCommands, PipelineCommands};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub engine: EngineSection,
    pub storage: StorageConfig,
    pub agent: AgentCommands,
    pub pipeline: PipelineCommands,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_retries_per_state: u32,
    pub max_recoveries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_exponent: u32,
    pub max_iterations: u32,
    pub output_mode: OutputMode,
    pub response_timeout_ms: u64,
    pub build_timeout_ms: u64,
    pub nudge_prompt: String,
    pub corrective_prompt: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_retries_per_state: 3,
            max_recoveries: 5,
            backoff_base_ms: 2000,
            backoff_cap_exponent: 5,
            max_iterations: 10,
            output_mode: OutputMode::default(),
            response_timeout_ms: 300000,
            build_timeout_ms: 1200000,
            nudge_prompt: DEFAULT_NUDGE_PROMPT.to_string(),
            corrective_prompt: DEFAULT_CORRECTIVE_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("fixloop")
                .join("state"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            engine: EngineSection::default(),
            storage: StorageConfig::default(),
            agent: AgentCommands::default(),
            pipeline: PipelineCommands::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Engine settings in the form the library consumes
    pub fn engine_config(&self) -> EngineConfig {
        let engine = &self.engine;
        EngineConfig {
            policy: RetryPolicy {
                max_retries_per_state: engine.max_retries_per_state,
                max_recoveries: engine.max_recoveries,
                backoff_base: Duration::from_millis(engine.backoff_base_ms),
                backoff_cap_exponent: engine.backoff_cap_exponent,
                max_iterations: engine.max_iterations,
            },
            output_mode: engine.output_mode,
            response_timeout: Duration::from_millis(engine.response_timeout_ms),
            build_timeout: Duration::from_millis(engine.build_timeout_ms),
            nudge_prompt: engine.nudge_prompt.clone(),
            corrective_prompt: engine.corrective_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::default().engine_config();
        let expected = EngineConfig::default();

        assert_eq!(config.policy, expected.policy);
        assert_eq!(config.output_mode, expected.output_mode);
        assert_eq!(config.response_timeout, expected.response_timeout);
        assert_eq!(config.build_timeout, expected.build_timeout);
        assert_eq!(config.nudge_prompt, expected.nudge_prompt);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fixloop.yml");
        fs::write(
            &path,
            "engine:\n  max_iterations: 4\n  output_mode: plain_text\nstorage:\n  state_dir: /tmp/fixloop-state\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.engine.max_iterations, 4);
        assert_eq!(config.engine.output_mode, OutputMode::PlainText);
        assert_eq!(config.engine.max_recoveries, 5);
        assert_eq!(config.storage.state_dir, PathBuf::from("/tmp/fixloop-state"));
        assert_eq!(config.pipeline.trigger_command, "git push");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let path = PathBuf::from("/nonexistent/fixloop.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_engine_config_conversion() {
        let mut config = Config::default();
        config.engine.backoff_base_ms = 250;
        config.engine.build_timeout_ms = 1500;

        let engine = config.engine_config();

        assert_eq!(engine.policy.backoff_base, Duration::from_millis(250));
        assert_eq!(engine.build_timeout, Duration::from_millis(1500));
    }
}
