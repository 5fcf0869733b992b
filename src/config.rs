//! Application configuration
//!
//! Loaded from YAML, then adjusted by `STEPWISE_*` environment variables and finally
//! by command line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use action_primitives::ExecutorConfig;
use agent_core::WorkflowConfig;
use serde::{Deserialize, Serialize};

use crate::errors::StepwiseError;

pub const ENV_MAX_REPLANS_PER_STEP: &str = "STEPWISE_MAX_REPLANS_PER_STEP";
pub const ENV_MAX_TOTAL_REPLANS: &str = "STEPWISE_MAX_TOTAL_REPLANS";
pub const ENV_DISABLE_DEGRADATION: &str = "STEPWISE_DISABLE_DEGRADATION";
pub const ENV_LOG_LEVEL: &str = "STEPWISE_LOG_LEVEL";
pub const ENV_CHECKPOINT_DIR: &str = "STEPWISE_CHECKPOINT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default: "info"
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub workflow: WorkflowConfig,
    pub executor: ExecutorConfig,
    /// Mirror checkpoints under this directory; wins over `workflow.checkpoint_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self, StepwiseError> {
        serde_yaml::from_str(content).map_err(|err| StepwiseError::yaml(origin, err))
    }

    pub fn load(path: &Path) -> Result<Self, StepwiseError> {
        let content = fs::read_to_string(path).map_err(|err| StepwiseError::io(path, err))?;
        Self::from_yaml_str(&content, path)
    }

    /// Apply `STEPWISE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), StepwiseError> {
        if let Some(value) = env_value(ENV_MAX_REPLANS_PER_STEP) {
            self.workflow.max_replans_per_step = parse_env(ENV_MAX_REPLANS_PER_STEP, &value)?;
        }
        if let Some(value) = env_value(ENV_MAX_TOTAL_REPLANS) {
            self.workflow.max_total_replans = parse_env(ENV_MAX_TOTAL_REPLANS, &value)?;
        }
        if let Some(value) = env_value(ENV_DISABLE_DEGRADATION) {
            self.workflow.enable_degradation = !parse_flag(ENV_DISABLE_DEGRADATION, &value)?;
        }
        if let Some(value) = env_value(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        if let Some(value) = env_value(ENV_CHECKPOINT_DIR) {
            self.checkpoint_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Workflow settings with the top-level checkpoint directory folded in.
    pub fn effective_workflow(&self) -> WorkflowConfig {
        let mut workflow = self.workflow.clone();
        if let Some(dir) = &self.checkpoint_dir {
            workflow.checkpoint_dir = Some(dir.clone());
        }
        workflow
    }
}

/// `~/.config/stepwise/config.yaml` (platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stepwise").join("config.yaml"))
}

fn env_value(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, StepwiseError> {
    value.parse().map_err(|_| StepwiseError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(var: &str, value: &str) -> Result<bool, StepwiseError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StepwiseError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            ENV_MAX_REPLANS_PER_STEP,
            ENV_MAX_TOTAL_REPLANS,
            ENV_DISABLE_DEGRADATION,
            ENV_LOG_LEVEL,
            ENV_CHECKPOINT_DIR,
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            "workflow:\n  max_total_replans: 4\nlogging:\n  json: true\n",
            Path::new("inline"),
        )
        .unwrap();
        assert_eq!(config.workflow.max_total_replans, 4);
        assert_eq!(config.workflow.max_replans_per_step, 3);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.executor.settle_delay_ms, 250);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwise.yaml");
        fs::write(&path, "executor:\n  settle_delay_ms: 0\ncheckpoint_dir: /tmp/cp\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.executor.settle_delay_ms, 0);
        assert_eq!(
            config.effective_workflow().checkpoint_dir,
            Some(PathBuf::from("/tmp/cp"))
        );
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let err = AppConfig::from_yaml_str("workflow: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        clear_env();
        env::set_var(ENV_MAX_REPLANS_PER_STEP, "1");
        env::set_var(ENV_DISABLE_DEGRADATION, "true");
        env::set_var(ENV_LOG_LEVEL, "debug");

        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();
        clear_env();

        assert_eq!(config.workflow.max_replans_per_step, 1);
        assert!(!config.workflow.enable_degradation);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn invalid_env_value_is_rejected() {
        clear_env();
        env::set_var(ENV_MAX_TOTAL_REPLANS, "many");

        let mut config = AppConfig::default();
        let err = config.apply_env_overrides().unwrap_err();
        clear_env();

        assert!(matches!(err, StepwiseError::InvalidEnv { .. }));
    }
}
