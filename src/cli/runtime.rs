use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{user_config_path, AppConfig};

const LOCAL_CONFIG: &str = "config/stepwise.yaml";

/// Install the global subscriber. `RUST_LOG` wins over `level`; logs go to stderr.
///
/// `level` is an `EnvFilter` directive string, e.g. `info` or `agent_core=debug,warn`.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(level, debug)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install log subscriber")?;
    }
    Ok(())
}

fn build_filter(level: &str, debug: bool) -> Result<EnvFilter> {
    let directives = if debug { "debug" } else { level };
    EnvFilter::try_new(directives).with_context(|| format!("Invalid log level '{directives}'"))
}

pub struct LoadedConfig {
    pub config: AppConfig,
    /// File the configuration came from, if one existed.
    pub path: Option<PathBuf>,
    /// Candidate file that was looked for but did not exist.
    pub missing: Option<PathBuf>,
}

/// Resolve and read the configuration, then apply environment overrides.
///
/// Priority: `--config` > ./config/stepwise.yaml > ~/.config/stepwise/config.yaml > defaults
pub async fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = PathBuf::from(LOCAL_CONFIG);
            if local.exists() {
                Some(local)
            } else {
                user_config_path()
            }
        }
    };

    let mut loaded = match candidate {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = AppConfig::from_yaml_str(&content, &path)?;
            LoadedConfig {
                config,
                path: Some(path),
                missing: None,
            }
        }
        Some(path) => LoadedConfig {
            config: AppConfig::default(),
            path: None,
            missing: Some(path),
        },
        None => LoadedConfig {
            config: AppConfig::default(),
            path: None,
            missing: None,
        },
    };

    loaded
        .config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_directives() {
        assert!(build_filter("info", false).is_ok());
        assert!(build_filter("agent_core=debug,warn", false).is_ok());
        assert!(build_filter("stepwise_cli=trace", false).is_ok());
        assert!(build_filter("stepwise_cli=loud", false).is_err());
        assert!(build_filter("stepwise_cli=loud", true).is_ok());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn missing_config_is_reported_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let loaded = load_config(Some(&path)).await.unwrap();

        assert_eq!(loaded.missing.as_deref(), Some(path.as_path()));
        assert!(loaded.path.is_none());
    }
}
