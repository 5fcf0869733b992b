//! Error handling for configuration and scenario loading

use std::path::PathBuf;

use action_primitives::DriverError;
use thiserror::Error;

/// Failures raised before a workflow starts.
#[derive(Debug, Error)]
pub enum StepwiseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An environment override that does not parse.
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid scenario: {0}")]
    Scenario(String),

    #[error("scenario surface: {0}")]
    Surface(#[from] DriverError),
}

impl StepwiseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }
}
