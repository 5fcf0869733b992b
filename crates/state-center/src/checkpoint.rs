use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::page_state::SemanticPageState;
use crate::store::ExtractedData;

pub const CHECKPOINT_FILE: &str = "checkpoints.json";

/// Named snapshot of accumulated data and the latest page state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    /// Monotonic within a run; survives pruning.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub page_state: Option<SemanticPageState>,
    pub data: ExtractedData,
}

/// Read checkpoints previously written for `run_id` under `dir`.
pub fn load_checkpoints(dir: &Path, run_id: &str) -> Result<Vec<Checkpoint>, StateError> {
    let path = dir.join(run_id).join(CHECKPOINT_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&bytes)?)
}
