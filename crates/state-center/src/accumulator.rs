use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use stepwise_core_types::SurfaceSnapshot;
use tracing::{debug, warn};

use crate::checkpoint::{Checkpoint, CHECKPOINT_FILE};
use crate::error::StateError;
use crate::page_state::{classify, SemanticPageState};
use crate::store::{ExtractedData, ExtractedDataStore};

#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// Checkpoints kept in memory (and on disk); oldest pruned first.
    pub checkpoint_retention: usize,
    /// Classified page states kept.
    pub page_state_history: usize,
    /// When set, checkpoints are mirrored to `<dir>/<run_id>/checkpoints.json`.
    pub persist_dir: Option<PathBuf>,
    pub run_id: String,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            checkpoint_retention: 5,
            page_state_history: 10,
            persist_dir: None,
            run_id: "run".to_string(),
        }
    }
}

impl AccumulatorConfig {
    pub fn with_persistence(mut self, dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        self.persist_dir = Some(dir.into());
        self.run_id = run_id.into();
        self
    }
}

/// Replan-surviving state for a single workflow run.
#[derive(Debug)]
pub struct StateAccumulator {
    config: AccumulatorConfig,
    store: ExtractedDataStore,
    page_states: VecDeque<SemanticPageState>,
    checkpoints: VecDeque<Checkpoint>,
    next_sequence: u64,
}

impl Default for StateAccumulator {
    fn default() -> Self {
        Self::new(AccumulatorConfig::default())
    }
}

impl StateAccumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self {
            config,
            store: ExtractedDataStore::new(),
            page_states: VecDeque::new(),
            checkpoints: VecDeque::new(),
            next_sequence: 0,
        }
    }

    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    /// Write defined, non-empty values into the persistent layer. Idempotent.
    pub fn merge_extracted_data<I, K, V>(&mut self, data: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let changed = self.store.merge(data);
        if changed > 0 {
            debug!(changed, total = self.store.persistent().len(), "merged extracted data");
        }
        changed
    }

    pub fn set_volatile(&mut self, key: impl Into<String>, value: impl Into<Option<String>>) -> bool {
        self.store.set_volatile(key, value)
    }

    /// Start a new attempt: anything volatile from the previous attempt is dropped.
    pub fn begin_attempt(&mut self) {
        self.store.clear_volatile();
    }

    pub fn commit_volatile(&mut self) -> usize {
        self.store.commit_volatile()
    }

    pub fn volatile_data(&self) -> &ExtractedData {
        self.store.volatile()
    }

    pub fn all_extracted_data(&self) -> ExtractedData {
        self.store.all()
    }

    pub fn store(&self) -> &ExtractedDataStore {
        &self.store
    }

    /// Classify `snapshot` and keep it in the bounded history.
    pub fn record_page_state(&mut self, snapshot: &SurfaceSnapshot) -> &SemanticPageState {
        let state = classify(snapshot);
        debug!(url = %state.url, signature = %state.signature(), "recorded page state");
        self.page_states.push_back(state);
        while self.page_states.len() > self.config.page_state_history.max(1) {
            self.page_states.pop_front();
        }
        &self.page_states[self.page_states.len() - 1]
    }

    pub fn current_page_state(&self) -> Option<&SemanticPageState> {
        self.page_states.back()
    }

    pub fn page_history(&self) -> impl Iterator<Item = &SemanticPageState> {
        self.page_states.iter()
    }

    /// Snapshot the current page state and all accumulated data under `name`.
    pub fn create_checkpoint(&mut self, name: impl Into<String>) -> &Checkpoint {
        let checkpoint = Checkpoint {
            name: name.into(),
            sequence: self.next_sequence,
            created_at: Utc::now(),
            page_state: self.page_states.back().cloned(),
            data: self.store.all(),
        };
        self.next_sequence += 1;
        debug!(checkpoint = %checkpoint.name, keys = checkpoint.data.len(), "created checkpoint");

        self.checkpoints.push_back(checkpoint);
        while self.checkpoints.len() > self.config.checkpoint_retention.max(1) {
            if let Some(pruned) = self.checkpoints.pop_front() {
                debug!(checkpoint = %pruned.name, "pruned checkpoint");
            }
        }

        if let Err(err) = self.persist_checkpoints() {
            warn!(error = %err, "checkpoint persist failed");
        }
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn checkpoint(&self, name: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().rev().find(|checkpoint| checkpoint.name == name)
    }

    pub fn checkpoint_names(&self) -> Vec<String> {
        self.checkpoints.iter().map(|checkpoint| checkpoint.name.clone()).collect()
    }

    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        self.config
            .persist_dir
            .as_ref()
            .map(|dir| dir.join(&self.config.run_id).join(CHECKPOINT_FILE))
    }

    /// Write retained checkpoints to disk. No-op without a persistence directory.
    pub fn persist_checkpoints(&self) -> Result<(), StateError> {
        let Some(path) = self.checkpoint_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.checkpoints)?;
        fs::write(&path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stepwise_core_types::ElementInfo;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn begin_attempt_drops_volatile_only() {
        let mut acc = StateAccumulator::default();
        acc.merge_extracted_data(data(&[("title", "X")]));
        acc.set_volatile("price", "$5".to_string());

        acc.begin_attempt();

        assert_eq!(acc.all_extracted_data(), data(&[("title", "X")]));
    }

    #[test]
    fn checkpoints_are_capped() {
        let mut acc = StateAccumulator::new(AccumulatorConfig {
            checkpoint_retention: 2,
            ..AccumulatorConfig::default()
        });
        for name in ["a", "b", "c"] {
            acc.create_checkpoint(name);
        }
        assert_eq!(acc.checkpoint_names(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(acc.checkpoint("c").map(|c| c.sequence), Some(2));
        assert!(acc.checkpoint("a").is_none());
    }

    #[test]
    fn checkpoint_captures_latest_page_state_and_data() {
        let mut acc = StateAccumulator::default();
        acc.merge_extracted_data(data(&[("title", "X")]));
        acc.record_page_state(&SurfaceSnapshot::new(
            "https://a.test",
            None,
            vec![ElementInfo::new(0, "a").with_text("Home")],
        ));

        let checkpoint = acc.create_checkpoint("after-step-1").clone();

        assert_eq!(checkpoint.data, data(&[("title", "X")]));
        assert_eq!(checkpoint.page_state.unwrap().url, "https://a.test");
    }

    #[test]
    fn page_history_is_bounded() {
        let mut acc = StateAccumulator::new(AccumulatorConfig {
            page_state_history: 3,
            ..AccumulatorConfig::default()
        });
        for i in 0..5 {
            acc.record_page_state(&SurfaceSnapshot::new(format!("https://p{i}.test"), None, vec![]));
        }
        let urls: Vec<_> = acc.page_history().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://p2.test", "https://p3.test", "https://p4.test"]);
        assert_eq!(acc.current_page_state().unwrap().url, "https://p4.test");
    }
}
