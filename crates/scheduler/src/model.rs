use stepwise_core_types::StepId;

/// A pending unit of work with its declared dependencies.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueuedTask<T> {
    pub id: StepId,
    /// Higher is more urgent.
    pub priority: i32,
    pub dependencies: Vec<StepId>,
    pub payload: T,
    /// Insertion order, assigned by the queue.
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) seq: u64,
}

impl<T> QueuedTask<T> {
    pub fn new(id: impl Into<StepId>, payload: T) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            dependencies: Vec::new(),
            payload,
            seq: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Normal-lane ordering key: priority desc, dependency count asc, insertion asc.
    pub(crate) fn order_key(&self) -> (std::cmp::Reverse<i32>, usize, u64) {
        (
            std::cmp::Reverse(self.priority),
            self.dependencies.len(),
            self.seq,
        )
    }
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueStats {
    pub pending: usize,
    pub ready: usize,
    pub blocked: usize,
    pub completed: usize,
    pub failed: usize,
}
