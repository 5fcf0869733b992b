use std::collections::{BTreeMap, BTreeSet};

use stepwise_core_types::StepId;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::lane::{OrderedLane, PriorityLane};
use crate::model::{QueueStats, QueuedTask};

/// Dependency-aware two-lane queue owned by a single workflow run.
#[derive(Debug)]
pub struct TaskQueue<T> {
    priority_lane: PriorityLane<T>,
    normal_lane: OrderedLane<T>,
    completed: BTreeSet<StepId>,
    failed: BTreeMap<StepId, String>,
    next_seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            priority_lane: PriorityLane::default(),
            normal_lane: OrderedLane::default(),
            completed: BTreeSet::new(),
            failed: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert into the normal lane.
    pub fn enqueue(&mut self, task: QueuedTask<T>) -> Result<(), SchedulerError> {
        let task = self.admit(task)?;
        debug!(task = %task.id, priority = task.priority, deps = task.dependencies.len(), "enqueued");
        self.normal_lane.push(task);
        Ok(())
    }

    /// Insert into the fast-track lane, scanned before the normal lane.
    pub fn enqueue_priority(&mut self, task: QueuedTask<T>) -> Result<(), SchedulerError> {
        let task = self.admit(task)?;
        debug!(task = %task.id, deps = task.dependencies.len(), "enqueued (priority lane)");
        self.priority_lane.push(task);
        Ok(())
    }

    fn admit(&mut self, mut task: QueuedTask<T>) -> Result<QueuedTask<T>, SchedulerError> {
        if self.contains(&task.id) {
            return Err(SchedulerError::DuplicateTask(task.id));
        }
        if task.dependencies.contains(&task.id) {
            return Err(SchedulerError::SelfDependency(task.id));
        }
        task.seq = self.next_seq;
        self.next_seq += 1;
        Ok(task)
    }

    /// Remove and return the first ready task, priority lane first.
    ///
    /// `None` does not mean the queue is empty: pending tasks may all be blocked.
    pub fn dequeue(&mut self) -> Option<QueuedTask<T>> {
        let completed = &self.completed;
        let ready = |task: &QueuedTask<T>| {
            task.dependencies
                .iter()
                .all(|dependency| completed.contains(dependency))
        };
        self.priority_lane
            .take_first(ready)
            .or_else(|| self.normal_lane.take_first(ready))
    }

    pub fn are_dependencies_met(&self, task: &QueuedTask<T>) -> bool {
        task.dependencies
            .iter()
            .all(|dependency| self.completed.contains(dependency))
    }

    /// Dependency ids of `task` that have not completed, in declaration order.
    pub fn unmet_dependencies(&self, task: &QueuedTask<T>) -> Vec<StepId> {
        task.dependencies
            .iter()
            .filter(|dependency| !self.completed.contains(*dependency))
            .cloned()
            .collect()
    }

    /// Pending tasks whose dependencies are met, in dispatch order.
    pub fn ready_tasks(&self) -> Vec<&QueuedTask<T>> {
        self.pending()
            .filter(|task| self.are_dependencies_met(task))
            .collect()
    }

    /// Pending tasks waiting on at least one dependency.
    pub fn blocked_tasks(&self) -> Vec<&QueuedTask<T>> {
        self.pending()
            .filter(|task| !self.are_dependencies_met(task))
            .collect()
    }

    /// All pending tasks, in dispatch order.
    pub fn pending(&self) -> impl Iterator<Item = &QueuedTask<T>> {
        self.priority_lane.iter().chain(self.normal_lane.iter())
    }

    pub fn mark_completed(&mut self, id: impl Into<StepId>) {
        let id = id.into();
        debug!(task = %id, "marked completed");
        self.completed.insert(id);
    }

    pub fn mark_failed(&mut self, id: impl Into<StepId>, reason: impl Into<String>) {
        let id = id.into();
        let reason = reason.into();
        warn!(task = %id, reason = %reason, "marked failed");
        self.failed.insert(id, reason);
    }

    pub fn is_completed(&self, id: &StepId) -> bool {
        self.completed.contains(id)
    }

    pub fn failure_reason(&self, id: &StepId) -> Option<&str> {
        self.failed.get(id).map(String::as_str)
    }

    pub fn completed(&self) -> impl Iterator<Item = &StepId> {
        self.completed.iter()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&StepId, &str)> {
        self.failed.iter().map(|(id, reason)| (id, reason.as_str()))
    }

    /// Whether `id` is pending in either lane.
    pub fn contains(&self, id: &StepId) -> bool {
        self.priority_lane.contains(id) || self.normal_lane.contains(id)
    }

    /// Drop every pending task, returning them in dispatch order.
    pub fn clear_pending(&mut self) -> Vec<QueuedTask<T>> {
        let mut removed = self.priority_lane.drain();
        removed.extend(self.normal_lane.drain());
        if !removed.is_empty() {
            debug!(removed = removed.len(), "cleared pending tasks");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.priority_lane.len() + self.normal_lane.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority_lane.is_empty() && self.normal_lane.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let ready = self.ready_tasks().len();
        QueueStats {
            pending: self.len(),
            ready,
            blocked: self.len() - ready,
            completed: self.completed.len(),
            failed: self.failed.len(),
        }
    }
}
