use std::collections::VecDeque;

use stepwise_core_types::StepId;

use crate::model::QueuedTask;

/// Fast-track lane: plain FIFO.
#[derive(Debug)]
pub struct PriorityLane<T> {
    tasks: VecDeque<QueuedTask<T>>,
}

impl<T> Default for PriorityLane<T> {
    fn default() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }
}

impl<T> PriorityLane<T> {
    pub fn push(&mut self, task: QueuedTask<T>) {
        self.tasks.push_back(task);
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedTask<T>> {
        self.tasks.iter()
    }

    /// Remove the first task matching `ready`.
    pub fn take_first(&mut self, mut ready: impl FnMut(&QueuedTask<T>) -> bool) -> Option<QueuedTask<T>> {
        let position = self.tasks.iter().position(|task| ready(task))?;
        self.tasks.remove(position)
    }

    pub fn contains(&self, id: &StepId) -> bool {
        self.tasks.iter().any(|task| &task.id == id)
    }

    pub fn drain(&mut self) -> Vec<QueuedTask<T>> {
        self.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Normal lane: kept sorted by [`QueuedTask::order_key`].
#[derive(Debug)]
pub struct OrderedLane<T> {
    tasks: Vec<QueuedTask<T>>,
}

impl<T> Default for OrderedLane<T> {
    fn default() -> Self {
        Self { tasks: Vec::new() }
    }
}

impl<T> OrderedLane<T> {
    pub fn push(&mut self, task: QueuedTask<T>) {
        let key = task.order_key();
        let position = self.tasks.partition_point(|existing| existing.order_key() <= key);
        self.tasks.insert(position, task);
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedTask<T>> {
        self.tasks.iter()
    }

    pub fn take_first(&mut self, mut ready: impl FnMut(&QueuedTask<T>) -> bool) -> Option<QueuedTask<T>> {
        let position = self.tasks.iter().position(|task| ready(task))?;
        Some(self.tasks.remove(position))
    }

    pub fn contains(&self, id: &StepId) -> bool {
        self.tasks.iter().any(|task| &task.id == id)
    }

    pub fn drain(&mut self) -> Vec<QueuedTask<T>> {
        std::mem::take(&mut self.tasks)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: i32, deps: &[&str], seq: u64) -> QueuedTask<()> {
        let mut task = QueuedTask::new(id, ())
            .with_priority(priority)
            .with_dependencies(deps.iter().copied());
        task.seq = seq;
        task
    }

    #[test]
    fn ordered_lane_sorts_by_priority_then_deps_then_insertion() {
        let mut lane = OrderedLane::default();
        lane.push(task("low", 1, &[], 0));
        lane.push(task("high-two-deps", 5, &["a", "b"], 1));
        lane.push(task("high-one-dep", 5, &["a"], 2));
        lane.push(task("high-one-dep-later", 5, &["c"], 3));

        let order: Vec<_> = lane.iter().map(|task| task.id.as_str().to_string()).collect();
        assert_eq!(
            order,
            vec!["high-one-dep", "high-one-dep-later", "high-two-deps", "low"]
        );
    }

    #[test]
    fn priority_lane_is_fifo() {
        let mut lane = PriorityLane::default();
        lane.push(task("first", 0, &[], 0));
        lane.push(task("second", 9, &[], 1));

        let taken = lane.take_first(|_| true).unwrap();
        assert_eq!(taken.id.as_str(), "first");
        assert_eq!(lane.len(), 1);
    }

    #[test]
    fn take_first_skips_unready() {
        let mut lane = OrderedLane::default();
        lane.push(task("blocked", 3, &["x"], 0));
        lane.push(task("free", 1, &[], 1));

        let taken = lane.take_first(|task| task.dependencies.is_empty()).unwrap();
        assert_eq!(taken.id.as_str(), "free");
        assert!(lane.contains(&StepId::new("blocked")));
    }
}
