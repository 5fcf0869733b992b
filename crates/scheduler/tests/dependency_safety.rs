use proptest::prelude::*;
use stepwise_scheduler::{QueuedTask, TaskQueue};

/// One generated task: priority, fast-track lane, and a bitmask over earlier tasks.
type TaskLayout = (i32, bool, u16);

fn layout() -> impl Strategy<Value = Vec<TaskLayout>> {
    prop::collection::vec((0i32..5, any::<bool>(), any::<u16>()), 1..12)
}

fn build_queue(layout: &[TaskLayout]) -> TaskQueue<usize> {
    let mut queue = TaskQueue::new();
    for (index, (priority, fast_track, mask)) in layout.iter().copied().enumerate() {
        let deps: Vec<String> = (0..index)
            .filter(|dep| mask & (1 << dep) != 0)
            .map(|dep| format!("t{dep}"))
            .collect();
        let task = QueuedTask::new(format!("t{index}"), index)
            .with_priority(priority)
            .with_dependencies(deps);
        let queued = if fast_track {
            queue.enqueue_priority(task)
        } else {
            queue.enqueue(task)
        };
        if let Err(err) = queued {
            panic!("generated ids are unique: {err}");
        }
    }
    queue
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn ready_tasks_never_have_unmet_dependencies(layout in layout()) {
        let mut queue = build_queue(&layout);
        let total = queue.len();
        let mut dispatched = 0;

        loop {
            for task in queue.ready_tasks() {
                for dependency in &task.dependencies {
                    prop_assert!(
                        queue.is_completed(dependency),
                        "{} ready before {}",
                        task.id,
                        dependency
                    );
                }
            }
            let Some(task) = queue.dequeue() else { break };
            prop_assert!(queue.unmet_dependencies(&task).is_empty());
            queue.mark_completed(task.id.clone());
            dispatched += 1;
        }

        // Dependencies only point backwards, so everything drains.
        prop_assert_eq!(dispatched, total);
        prop_assert!(queue.is_empty());
    }
}

#[test]
fn failed_dependency_leaves_dependents_blocked_forever() {
    let mut queue = TaskQueue::new();
    queue.enqueue(QueuedTask::new("login", ())).unwrap();
    queue
        .enqueue(QueuedTask::new("checkout", ()).with_dependencies(["login"]))
        .unwrap();

    let login = queue.dequeue().unwrap();
    queue.mark_failed(login.id, "credentials rejected");

    for _ in 0..3 {
        assert!(queue.dequeue().is_none());
    }
    let blocked = queue.blocked_tasks();
    assert_eq!(blocked.len(), 1);
    assert_eq!(
        queue.unmet_dependencies(blocked[0])
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>(),
        vec!["login"]
    );
    assert_eq!(queue.stats().blocked, 1);
}
