use std::collections::BTreeMap;

use stepwise_state_center::{load_checkpoints, AccumulatorConfig, StateAccumulator};

#[test]
fn checkpoints_are_mirrored_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut acc = StateAccumulator::new(
        AccumulatorConfig {
            checkpoint_retention: 2,
            ..AccumulatorConfig::default()
        }
        .with_persistence(dir.path(), "run-42"),
    );

    acc.merge_extracted_data(BTreeMap::from([("title".to_string(), "X".to_string())]));
    acc.create_checkpoint("step-1");
    acc.create_checkpoint("step-2");
    acc.create_checkpoint("step-3");

    let path = acc.checkpoint_path().unwrap();
    assert!(path.ends_with("run-42/checkpoints.json"));

    let loaded = load_checkpoints(dir.path(), "run-42").unwrap();
    let names: Vec<_> = loaded.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["step-2", "step-3"]);
    assert_eq!(loaded[1].data.get("title").map(String::as_str), Some("X"));
}

#[test]
fn missing_checkpoint_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_checkpoints(dir.path(), "never-ran").unwrap().is_empty());
}

#[test]
fn unwritable_directory_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, b"file, not a directory").unwrap();

    let mut acc = StateAccumulator::new(AccumulatorConfig::default().with_persistence(&blocker, "run"));
    acc.merge_extracted_data(BTreeMap::from([("k".to_string(), "v".to_string())]));

    let checkpoint = acc.create_checkpoint("still-recorded");
    assert_eq!(checkpoint.name, "still-recorded");
    assert!(acc.persist_checkpoints().is_err());
}
