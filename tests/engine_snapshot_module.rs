use planguard::engine::{
    ActionJournal, Approval, ExecutionPolicy, Plan, PlanStep, PlanRuntime, SnapshotStore,
    StepStatus, ToolRouter,
};
use planguard::tools::register_builtin_tools;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

fn runtime_over(temp: &TempDir) -> PlanRuntime {
    let policy = ExecutionPolicy::new(temp.path()).expect("policy");
    let snapshots = Arc::new(Mutex::new(SnapshotStore::new(policy.clone())));
    let mut router = ToolRouter::new(policy.clone());
    register_builtin_tools(&mut router, &policy, &snapshots);
    PlanRuntime::new(router, ActionJournal::new(), snapshots)
}

#[test]
fn plan_step_snapshot_allows_rollback_after_destructive_edit() {
    let temp = tempdir().expect("tempdir");
    let target = temp.path().join("config.txt");
    fs::write(&target, b"stable settings").expect("seed");
    let mut runtime = runtime_over(&temp);

    let capture = PlanStep::new("capture", "snapshot the config before editing")
        .with_tool(
            "create_snapshot",
            Map::from_iter([("path".to_string(), Value::String("config.txt".into()))]),
        )
        .auto_approved();
    let rewrite = PlanStep::new("rewrite", "overwrite the config").with_tool(
        "write_file",
        Map::from_iter([
            ("path".to_string(), Value::String("config.txt".into())),
            (
                "content".to_string(),
                Value::String("broken settings".into()),
            ),
        ]),
    );
    let rewrite_id = rewrite.id.clone();
    let mut plan = Plan::new("reconfigure", vec![capture, rewrite]);
    let mut approvals = BTreeMap::new();
    approvals.insert(rewrite_id, Approval::new("alice"));
    let log = runtime.run_plan(&mut plan, &approvals);

    assert_eq!(plan.steps[0].status, StepStatus::Applied);
    assert_eq!(plan.steps[1].status, StepStatus::Applied);
    assert_eq!(fs::read(&target).expect("read"), b"broken settings");

    let snapshot_id = log[0]
        .output
        .as_ref()
        .and_then(|output| output.get("snapshot_id"))
        .and_then(Value::as_str)
        .expect("snapshot id in journal")
        .to_string();
    runtime
        .snapshots()
        .lock()
        .expect("lock")
        .restore_file(&snapshot_id)
        .expect("restore");
    assert_eq!(fs::read(&target).expect("read"), b"stable settings");
}

#[test]
fn snapshot_tool_rejects_targets_outside_the_root() {
    let temp = tempdir().expect("tempdir");
    let mut runtime = runtime_over(&temp);

    let step = PlanStep::new("capture", "snapshot a system file")
        .with_tool(
            "create_snapshot",
            Map::from_iter([("path".to_string(), Value::String("/etc/passwd".into()))]),
        )
        .auto_approved();
    let mut plan = Plan::new("exfiltrate", vec![step]);

    let log = runtime.run_plan(&mut plan, &BTreeMap::new());
    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    let error = log[0].error.as_deref().expect("error recorded");
    assert!(error.contains("sandbox violation"), "got: {error}");
    assert!(runtime.snapshots().lock().expect("lock").snapshots().is_empty());
}

#[test]
fn snapshot_of_missing_path_is_reference_only() {
    let temp = tempdir().expect("tempdir");
    let mut runtime = runtime_over(&temp);

    let step = PlanStep::new("capture", "snapshot a directory that is not a file")
        .with_tool(
            "create_snapshot",
            Map::from_iter([
                ("path".to_string(), Value::String("planned-dir".into())),
                ("kind".to_string(), Value::String("workspace".into())),
            ]),
        )
        .auto_approved();
    let mut plan = Plan::new("bookmark", vec![step]);

    let log = runtime.run_plan(&mut plan, &BTreeMap::new());
    assert_eq!(plan.steps[0].status, StepStatus::Applied);
    let output = log[0].output.as_ref().expect("output");
    assert_eq!(output.get("captured"), Some(&Value::Bool(false)));

    let store = runtime.snapshots();
    let store = store.lock().expect("lock");
    let snapshot = &store.snapshots()[0];
    assert_eq!(snapshot.kind, "workspace");
    assert!(!snapshot.metadata.contains_key("digest"));
}

#[test]
fn captured_copies_live_under_the_artifacts_dir() {
    let temp = tempdir().expect("tempdir");
    let target = temp.path().join("data.csv");
    fs::write(&target, b"a,b\n1,2\n").expect("seed");
    let runtime = runtime_over(&temp);

    let snapshot = runtime
        .snapshots()
        .lock()
        .expect("lock")
        .capture_file("file", &target.display().to_string(), Map::new())
        .expect("capture");

    let stored = snapshot
        .metadata
        .get("snapshotPath")
        .and_then(Value::as_str)
        .expect("stored path");
    assert!(stored.contains("artifacts/snapshots"));
    assert!(std::path::Path::new(stored).is_file());
    let digest = snapshot
        .metadata
        .get("digest")
        .and_then(Value::as_str)
        .expect("digest");
    assert_eq!(digest.len(), 64);
}

#[test]
fn references_accumulate_in_creation_order() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("one.txt"), b"1").expect("seed");
    fs::write(temp.path().join("two.txt"), b"2").expect("seed");
    let runtime = runtime_over(&temp);
    let store = runtime.snapshots();
    let mut store = store.lock().expect("lock");

    let first = store
        .create_snapshot("file", "one.txt", Map::new())
        .expect("first");
    let second = store
        .create_snapshot("file", "two.txt", Map::new())
        .expect("second");

    let ids: Vec<&str> = store
        .snapshots()
        .iter()
        .map(|snapshot| snapshot.id.as_str())
        .collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    assert!(store.get(&first.id).is_some());
    assert!(store.get("snap-missing").is_none());
}
