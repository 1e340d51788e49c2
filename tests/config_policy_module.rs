use planguard::config::{load_policy_config, PolicyConfig};
use planguard::engine::{validate_path, EngineError, SnapshotStore, ToolRouter};
use planguard::tools::register_builtin_tools;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[test]
fn yaml_file_configures_a_working_policy() {
    let temp = tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join("data")).expect("mkdir");
    let config_path = temp.path().join("policy.yaml");
    fs::write(
        &config_path,
        "allowed_paths:\n  - data\nmax_data_bytes: 4096\nallow_shell: true\n",
    )
    .expect("write yaml");

    let config = load_policy_config(&config_path).expect("load");
    let policy = config.into_policy(temp.path()).expect("policy");

    assert_eq!(policy.max_data_bytes, 4096);
    assert!(policy.allow_shell);
    validate_path(Path::new("data/report.csv"), &policy).expect("allowed");
    let err = validate_path(Path::new("policy.yaml"), &policy).expect_err("outside allow-list");
    assert!(err.is_sandbox_violation());
}

#[test]
fn configured_allow_list_reaches_the_tools() {
    let temp = tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join("inbox")).expect("mkdir");
    fs::write(temp.path().join("secret.txt"), b"keep out").expect("seed");

    let config = PolicyConfig::from_yaml("allowed_paths: [inbox]").expect("parse");
    let policy = config.into_policy(temp.path()).expect("policy");
    let snapshots = Arc::new(Mutex::new(SnapshotStore::new(policy.clone())));
    let mut router = ToolRouter::new(policy.clone());
    register_builtin_tools(&mut router, &policy, &snapshots);

    router
        .call(
            "write_file",
            &Map::from_iter([
                ("path".to_string(), Value::String("inbox/mail.txt".into())),
                ("content".to_string(), Value::String("hello".into())),
            ]),
            true,
        )
        .expect("write inside allow-list");

    let err = router
        .call(
            "read_file",
            &Map::from_iter([("path".to_string(), Value::String("secret.txt".into()))]),
            false,
        )
        .expect_err("outside allow-list");
    assert!(err.is_sandbox_violation());
}

#[test]
fn missing_config_file_is_a_read_error() {
    let temp = tempdir().expect("tempdir");
    let err = load_policy_config(&temp.path().join("absent.yaml")).expect_err("missing file");
    let engine_err: EngineError = err.into();
    assert!(matches!(engine_err, EngineError::Config(_)));
}
