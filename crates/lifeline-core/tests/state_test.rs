use lifeline_core::config::StateConfig;
use lifeline_core::state::{RunStatus, StateStore};

#[test]
fn startup_writes_both_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::in_dir(dir.path());

    store.write_startup_record(5008);

    let process = store.read_process_record().expect("process record");
    assert_eq!(process.pid, std::process::id());
    assert_eq!(process.port, 5008);
    assert!(process.timestamp > 0.0);

    let status = store.read_status().expect("status record");
    assert_eq!(status.status, RunStatus::Running);
    assert_eq!(status.pid, Some(std::process::id()));
    assert_eq!(status.port, 5008);
}

#[test]
fn records_use_flat_pid_port_timestamp_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::in_dir(dir.path());
    store.write_startup_record(6000);

    let raw = std::fs::read_to_string(store.process_path()).expect("read process file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let obj = value.as_object().expect("object");
    let mut keys: Vec<_> = obj.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["pid", "port", "timestamp"]);

    let raw = std::fs::read_to_string(store.status_path()).expect("read status file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["status"], "running");
}

#[test]
fn shutdown_flips_status_and_clears_pid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::in_dir(dir.path());
    store.write_startup_record(5008);
    let before = store.read_status().expect("status");

    store.write_shutdown_record(5008);

    let after = store.read_status().expect("status");
    assert_eq!(after.status, RunStatus::Stopped);
    assert_eq!(after.pid, None);
    assert_eq!(after.port, 5008);
    assert!(after.timestamp >= before.timestamp);

    // The identity record is left alone.
    let process = store.read_process_record().expect("process record");
    assert_eq!(process.pid, std::process::id());
}

#[test]
fn startup_overwrites_previous_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::in_dir(dir.path());
    store.write_startup_record(1111);
    store.write_shutdown_record(1111);

    store.write_startup_record(2222);

    assert_eq!(store.read_process_record().unwrap().port, 2222);
    let status = store.read_status().unwrap();
    assert_eq!(status.status, RunStatus::Running);
    assert_eq!(status.port, 2222);
}

#[test]
fn missing_parent_directories_are_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = StateConfig {
        dir: Some(dir.path().join("nested").join("state")),
        process_file: "main.pid".into(),
        status_file: "main_status.json".into(),
    };
    let store = StateStore::from_config(&cfg);

    store.write_startup_record(5008);

    assert!(dir.path().join("nested/state/main.pid").exists());
    assert!(dir.path().join("nested/state/main_status.json").exists());
}

#[test]
fn write_failure_is_swallowed() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A regular file where a directory is expected makes every write fail.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").expect("write blocker");
    let store = StateStore::new(blocker.join("backend.pid"), blocker.join("status.json"));

    store.write_startup_record(5008);
    store.write_shutdown_record(5008);

    assert!(store.try_write_startup_record(5008).is_err());
    assert!(store.read_status().is_none());
}

#[test]
fn corrupt_status_reads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::in_dir(dir.path());
    std::fs::write(store.status_path(), "{not json").expect("write");
    assert!(store.read_status().is_none());
}
