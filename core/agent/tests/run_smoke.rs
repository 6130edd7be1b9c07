use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const FLAG_PATH: &str = "/BinsData/smoke-bin/isSessionStarted";
const COUNTER_PATH: &str = "/BinsData/smoke-bin/trashUnitsCounter";

fn run_agent(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bin-agent"))
        .args(args)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("BIN_AGENT_DEBUG_LOG")
        .output()
        .expect("Failed to run bin-agent")
}

fn write_fast_config(dir: &TempDir) -> String {
    let path = dir.path().join("agent.toml");
    fs_err::write(
        &path,
        r#"
[remote]
poll_interval_ms = 10

[sensor]
sample_interval_ms = 10
wall_distance_cm = 12.0

[detector]
debounce_ms = 0

[session]
timeout_ms = 60000

[scheduler]
tick_ms = 5
"#,
    )
    .expect("write config");
    path.to_string_lossy().to_string()
}

#[test]
fn counts_drops_and_mirrors_counter() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_fast_config(&dir);

    let store = dir.path().join("remote.json");
    fs_err::write(&store, format!(r#"{{"{}": "true"}}"#, FLAG_PATH)).expect("seed store");

    let samples = dir.path().join("samples.txt");
    fs_err::write(&samples, "8\n20\n8\n20\n").expect("write samples");

    let output = run_agent(
        dir.path(),
        &[
            "run",
            "--config",
            &config,
            "--store",
            &store.to_string_lossy(),
            "--samples",
            &samples.to_string_lossy(),
            "--session-id",
            "smoke-bin",
            "--max-ticks",
            "60",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("snapshot JSON");
    assert_eq!(report["agent"]["session"]["active"], Value::Bool(true));
    assert_eq!(report["agent"]["counter"]["count"], serde_json::json!(2));
    assert_eq!(report["scheduler"]["total_ticks"], serde_json::json!(60));

    let document: Value =
        serde_json::from_slice(&fs_err::read(&store).expect("read store")).expect("store JSON");
    assert_eq!(document[COUNTER_PATH], serde_json::json!(2));
    assert_eq!(document[FLAG_PATH], Value::String("true".into()));
}

#[test]
fn inactive_session_never_writes_counter() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_fast_config(&dir);

    let store = dir.path().join("remote.json");
    fs_err::write(&store, format!(r#"{{"{}": "maybe"}}"#, FLAG_PATH)).expect("seed store");

    let output = run_agent(
        dir.path(),
        &[
            "run",
            "--config",
            &config,
            "--store",
            &store.to_string_lossy(),
            "--session-id",
            "smoke-bin",
            "--max-ticks",
            "20",
        ],
    );
    assert!(output.status.success());

    let document: Value =
        serde_json::from_slice(&fs_err::read(&store).expect("read store")).expect("store JSON");
    assert!(document.get(COUNTER_PATH).is_none());
    assert_eq!(document[FLAG_PATH], Value::String("maybe".into()));
}

#[test]
fn config_subcommand_prints_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let output = run_agent(dir.path(), &["config"]);
    assert!(output.status.success());

    let config: Value = serde_json::from_slice(&output.stdout).expect("config JSON");
    assert_eq!(config["remote"]["namespace"], Value::String("BinsData".into()));
    assert_eq!(config["detector"]["debounce_ms"], serde_json::json!(300));
    assert_eq!(
        config["session"]["timeout_policy"],
        Value::String("since_last_drop".into())
    );
}

#[test]
fn invalid_config_exits_non_zero() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("agent.toml");
    fs_err::write(&path, "[remote]\npoll_interval_ms = 0\n").expect("write config");

    let output = run_agent(
        dir.path(),
        &["run", "--config", &path.to_string_lossy(), "--max-ticks", "1"],
    );
    assert!(!output.status.success());
}
