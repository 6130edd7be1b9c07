//! Agent driven against the JSON-file store, with the operator editing the file.

use bin_core::{
    Agent, AgentConfig, Distance, FileStore, ManualClock, Reading, ReplaySampler, StaticIdentity,
};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

const FLAG_PATH: &str = "/BinsData/bin-9/isSessionStarted";
const COUNTER_PATH: &str = "/BinsData/bin-9/trashUnitsCounter";

fn write_flag(store_path: &Path, value: &str) {
    let mut document: serde_json::Map<String, serde_json::Value> = fs_err::read(store_path)
        .ok()
        .and_then(|data| serde_json::from_slice(&data).ok())
        .unwrap_or_default();
    document.insert(FLAG_PATH.to_string(), json!(value));
    fs_err::write(store_path, serde_json::to_vec(&document).expect("serialize")).expect("write");
}

type FileAgent = Agent<ReplaySampler, FileStore, StaticIdentity, ManualClock>;

fn run(agent: &mut FileAgent, clock: &ManualClock, ticks: usize) {
    for _ in 0..ticks {
        agent.tick();
        clock.advance(Duration::from_millis(100));
    }
}

fn cm(value: f64) -> Reading {
    Reading::Range(Distance::from_cm(value))
}

#[test]
fn operator_session_round_trip() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let store_path = temp_dir.path().join("remote.json");
    write_flag(&store_path, "false");

    let mut config = AgentConfig::default();
    config.remote.poll_interval_ms = 500;
    config.sensor.sample_interval_ms = 100;
    config.detector.debounce_ms = 200;

    let clock = ManualClock::default();
    let readings = vec![cm(8.0), cm(30.0), cm(7.5), Reading::Unavailable, cm(6.0)];
    let mut agent = Agent::new(
        &config,
        ReplaySampler::new(readings),
        FileStore::new(&store_path),
        StaticIdentity::after_polls("bin-9", 2),
        clock.clone(),
    );

    run(&mut agent, &clock, 6);
    assert!(!agent.controller().is_active());
    assert!(agent.sync().paths().is_some());

    write_flag(&store_path, "true");
    run(&mut agent, &clock, 12);
    assert!(agent.controller().is_active());
    assert_eq!(agent.controller().counter().count, 3);
    assert_eq!(
        agent.store().read_value(COUNTER_PATH).expect("read"),
        Some(json!(3))
    );

    write_flag(&store_path, "false");
    run(&mut agent, &clock, 8);
    assert!(!agent.controller().is_active());
    assert_eq!(agent.controller().counter().count, 3);
    assert_eq!(agent.snapshot().sync.failures, 0);
}
