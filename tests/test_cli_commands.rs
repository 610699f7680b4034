mod common;

use common::GreenwaveCli;

#[test]
fn version_human() {
    let output = GreenwaveCli::spawn_command(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("greenwave "), "unexpected: {stdout}");
}

#[test]
fn version_json() {
    let output = GreenwaveCli::spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    assert_eq!(parsed["name"], "greenwave");
    assert_eq!(parsed["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn validate_valid_config() {
    let config = GreenwaveCli::fixture_path("basic.yaml");
    let output = GreenwaveCli::spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("ok"));
}

#[test]
fn validate_empty_config_uses_defaults() {
    let config = GreenwaveCli::fixture_path("empty.yaml");
    let output = GreenwaveCli::spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(output.status.success());
}

#[test]
fn validate_invalid_config_exits_with_config_error() {
    let config = GreenwaveCli::fixture_path("invalid.yaml");
    let output = GreenwaveCli::spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("controller.cycle_length"), "{stdout}");
    assert!(stdout.contains("Duplicate road"), "{stdout}");
}

#[test]
fn validate_bad_yaml() {
    let config = GreenwaveCli::fixture_path("bad_yaml.yaml");
    let output = GreenwaveCli::spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn validate_missing_file() {
    let output = GreenwaveCli::spawn_command(&[
        "validate",
        "/tmp/nonexistent_greenwave_test_file.yaml",
    ]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn validate_warning_passes_unless_strict() {
    let config = GreenwaveCli::fixture_path("unknown_school.yaml");
    let path = config.to_str().unwrap();

    let output = GreenwaveCli::spawn_command(&["validate", path]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("did you mean"), "{stdout}");

    let output = GreenwaveCli::spawn_command(&["validate", "--strict", path]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn validate_json_output_per_file() {
    let good = GreenwaveCli::fixture_path("basic.yaml");
    let bad = GreenwaveCli::fixture_path("invalid.yaml");
    let output = GreenwaveCli::spawn_command(&[
        "validate",
        "--format",
        "json",
        good.to_str().unwrap(),
        bad.to_str().unwrap(),
    ]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["valid"], true);
    assert_eq!(lines[1]["valid"], false);
}

#[test]
fn run_replays_scenario() {
    let reports = GreenwaveCli::run_json("basic.yaml", "scenario.yaml");
    assert_eq!(reports.len(), 4);

    let one = |cycle: usize| &reports[cycle]["intersections"][0];
    let two = |cycle: usize| &reports[cycle]["intersections"][1];

    assert_eq!(one(0)["intersection"], "1");
    assert_eq!(one(0)["committed"]["phase"], "A");
    assert_eq!(two(0)["committed"]["phase"], "B");
    assert_eq!(two(0)["decision"]["tier"], "forced_non_empty");

    assert_eq!(one(1)["held"], true);
    assert_eq!(one(1)["committed"]["phase"], "A");
    assert_eq!(one(1)["decision"]["phase"], "B");

    assert_eq!(one(2)["committed"]["phase"], "Emergency");
    assert_eq!(one(2)["committed"]["emergency_phase"], "B");
    assert_eq!(two(2)["roads"][0]["accident"], true);
    assert_eq!(two(2)["roads"][0]["signal"], "RED");

    assert_eq!(one(3)["switched"], true);
    assert_eq!(one(3)["committed"]["phase"], "B");
    assert_eq!(one(3)["committed"]["emergency_phase"], serde_json::Value::Null);
}

#[test]
fn run_human_output() {
    let config = GreenwaveCli::fixture_path("basic.yaml");
    let scenario = GreenwaveCli::fixture_path("scenario.yaml");
    let output = GreenwaveCli::spawn_command(&[
        "run",
        "-c",
        config.to_str().unwrap(),
        "-s",
        scenario.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cycle 0  07:30:00"), "{stdout}");
    assert!(stdout.contains("held, resolved B"), "{stdout}");
    assert!(stdout.contains("Emergency(B)"), "{stdout}");
    assert!(stdout.contains("ACCIDENT"), "{stdout}");
}

#[test]
fn run_route_agent_holds_corridor() {
    let reports = GreenwaveCli::run_json("route.yaml", "corridor.yaml");
    let intersections = reports[0]["intersections"].as_array().unwrap();

    let signal = |i: usize, road: usize| intersections[i]["roads"][road]["signal"].clone();
    // 1: north green (start), 2: all red, 3: east green (end), 4: outside
    assert_eq!(signal(0, 0), "GREEN");
    assert_eq!(signal(0, 2), "RED");
    assert!((0..4).all(|r| signal(1, r) == "RED"));
    assert_eq!(signal(2, 2), "GREEN");
    assert_eq!(signal(2, 0), "RED");
    assert_eq!(intersections[3]["roads"][0]["signal"], "GREEN");
    assert_eq!(intersections[3]["roads"][0]["provenance"], "Reactive");
    assert_eq!(intersections[0]["roads"][0]["provenance"], "ExternalAgent");
}

#[test]
fn run_writes_event_stream() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let events = dir.path().join("events.jsonl");
    let config = GreenwaveCli::fixture_path("basic.yaml");
    let scenario = GreenwaveCli::fixture_path("scenario.yaml");
    let output = GreenwaveCli::spawn_command(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--scenario",
        scenario.to_str().unwrap(),
        "--format",
        "json",
        "--events",
        events.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = lines.iter().map(|e| e["type"].as_str().unwrap()).collect();

    assert_eq!(types.first(), Some(&"ControllerStarted"));
    assert_eq!(types.last(), Some(&"ControllerStopped"));
    assert_eq!(lines.last().unwrap()["reason"], "completed");
    assert_eq!(lines.last().unwrap()["cycles"], 4);
    assert!(types.contains(&"PhaseHeld"));
    assert!(types.contains(&"AccidentReported"));
    assert_eq!(types.iter().filter(|t| **t == "CycleCompleted").count(), 4);

    let sequences: Vec<u64> = lines.iter().map(|e| e["sequence"].as_u64().unwrap()).collect();
    assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
}

#[test]
fn run_missing_scenario_is_io_error() {
    let config = GreenwaveCli::fixture_path("basic.yaml");
    let output = GreenwaveCli::spawn_command(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--scenario",
        "/tmp/nonexistent_greenwave_scenario.yaml",
    ]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn run_rejects_config_as_scenario() {
    let config = GreenwaveCli::fixture_path("basic.yaml");
    let output = GreenwaveCli::spawn_command(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--scenario",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(4));
}
