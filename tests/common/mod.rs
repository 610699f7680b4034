//! Shared integration-test helpers: fixture paths, binary invocation and
//! small snapshot builders.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;

use greenwave::config::{ConfigLoader, GreenwaveConfig};
use greenwave::model::{IntersectionSnapshot, RoadCount, RoadId};

/// Helpers for driving the compiled `greenwave` binary.
pub struct GreenwaveCli;

impl GreenwaveCli {
    /// Returns the path to a file under `tests/fixtures/`.
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Runs the binary to completion and captures its output.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_greenwave"))
            .args(args)
            .env_remove("GREENWAVE_LOG_LEVEL")
            .env_remove("GREENWAVE_CONFIG")
            .output()
            .expect("failed to run greenwave binary")
    }

    /// Replays a scenario with JSON output and returns one value per cycle.
    #[allow(clippy::missing_panics_doc)]
    pub fn run_json(config: &str, scenario: &str) -> Vec<serde_json::Value> {
        let config = Self::fixture_path(config);
        let scenario = Self::fixture_path(scenario);
        let output = Self::spawn_command(&[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--scenario",
            scenario.to_str().unwrap(),
            "--format",
            "json",
        ]);
        assert!(
            output.status.success(),
            "run should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
            .collect()
    }
}

/// Loads a configuration through the full loader pipeline.
#[allow(clippy::missing_panics_doc)]
pub fn load_config(yaml: &str) -> Arc<GreenwaveConfig> {
    ConfigLoader::with_defaults()
        .load_from_str(yaml)
        .expect("config should load")
        .config
}

/// Four-road snapshot with only cars.
pub fn cars(north: u32, south: u32, east: u32, west: u32) -> IntersectionSnapshot {
    IntersectionSnapshot::new()
        .with(RoadId::North, RoadCount::cars(north))
        .with(RoadId::South, RoadCount::cars(south))
        .with(RoadId::East, RoadCount::cars(east))
        .with(RoadId::West, RoadCount::cars(west))
}

/// Replaces one road's count.
pub fn with_road(snapshot: IntersectionSnapshot, road: RoadId, count: RoadCount) -> IntersectionSnapshot {
    snapshot.with(road, count)
}
