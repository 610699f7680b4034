//! Scenario files replayed by `greenwave run`.
//!
//! A scenario is a recorded (or hand-written) sequence of detector
//! snapshots and forecasts:
//!
//! ```yaml
//! start_time: "07:30"
//! cycles:
//!   - at: 0s
//!     counts:
//!       "1": { north: { car: 12 }, east: { car: 3 } }
//!     predicted:
//!       "1": { north: { car: 8.0 } }
//!   - at: 30s
//!     time_of_day: "15:05"
//!     counts:
//!       "1": { east: { car: 4, ambulance: 1 } }
//! ```
//!
//! `at` is the monotonic offset of the cycle (seconds or humantime). The
//! time of day defaults to `start_time + at`.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Deserializer, de};

use crate::config::schema::{parse_time_of_day, seconds, time_of_day};
use crate::error::GreenwaveError;
use crate::model::{CyclePrediction, CycleSnapshot, CycleTime};

/// A parsed scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Time of day at offset zero
    #[serde(default = "midnight", with = "time_of_day")]
    pub start_time: NaiveTime,

    /// Cycles in replay order
    #[serde(default)]
    pub cycles: Vec<ScenarioCycle>,
}

/// One recorded control cycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioCycle {
    /// Monotonic offset from the start of the scenario
    #[serde(default, with = "seconds")]
    pub at: Duration,

    /// Explicit time of day, overriding `start_time + at`
    #[serde(default, deserialize_with = "optional_time_of_day")]
    pub time_of_day: Option<NaiveTime>,

    /// Sensed counts
    #[serde(default)]
    pub counts: CycleSnapshot,

    /// Forecast counts
    #[serde(default)]
    pub predicted: CyclePrediction,
}

impl ScenarioCycle {
    /// Returns the cycle clock given the scenario's start time.
    #[must_use]
    pub fn time(&self, start: NaiveTime) -> CycleTime {
        let time_of_day = self.time_of_day.unwrap_or_else(|| {
            TimeDelta::from_std(self.at).map_or(start, |offset| start.overflowing_add_signed(offset).0)
        });
        CycleTime::new(self.at, time_of_day)
    }
}

impl Scenario {
    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a scenario
    /// error naming the file if it does not parse.
    pub fn load(path: &Path) -> Result<Self, GreenwaveError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
            .map_err(|e| GreenwaveError::Scenario(format!("{}: {e}", path.display())))
    }

    /// Parses a scenario from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a scenario error if the text is not a valid scenario.
    pub fn from_yaml(text: &str) -> Result<Self, GreenwaveError> {
        Self::parse(text).map_err(GreenwaveError::Scenario)
    }

    fn parse(text: &str) -> Result<Self, String> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err("scenario is empty".to_string());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Number of cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Returns `true` if the scenario has no cycles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Iterates over cycles with their clocks.
    pub fn iter(&self) -> impl Iterator<Item = (&ScenarioCycle, CycleTime)> {
        self.cycles.iter().map(|c| (c, c.time(self.start_time)))
    }
}

const fn midnight() -> NaiveTime {
    NaiveTime::MIN
}

fn optional_time_of_day<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveTime>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_time_of_day(&raw).map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IntersectionId, RoadId};

    const SCENARIO: &str = r#"
start_time: "07:30"
cycles:
  - at: 0
    counts:
      "1": { north: { car: 12 }, east: { car: 3 } }
    predicted:
      "1": { north: { car: 8.0 } }
  - at: 90s
    counts:
      "1": { east: { car: 4, ambulance: 1 } }
  - at: 2m
    time_of_day: "15:05"
"#;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.len(), 3);
        assert_eq!(scenario.start_time, hm(7, 30));

        let first = &scenario.cycles[0];
        let counts = first.counts.get(&IntersectionId::new("1")).unwrap();
        assert_eq!(counts.count(RoadId::North).car, 12);
        let forecast = first.predicted.get(&IntersectionId::new("1")).unwrap();
        assert!((forecast.get(RoadId::North).unwrap().car - 8.0).abs() < f64::EPSILON);

        let second = &scenario.cycles[1];
        assert_eq!(
            second.counts.get(&IntersectionId::new("1")).unwrap().count(RoadId::East).ambulance,
            1
        );
        assert!(second.predicted.is_empty());
    }

    #[test]
    fn test_cycle_times() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let times: Vec<_> = scenario.iter().map(|(_, t)| t).collect();
        assert_eq!(times[0].monotonic, Duration::ZERO);
        assert_eq!(times[0].time_of_day, hm(7, 30));
        assert_eq!(times[1].monotonic, Duration::from_secs(90));
        assert_eq!(times[1].time_of_day, NaiveTime::from_hms_opt(7, 31, 30).unwrap());
        assert_eq!(times[2].time_of_day, hm(15, 5));
    }

    #[test]
    fn test_time_of_day_wraps_midnight() {
        let scenario = Scenario::from_yaml("start_time: \"23:59\"\ncycles:\n  - at: 2m\n").unwrap();
        let (_, time) = scenario.iter().next().unwrap();
        assert_eq!(time.time_of_day, hm(0, 1));
    }

    #[test]
    fn test_empty_scenario_is_rejected() {
        let err = Scenario::from_yaml("  \n").unwrap_err();
        assert!(matches!(err, GreenwaveError::Scenario(_)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = Scenario::from_yaml("cycles:\n  - at: 0\n    count: {}\n").unwrap_err();
        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn test_bad_time_of_day() {
        assert!(Scenario::from_yaml("start_time: \"25:00\"\n").is_err());
    }

    #[test]
    fn test_load_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "cycles: [").unwrap();
        let err = Scenario::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
