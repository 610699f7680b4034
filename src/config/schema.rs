//! Configuration schema types.
//!
//! These types are deserialized from the YAML controller configuration.
//! Every field has a default so a minimal file (or an empty mapping) is a
//! valid reactive controller for any intersection it is shown.

use std::time::Duration;

use chrono::NaiveTime;
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{IntersectionId, PhaseGroup, RoadId};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `greenwave` controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct GreenwaveConfig {
    /// Timing parameters and strategy selection
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Cross-cycle debounce behavior
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// What an accident does to the signals
    #[serde(default)]
    pub accident_policy: AccidentPolicy,

    /// Optional school-release priority window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_priority: Option<SchoolPriorityConfig>,

    /// Declared intersections and their roads, in output order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub intersections: IndexMap<IntersectionId, IntersectionLayout>,

    /// Corridor for the built-in route agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteConfig>,
}

impl GreenwaveConfig {
    /// Returns the controlled roads of `id`.
    ///
    /// Undeclared intersections control all four roads.
    #[must_use]
    pub fn roads_of(&self, id: &IntersectionId) -> Vec<RoadId> {
        self.intersections
            .get(id)
            .map_or_else(|| RoadId::ALL.to_vec(), |layout| layout.roads.clone())
    }

    /// Returns `true` if `id` is declared, or if no intersections are declared at all.
    #[must_use]
    pub fn knows_intersection(&self, id: &IntersectionId) -> bool {
        self.intersections.is_empty() || self.intersections.contains_key(id)
    }
}

// ============================================================================
// Controller Parameters
// ============================================================================

/// Timing parameters and strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ControllerConfig {
    /// Baseline green duration in seconds
    #[serde(default = "default_base_duration")]
    pub base_duration: f64,

    /// Seconds of extension per unit of effective demand
    #[serde(default = "default_extension_factor")]
    pub extension_factor: f64,

    /// Upper bound on the extension in seconds
    #[serde(default = "default_max_extension")]
    pub max_extension: f64,

    /// Minimum dwell time before a committed phase may change
    #[serde(default = "default_min_phase_duration", with = "seconds")]
    pub min_phase_duration: Duration,

    /// Fixed green duration of an emergency preemption in seconds
    #[serde(default = "default_emergency_duration")]
    pub emergency_duration: f64,

    /// Nominal cycle length used for lane allocation in seconds
    #[serde(default = "default_cycle_length")]
    pub cycle_length: f64,

    /// Duration strategy
    #[serde(default)]
    pub operation_mode: OperationMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_duration: default_base_duration(),
            extension_factor: default_extension_factor(),
            max_extension: default_max_extension(),
            min_phase_duration: default_min_phase_duration(),
            emergency_duration: default_emergency_duration(),
            cycle_length: default_cycle_length(),
            operation_mode: OperationMode::default(),
        }
    }
}

const fn default_base_duration() -> f64 {
    10.0
}

const fn default_extension_factor() -> f64 {
    0.5
}

const fn default_max_extension() -> f64 {
    20.0
}

const fn default_min_phase_duration() -> Duration {
    Duration::from_secs(5)
}

const fn default_emergency_duration() -> f64 {
    15.0
}

const fn default_cycle_length() -> f64 {
    120.0
}

/// Which duration strategy sizes green time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// `base + min(demand * factor, max_extension)`
    #[default]
    Reactive,
    /// Bucket table: <10 → 30s, <20 → 60s, else 90s
    FuzzyReactive,
    /// Delegate to an attached duration predictor
    LearnedDuration,
    /// Reactive baseline, overridden per road by an attached agent
    ExternalAgent,
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reactive => f.write_str("reactive"),
            Self::FuzzyReactive => f.write_str("fuzzy_reactive"),
            Self::LearnedDuration => f.write_str("learned_duration"),
            Self::ExternalAgent => f.write_str("external_agent"),
        }
    }
}

// ============================================================================
// Debounce / Accident Policies
// ============================================================================

/// Cross-cycle debounce behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct DebounceConfig {
    /// Commit emergency phases immediately, ignoring the minimum dwell time
    #[serde(default = "default_emergency_bypass")]
    pub emergency_bypass: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            emergency_bypass: default_emergency_bypass(),
        }
    }
}

const fn default_emergency_bypass() -> bool {
    true
}

/// What an accident does to the signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccidentPolicy {
    /// Report the accident; signals follow the normal phase assignment
    #[default]
    ReportOnly,
    /// Put the whole intersection into an all-way flashing stop
    FlashingStop,
}

// ============================================================================
// School Priority
// ============================================================================

/// School-release priority window for one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct SchoolPriorityConfig {
    /// Intersection the window applies to
    pub intersection: IntersectionId,

    /// Window start (inclusive), `HH:MM` or `HH:MM:SS`
    #[serde(with = "time_of_day")]
    pub start: NaiveTime,

    /// Window end (exclusive); an end before the start wraps past midnight
    #[serde(with = "time_of_day")]
    pub end: NaiveTime,

    /// Adjustment applied inside the window
    #[serde(default)]
    pub policy: SchoolPolicy,
}

impl SchoolPriorityConfig {
    /// Returns `true` if `time` falls within `[start, end)`.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    /// Returns `true` if the window applies to `id` at `time`.
    #[must_use]
    pub fn is_active(&self, id: &IntersectionId, time: NaiveTime) -> bool {
        &self.intersection == id && self.contains(time)
    }
}

/// Adjustment applied inside the school window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchoolPolicy {
    /// Multiply the computed green duration
    Multiplier {
        /// Duration factor
        #[serde(default = "default_school_factor")]
        factor: f64,
    },
    /// Give green to the group with more school buses (ties favor A)
    BusCount,
}

impl Default for SchoolPolicy {
    fn default() -> Self {
        Self::Multiplier {
            factor: default_school_factor(),
        }
    }
}

const fn default_school_factor() -> f64 {
    1.5
}

// ============================================================================
// Intersections / Route
// ============================================================================

/// Roads controlled at one intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct IntersectionLayout {
    /// Controlled roads, in output order
    #[serde(default = "default_roads")]
    pub roads: Vec<RoadId>,
}

impl Default for IntersectionLayout {
    fn default() -> Self {
        Self {
            roads: default_roads(),
        }
    }
}

impl IntersectionLayout {
    /// Returns `true` if at least one road of `group` is controlled.
    #[must_use]
    pub fn serves(&self, group: PhaseGroup) -> bool {
        self.roads.iter().any(|r| group.contains(*r))
    }
}

fn default_roads() -> Vec<RoadId> {
    RoadId::ALL.to_vec()
}

/// One end of a prioritized corridor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RouteEndpoint {
    /// Intersection id (numeric ids define the corridor)
    pub intersection: IntersectionId,
    /// Road to hold green at this end
    pub road: RoadId,
}

/// Corridor served by the built-in route agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RouteConfig {
    /// Where the corridor begins
    pub start: RouteEndpoint,
    /// Where the corridor ends
    pub end: RouteEndpoint,
    /// Duration assigned to every road along the corridor, in seconds
    #[serde(default = "default_route_duration")]
    pub duration: f64,
}

const fn default_route_duration() -> f64 {
    8.0
}

// ============================================================================
// Serde helpers
// ============================================================================

/// (De)serializes a `Duration` from plain seconds or a humantime string.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|_| de::Error::custom(format!("invalid duration: {secs} seconds"))),
            Raw::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| de::Error::custom(format!("invalid duration '{text}': {e}"))),
        }
    }
}

/// (De)serializes a `NaiveTime` as `HH:MM` or `HH:MM:SS`.
pub(crate) mod time_of_day {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        if value.second() == 0 {
            serializer.serialize_str(&value.format("%H:%M").to_string())
        } else {
            serializer.serialize_str(&value.format("%H:%M:%S").to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw).map_err(de::Error::custom)
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
///
/// # Errors
///
/// Returns a message naming the accepted formats if `raw` matches neither.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| format!("invalid time of day '{raw}' (expected HH:MM or HH:MM:SS)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GreenwaveConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GreenwaveConfig::default());
        assert!((config.controller.base_duration - 10.0).abs() < f64::EPSILON);
        assert!((config.controller.extension_factor - 0.5).abs() < f64::EPSILON);
        assert!((config.controller.max_extension - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.controller.min_phase_duration, Duration::from_secs(5));
        assert!((config.controller.emergency_duration - 15.0).abs() < f64::EPSILON);
        assert!((config.controller.cycle_length - 120.0).abs() < f64::EPSILON);
        assert_eq!(config.controller.operation_mode, OperationMode::Reactive);
        assert!(config.debounce.emergency_bypass);
        assert_eq!(config.accident_policy, AccidentPolicy::ReportOnly);
    }

    #[test]
    fn test_min_phase_duration_accepts_seconds_and_humantime() {
        let numeric: ControllerConfig = serde_yaml::from_str("min_phase_duration: 2.5").unwrap();
        assert_eq!(numeric.min_phase_duration, Duration::from_millis(2500));

        let text: ControllerConfig = serde_yaml::from_str("min_phase_duration: 750ms").unwrap();
        assert_eq!(text.min_phase_duration, Duration::from_millis(750));

        let bad = serde_yaml::from_str::<ControllerConfig>("min_phase_duration: soon");
        assert!(bad.is_err());

        let negative = serde_yaml::from_str::<ControllerConfig>("min_phase_duration: -1");
        assert!(negative.is_err());
    }

    #[test]
    fn test_operation_mode_names() {
        let config: ControllerConfig =
            serde_yaml::from_str("operation_mode: fuzzy_reactive").unwrap();
        assert_eq!(config.operation_mode, OperationMode::FuzzyReactive);
        assert_eq!(OperationMode::LearnedDuration.to_string(), "learned_duration");
    }

    #[test]
    fn test_school_policy_defaults_to_multiplier() {
        let yaml = "intersection: \"1\"\nstart: \"15:00\"\nend: \"15:30\"\n";
        let school: SchoolPriorityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(school.policy, SchoolPolicy::Multiplier { factor: 1.5 });
        assert_eq!(school.start, time(15, 0));
    }

    #[test]
    fn test_school_policy_bus_count() {
        let yaml = "intersection: \"2\"\nstart: \"07:45:30\"\nend: \"08:15\"\npolicy:\n  type: bus_count\n";
        let school: SchoolPriorityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(school.policy, SchoolPolicy::BusCount);
        assert_eq!(school.start, NaiveTime::from_hms_opt(7, 45, 30).unwrap());
    }

    #[test]
    fn test_school_window_bounds() {
        let school = SchoolPriorityConfig {
            intersection: IntersectionId::new("1"),
            start: time(15, 0),
            end: time(15, 1),
            policy: SchoolPolicy::BusCount,
        };
        assert!(school.contains(time(15, 0)));
        assert!(school.contains(NaiveTime::from_hms_opt(15, 0, 59).unwrap()));
        assert!(!school.contains(time(15, 1)));
        assert!(!school.contains(time(14, 59)));
        assert!(school.is_active(&IntersectionId::new("1"), time(15, 0)));
        assert!(!school.is_active(&IntersectionId::new("2"), time(15, 0)));
    }

    #[test]
    fn test_school_window_wraps_midnight() {
        let school = SchoolPriorityConfig {
            intersection: IntersectionId::new("1"),
            start: time(23, 0),
            end: time(1, 0),
            policy: SchoolPolicy::default(),
        };
        assert!(school.contains(time(23, 30)));
        assert!(school.contains(time(0, 30)));
        assert!(!school.contains(time(12, 0)));
    }

    #[test]
    fn test_time_of_day_roundtrip_format() {
        let school = SchoolPriorityConfig {
            intersection: IntersectionId::new("1"),
            start: time(15, 0),
            end: NaiveTime::from_hms_opt(15, 0, 30).unwrap(),
            policy: SchoolPolicy::BusCount,
        };
        let yaml = serde_yaml::to_string(&school).unwrap();
        assert!(yaml.contains("15:00"));
        assert!(yaml.contains("15:00:30"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = serde_yaml::from_str::<GreenwaveConfig>("controler: {}");
        assert!(result.is_err());
    }

    #[test]
    fn test_roads_of_defaults_to_all() {
        let yaml = "intersections:\n  \"1\":\n    roads: [north, south, east]\n  \"2\": {}\n";
        let config: GreenwaveConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.roads_of(&IntersectionId::new("1")),
            vec![RoadId::North, RoadId::South, RoadId::East]
        );
        assert_eq!(config.roads_of(&IntersectionId::new("2")), RoadId::ALL.to_vec());
        assert_eq!(config.roads_of(&IntersectionId::new("9")), RoadId::ALL.to_vec());
        assert!(config.knows_intersection(&IntersectionId::new("2")));
        assert!(!config.knows_intersection(&IntersectionId::new("9")));
    }

    #[test]
    fn test_layout_serves_groups() {
        let layout = IntersectionLayout {
            roads: vec![RoadId::North, RoadId::South],
        };
        assert!(layout.serves(PhaseGroup::A));
        assert!(!layout.serves(PhaseGroup::B));
    }

    #[test]
    fn test_route_duration_default() {
        let yaml = "start: { intersection: \"1\", road: north }\nend: { intersection: \"6\", road: south }\n";
        let route: RouteConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((route.duration - 8.0).abs() < f64::EPSILON);
        assert_eq!(route.end.road, RoadId::South);
    }
}
