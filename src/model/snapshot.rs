//! Per-cycle inputs: sensed counts, predicted counts and the cycle clock.
//!
//! Snapshots are produced by external collaborators (detector, forecaster)
//! and are immutable for the duration of a cycle.

use std::time::Duration;

use chrono::NaiveTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::road::{IntersectionId, PhaseGroup, RoadId};

/// Sensed counts on one road for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadCount {
    /// Passenger vehicles
    pub car: u32,
    /// Emergency vehicles
    pub ambulance: u32,
    /// School buses
    pub schoolbus: u32,
    /// Detected accidents
    pub accident: u32,
}

impl RoadCount {
    /// Creates a count with only cars set.
    #[must_use]
    pub const fn cars(car: u32) -> Self {
        Self {
            car,
            ambulance: 0,
            schoolbus: 0,
            accident: 0,
        }
    }

    /// Demand used by the forced non-empty tier (cars plus school buses).
    #[must_use]
    pub fn occupancy(&self) -> u64 {
        u64::from(self.car) + u64::from(self.schoolbus)
    }
}

/// Forecast count on one road for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictedCount {
    /// Forecast passenger vehicles
    pub car: f64,
}

impl PredictedCount {
    /// Creates a forecast of `car` vehicles.
    #[must_use]
    pub const fn new(car: f64) -> Self {
        Self { car }
    }
}

/// Sensed counts for every road of one intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntersectionSnapshot {
    roads: IndexMap<RoadId, RoadCount>,
}

impl IntersectionSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, road: RoadId, count: RoadCount) -> Self {
        self.roads.insert(road, count);
        self
    }

    /// Inserts or replaces the count for `road`.
    pub fn insert(&mut self, road: RoadId, count: RoadCount) {
        self.roads.insert(road, count);
    }

    /// Returns the count for `road` if the detector reported it.
    #[must_use]
    pub fn get(&self, road: RoadId) -> Option<&RoadCount> {
        self.roads.get(&road)
    }

    /// Returns the count for `road`, treating a missing road as all zero.
    #[must_use]
    pub fn count(&self, road: RoadId) -> RoadCount {
        self.roads.get(&road).copied().unwrap_or_default()
    }

    /// Iterates over reported roads in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RoadId, &RoadCount)> {
        self.roads.iter().map(|(road, count)| (*road, count))
    }

    /// Sum of cars over the roads of `group`.
    #[must_use]
    pub fn cars(&self, group: PhaseGroup) -> u64 {
        group
            .roads()
            .iter()
            .map(|r| u64::from(self.count(*r).car))
            .sum()
    }

    /// Sum of cars plus school buses over the roads of `group`.
    #[must_use]
    pub fn occupancy(&self, group: PhaseGroup) -> u64 {
        group.roads().iter().map(|r| self.count(*r).occupancy()).sum()
    }

    /// Sum of school buses over the roads of `group`.
    #[must_use]
    pub fn schoolbuses(&self, group: PhaseGroup) -> u64 {
        group
            .roads()
            .iter()
            .map(|r| u64::from(self.count(*r).schoolbus))
            .sum()
    }

    /// Sum of cars over all four roads.
    #[must_use]
    pub fn total_cars(&self) -> u64 {
        RoadId::ALL
            .iter()
            .map(|r| u64::from(self.count(*r).car))
            .sum()
    }
}

impl FromIterator<(RoadId, RoadCount)> for IntersectionSnapshot {
    fn from_iter<T: IntoIterator<Item = (RoadId, RoadCount)>>(iter: T) -> Self {
        Self {
            roads: iter.into_iter().collect(),
        }
    }
}

/// Forecast counts for every road of one intersection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntersectionPrediction {
    roads: IndexMap<RoadId, PredictedCount>,
}

impl IntersectionPrediction {
    /// Creates an empty prediction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, road: RoadId, car: f64) -> Self {
        self.roads.insert(road, PredictedCount::new(car));
        self
    }

    /// Returns the forecast for `road` if one was provided.
    #[must_use]
    pub fn get(&self, road: RoadId) -> Option<&PredictedCount> {
        self.roads.get(&road)
    }

    /// Sum of forecast cars over the roads of `group`.
    ///
    /// Missing roads count as zero, as do non-finite or negative forecasts.
    #[must_use]
    pub fn cars(&self, group: PhaseGroup) -> f64 {
        group
            .roads()
            .iter()
            .filter_map(|r| self.roads.get(r))
            .map(|p| if p.car.is_finite() { p.car.max(0.0) } else { 0.0 })
            .sum()
    }
}

impl FromIterator<(RoadId, PredictedCount)> for IntersectionPrediction {
    fn from_iter<T: IntoIterator<Item = (RoadId, PredictedCount)>>(iter: T) -> Self {
        Self {
            roads: iter.into_iter().collect(),
        }
    }
}

/// Sensed counts for every intersection in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleSnapshot {
    intersections: IndexMap<IntersectionId, IntersectionSnapshot>,
}

impl CycleSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, id: impl Into<IntersectionId>, snapshot: IntersectionSnapshot) -> Self {
        self.intersections.insert(id.into(), snapshot);
        self
    }

    /// Returns the snapshot for one intersection.
    #[must_use]
    pub fn get(&self, id: &IntersectionId) -> Option<&IntersectionSnapshot> {
        self.intersections.get(id)
    }

    /// Iterates over intersections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&IntersectionId, &IntersectionSnapshot)> {
        self.intersections.iter()
    }

    /// Number of intersections reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    /// Returns `true` if no intersection was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }
}

/// Forecast counts for every intersection in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CyclePrediction {
    intersections: IndexMap<IntersectionId, IntersectionPrediction>,
}

impl CyclePrediction {
    /// Creates an empty prediction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(
        mut self,
        id: impl Into<IntersectionId>,
        prediction: IntersectionPrediction,
    ) -> Self {
        self.intersections.insert(id.into(), prediction);
        self
    }

    /// Returns the prediction for one intersection.
    #[must_use]
    pub fn get(&self, id: &IntersectionId) -> Option<&IntersectionPrediction> {
        self.intersections.get(id)
    }

    /// Iterates over intersections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&IntersectionId, &IntersectionPrediction)> {
        self.intersections.iter()
    }

    /// Number of intersections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    /// Returns `true` if no intersection was forecast.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }
}

/// Clock readings for one cycle.
///
/// `monotonic` drives debouncing; `time_of_day` drives the school window
/// and is handed to the learned duration predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTime {
    /// Time since the controller's epoch (never goes backwards in practice)
    pub monotonic: Duration,
    /// Local wall-clock time of day
    pub time_of_day: NaiveTime,
}

impl CycleTime {
    /// Creates a cycle time from both readings.
    #[must_use]
    pub const fn new(monotonic: Duration, time_of_day: NaiveTime) -> Self {
        Self {
            monotonic,
            time_of_day,
        }
    }

    /// Creates a cycle time at `secs` seconds with the wall clock at midnight.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs), NaiveTime::MIN)
    }

    /// Returns a copy with the wall clock set to `time_of_day`.
    #[must_use]
    pub const fn at(self, time_of_day: NaiveTime) -> Self {
        Self {
            monotonic: self.monotonic,
            time_of_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntersectionSnapshot {
        IntersectionSnapshot::new()
            .with(RoadId::North, RoadCount::cars(3))
            .with(
                RoadId::South,
                RoadCount {
                    car: 2,
                    schoolbus: 1,
                    ..RoadCount::default()
                },
            )
            .with(RoadId::East, RoadCount::cars(7))
    }

    #[test]
    fn test_missing_road_counts_as_zero() {
        let snap = sample();
        assert!(snap.get(RoadId::West).is_none());
        assert_eq!(snap.count(RoadId::West), RoadCount::default());
    }

    #[test]
    fn test_group_sums() {
        let snap = sample();
        assert_eq!(snap.cars(PhaseGroup::A), 5);
        assert_eq!(snap.cars(PhaseGroup::B), 7);
        assert_eq!(snap.occupancy(PhaseGroup::A), 6);
        assert_eq!(snap.schoolbuses(PhaseGroup::A), 1);
        assert_eq!(snap.total_cars(), 12);
    }

    #[test]
    fn test_prediction_sums_with_gaps() {
        let pred = IntersectionPrediction::new()
            .with(RoadId::North, 1.5)
            .with(RoadId::East, 4.0);
        assert!((pred.cars(PhaseGroup::A) - 1.5).abs() < f64::EPSILON);
        assert!((pred.cars(PhaseGroup::B) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prediction_ignores_bad_forecasts() {
        let pred = IntersectionPrediction::new()
            .with(RoadId::North, f64::NAN)
            .with(RoadId::South, -3.0)
            .with(RoadId::East, f64::INFINITY)
            .with(RoadId::West, 2.0);
        assert!(pred.cars(PhaseGroup::A).abs() < f64::EPSILON);
        assert!((pred.cars(PhaseGroup::B) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_deserializes_from_nested_maps() {
        let yaml = "\"1\":\n  north: { car: 4 }\n  east: { car: 1, ambulance: 1 }\n";
        let snap: CycleSnapshot = serde_yaml::from_str(yaml).unwrap();
        let inter = snap.get(&IntersectionId::new("1")).unwrap();
        assert_eq!(inter.count(RoadId::North).car, 4);
        assert_eq!(inter.count(RoadId::East).ambulance, 1);
        assert_eq!(inter.count(RoadId::East).accident, 0);
    }

    #[test]
    fn test_cycle_time_builders() {
        let t = CycleTime::from_secs(6);
        assert_eq!(t.monotonic, Duration::from_secs(6));
        assert_eq!(t.time_of_day, NaiveTime::MIN);
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(t.at(noon).time_of_day, noon);
    }
}
