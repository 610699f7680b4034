//! Green-duration sizing.
//!
//! A [`DurationStrategy`] turns the effective demand of the chosen group
//! into a green duration and decides how groups compare during adaptive
//! selection. The controller picks one implementation from
//! `controller.operation_mode`, so the resolver never branches on which
//! optional hooks happen to be attached.
//!
//! Lane allocation and congestion classification live here too; both are
//! informational and never influence the phase.

use std::sync::Arc;

use crate::config::schema::ControllerConfig;
use crate::error::HookError;
use crate::model::{CongestionLevel, CycleTime, IntersectionSnapshot, PhaseGroup, Provenance, RoadId};

use super::hooks::DurationPredictor;

/// Sizes green time for the group the resolver selected.
pub trait DurationStrategy: Send + Sync {
    /// Provenance tag attached to durations from this strategy.
    fn provenance(&self) -> Provenance;

    /// Score used to compare groups in the adaptive tier.
    ///
    /// The larger score wins; ties favor group A.
    fn demand_score(&self, effective_demand: f64) -> f64 {
        effective_demand
    }

    /// Returns the green duration in seconds for `group`.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] when the strategy delegates to a hook that
    /// is missing or failed. The caller falls back to [`ReactiveDuration`].
    fn duration(
        &self,
        group: PhaseGroup,
        effective_demand: f64,
        config: &ControllerConfig,
        time: &CycleTime,
    ) -> Result<f64, HookError>;
}

/// `base_duration + min(effective_demand * extension_factor, max_extension)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactiveDuration;

impl ReactiveDuration {
    /// Evaluates the reactive formula.
    #[must_use]
    pub fn compute(effective_demand: f64, config: &ControllerConfig) -> f64 {
        let extension = (effective_demand * config.extension_factor).min(config.max_extension);
        config.base_duration + extension
    }
}

impl DurationStrategy for ReactiveDuration {
    fn provenance(&self) -> Provenance {
        Provenance::Reactive
    }

    fn duration(
        &self,
        _group: PhaseGroup,
        effective_demand: f64,
        config: &ControllerConfig,
        _time: &CycleTime,
    ) -> Result<f64, HookError> {
        Ok(Self::compute(effective_demand, config))
    }
}

/// Fixed bucket table; also used to compare groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyDuration;

/// Maps effective demand through the bucket table: `<10 → 30`, `<20 → 60`, else `90`.
#[must_use]
pub fn fuzzy_bucket(effective_demand: f64) -> f64 {
    if effective_demand < 10.0 {
        30.0
    } else if effective_demand < 20.0 {
        60.0
    } else {
        90.0
    }
}

impl DurationStrategy for FuzzyDuration {
    fn provenance(&self) -> Provenance {
        Provenance::Fuzzy
    }

    fn demand_score(&self, effective_demand: f64) -> f64 {
        fuzzy_bucket(effective_demand)
    }

    fn duration(
        &self,
        _group: PhaseGroup,
        effective_demand: f64,
        _config: &ControllerConfig,
        _time: &CycleTime,
    ) -> Result<f64, HookError> {
        Ok(fuzzy_bucket(effective_demand))
    }
}

/// Delegates to an attached [`DurationPredictor`].
///
/// The returned value is not range-checked here; the resolver replaces
/// non-finite or negative values and flags them.
#[derive(Clone, Default)]
pub struct LearnedDuration {
    predictor: Option<Arc<dyn DurationPredictor>>,
}

impl LearnedDuration {
    /// Creates the strategy around an optional predictor.
    #[must_use]
    pub fn new(predictor: Option<Arc<dyn DurationPredictor>>) -> Self {
        Self { predictor }
    }
}

impl std::fmt::Debug for LearnedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnedDuration")
            .field("attached", &self.predictor.is_some())
            .finish()
    }
}

impl DurationStrategy for LearnedDuration {
    fn provenance(&self) -> Provenance {
        Provenance::LearnedDuration
    }

    fn duration(
        &self,
        _group: PhaseGroup,
        effective_demand: f64,
        _config: &ControllerConfig,
        time: &CycleTime,
    ) -> Result<f64, HookError> {
        let predictor = self
            .predictor
            .as_ref()
            .ok_or_else(|| HookError::Unavailable("no duration predictor attached".to_string()))?;
        predictor.predict(effective_demand, time)
    }
}

// ============================================================================
// Lane allocation / congestion
// ============================================================================

/// Proportional share of the nominal cycle per group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneAllocation {
    /// Seconds allotted to group A
    pub a: f64,
    /// Seconds allotted to group B
    pub b: f64,
}

impl LaneAllocation {
    /// Returns the share of `group`.
    #[must_use]
    pub const fn of(&self, group: PhaseGroup) -> f64 {
        match group {
            PhaseGroup::A => self.a,
            PhaseGroup::B => self.b,
        }
    }

    /// Returns the share of the group `road` belongs to.
    #[must_use]
    pub const fn for_road(&self, road: RoadId) -> f64 {
        self.of(road.group())
    }
}

/// Splits `cycle_length` between the groups by their busiest road.
///
/// Each group is weighted by `max(car)` over its two roads; with no cars
/// at all the cycle is split evenly.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn lane_allocation(snapshot: &IntersectionSnapshot, cycle_length: f64) -> LaneAllocation {
    let busiest = |group: PhaseGroup| {
        group
            .roads()
            .iter()
            .map(|r| snapshot.count(*r).car)
            .max()
            .unwrap_or(0)
    };

    let a = u64::from(busiest(PhaseGroup::A));
    let b = u64::from(busiest(PhaseGroup::B));
    let total = a + b;

    if total == 0 {
        let half = cycle_length / 2.0;
        return LaneAllocation { a: half, b: half };
    }

    LaneAllocation {
        a: a as f64 / total as f64 * cycle_length,
        b: b as f64 / total as f64 * cycle_length,
    }
}

/// Classifies total cars: `>50 → high`, `>20 → medium`, else `low`.
#[must_use]
pub const fn classify_congestion(total_cars: u64) -> CongestionLevel {
    if total_cars > 50 {
        CongestionLevel::High
    } else if total_cars > 20 {
        CongestionLevel::Medium
    } else {
        CongestionLevel::Low
    }
}
