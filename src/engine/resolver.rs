//! Priority resolver.
//!
//! Picks a phase and a green duration for one intersection from its
//! snapshot. Tiers are evaluated in strict order and the first match wins:
//!
//! 1. Emergency: an ambulance on any road preempts for that road's group
//! 2. Accident stop: only under the `flashing_stop` policy
//! 3. Forced non-empty: exactly one group has vehicles
//! 4. School priority: bus-count policy inside the school window
//! 5. Adaptive: larger blended demand (or fuzzy bucket); ties favor A
//!
//! Accident roads are reported for every decision. Resolution is a pure
//! function of its inputs; hook problems come back as [`CycleIssue`]s
//! with a reactive fallback already applied.

use tracing::debug;

use crate::config::schema::{AccidentPolicy, GreenwaveConfig, SchoolPolicy, SchoolPriorityConfig};
use crate::error::{CycleIssue, HookKind};
use crate::model::{
    ActivePhase, CycleTime, DecisionTier, IntersectionId, IntersectionPrediction,
    IntersectionSnapshot, PhaseDecision, PhaseDemand, PhaseGroup, Provenance, RoadId,
};

use super::duration::{DurationStrategy, ReactiveDuration};

/// A decision plus the problems hit while making it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The decision
    pub decision: PhaseDecision,
    /// Non-fatal problems (hook failures, invalid durations)
    pub issues: Vec<CycleIssue>,
}

/// Evaluates the tier rules against one configuration and duration strategy.
#[derive(Clone, Copy)]
pub struct PriorityResolver<'a> {
    config: &'a GreenwaveConfig,
    strategy: &'a dyn DurationStrategy,
}

impl std::fmt::Debug for PriorityResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityResolver")
            .field("provenance", &self.strategy.provenance())
            .finish_non_exhaustive()
    }
}

impl<'a> PriorityResolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(config: &'a GreenwaveConfig, strategy: &'a dyn DurationStrategy) -> Self {
        Self { config, strategy }
    }

    /// Resolves the phase for intersection `id`.
    ///
    /// Roads absent from `snapshot` or `prediction` count as zero.
    #[must_use]
    pub fn resolve(
        &self,
        id: &IntersectionId,
        snapshot: &IntersectionSnapshot,
        prediction: &IntersectionPrediction,
        time: &CycleTime,
    ) -> Resolution {
        let controller = &self.config.controller;
        let demand = PhaseDemand {
            a: effective_demand(snapshot, prediction, PhaseGroup::A),
            b: effective_demand(snapshot, prediction, PhaseGroup::B),
        };
        let accidents = accident_roads(snapshot);
        let school = self
            .config
            .school_priority
            .as_ref()
            .filter(|s| self.config.knows_intersection(&s.intersection))
            .filter(|s| s.is_active(id, time.time_of_day));

        let base = PhaseDecision {
            intersection: id.clone(),
            active: ActivePhase::Group(PhaseGroup::A),
            duration: controller.base_duration,
            tier: DecisionTier::Adaptive,
            provenance: Provenance::Reactive,
            demand,
            accidents,
            school_priority: false,
        };

        if let Some(group) = emergency_group(snapshot) {
            debug!(intersection = %id, %group, "emergency preemption");
            return Resolution {
                decision: PhaseDecision {
                    active: ActivePhase::Emergency(group),
                    duration: controller.emergency_duration,
                    tier: DecisionTier::Emergency,
                    ..base
                },
                issues: Vec::new(),
            };
        }

        if self.config.accident_policy == AccidentPolicy::FlashingStop && !base.accidents.is_empty()
        {
            debug!(intersection = %id, roads = ?base.accidents, "accident stop");
            return Resolution {
                decision: PhaseDecision {
                    active: ActivePhase::AccidentStop,
                    tier: DecisionTier::AccidentStop,
                    ..base
                },
                issues: Vec::new(),
            };
        }

        let (group, tier) = self.select_group(snapshot, &demand, school);

        let mut issues = Vec::new();
        let (mut duration, provenance) =
            self.size(id, group, demand.of(group), time, &mut issues);

        let mut school_priority = tier == DecisionTier::SchoolPriority;
        if let Some(SchoolPriorityConfig {
            policy: SchoolPolicy::Multiplier { factor },
            ..
        }) = school
        {
            duration *= factor;
            school_priority = true;
        }

        debug!(
            intersection = %id,
            %group,
            ?tier,
            duration,
            demand_a = demand.a,
            demand_b = demand.b,
            "phase resolved"
        );

        Resolution {
            decision: PhaseDecision {
                active: ActivePhase::Group(group),
                duration,
                tier,
                provenance,
                school_priority,
                ..base
            },
            issues,
        }
    }

    /// Tiers 3 to 5.
    fn select_group(
        &self,
        snapshot: &IntersectionSnapshot,
        demand: &PhaseDemand,
        school: Option<&SchoolPriorityConfig>,
    ) -> (PhaseGroup, DecisionTier) {
        if let Some(group) = forced_group(snapshot) {
            return (group, DecisionTier::ForcedNonEmpty);
        }

        if school.is_some_and(|s| s.policy == SchoolPolicy::BusCount) {
            return (bus_count_group(snapshot), DecisionTier::SchoolPriority);
        }

        let score_a = self.strategy.demand_score(demand.a);
        let score_b = self.strategy.demand_score(demand.b);
        let group = if score_a >= score_b {
            PhaseGroup::A
        } else {
            PhaseGroup::B
        };
        (group, DecisionTier::Adaptive)
    }

    /// Runs the duration strategy, falling back to the reactive formula.
    fn size(
        &self,
        id: &IntersectionId,
        group: PhaseGroup,
        effective: f64,
        time: &CycleTime,
        issues: &mut Vec<CycleIssue>,
    ) -> (f64, Provenance) {
        let controller = &self.config.controller;
        match self.strategy.duration(group, effective, controller, time) {
            Ok(value) if value.is_finite() && value >= 0.0 => (value, self.strategy.provenance()),
            Ok(value) => {
                issues.push(CycleIssue::InvalidExternalDuration {
                    intersection: id.clone(),
                    road: None,
                    value: value.to_string(),
                });
                (controller.base_duration, Provenance::Reactive)
            }
            Err(err) => {
                issues.push(CycleIssue::HookUnavailable {
                    hook: HookKind::DurationPredictor,
                    reason: err.to_string(),
                });
                (
                    ReactiveDuration::compute(effective, controller),
                    Provenance::Reactive,
                )
            }
        }
    }
}

// ============================================================================
// Tier helpers
// ============================================================================

/// `0.5 * sensed cars + 0.5 * forecast cars` over the roads of `group`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn effective_demand(
    snapshot: &IntersectionSnapshot,
    prediction: &IntersectionPrediction,
    group: PhaseGroup,
) -> f64 {
    0.5 * snapshot.cars(group) as f64 + 0.5 * prediction.cars(group)
}

/// Group of the first road (north, south, east, west) carrying an ambulance.
#[must_use]
pub fn emergency_group(snapshot: &IntersectionSnapshot) -> Option<PhaseGroup> {
    RoadId::ALL
        .into_iter()
        .find(|road| snapshot.count(*road).ambulance > 0)
        .map(RoadId::group)
}

/// Roads reporting an accident, in north, south, east, west order.
#[must_use]
pub fn accident_roads(snapshot: &IntersectionSnapshot) -> Vec<RoadId> {
    RoadId::ALL
        .into_iter()
        .filter(|road| snapshot.count(*road).accident > 0)
        .collect()
}

/// The only group with cars or school buses, if exactly one has any.
#[must_use]
pub fn forced_group(snapshot: &IntersectionSnapshot) -> Option<PhaseGroup> {
    let a = snapshot.occupancy(PhaseGroup::A);
    let b = snapshot.occupancy(PhaseGroup::B);
    match (a, b) {
        (0, b) if b > 0 => Some(PhaseGroup::B),
        (a, 0) if a > 0 => Some(PhaseGroup::A),
        _ => None,
    }
}

/// Group with more school buses; ties favor A.
#[must_use]
pub fn bus_count_group(snapshot: &IntersectionSnapshot) -> PhaseGroup {
    if snapshot.schoolbuses(PhaseGroup::A) >= snapshot.schoolbuses(PhaseGroup::B) {
        PhaseGroup::A
    } else {
        PhaseGroup::B
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::OperationMode;
    use crate::engine::duration::{FuzzyDuration, LearnedDuration};
    use crate::engine::hooks::DurationPredictor;
    use crate::error::HookError;
    use crate::model::{Phase, RoadCount};
    use chrono::NaiveTime;
    use std::sync::Arc;

    fn id() -> IntersectionId {
        IntersectionId::new("1")
    }

    fn cars(n: u32, s: u32, e: u32, w: u32) -> IntersectionSnapshot {
        IntersectionSnapshot::new()
            .with(RoadId::North, RoadCount::cars(n))
            .with(RoadId::South, RoadCount::cars(s))
            .with(RoadId::East, RoadCount::cars(e))
            .with(RoadId::West, RoadCount::cars(w))
    }

    fn with_road(snapshot: IntersectionSnapshot, road: RoadId, count: RoadCount) -> IntersectionSnapshot {
        snapshot.with(road, count)
    }

    fn at(h: u32, m: u32) -> CycleTime {
        CycleTime::from_secs(0).at(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn resolve_with(
        config: &GreenwaveConfig,
        strategy: &dyn DurationStrategy,
        snapshot: &IntersectionSnapshot,
        prediction: &IntersectionPrediction,
        time: &CycleTime,
    ) -> Resolution {
        PriorityResolver::new(config, strategy).resolve(&id(), snapshot, prediction, time)
    }

    fn resolve(snapshot: &IntersectionSnapshot) -> PhaseDecision {
        resolve_with(
            &GreenwaveConfig::default(),
            &ReactiveDuration,
            snapshot,
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        )
        .decision
    }

    fn school_config(policy: SchoolPolicy) -> GreenwaveConfig {
        let yaml = format!(
            "school_priority:\n  intersection: \"1\"\n  start: \"15:00\"\n  end: \"15:30\"\n  policy: {}\n",
            serde_json::to_string(&policy).unwrap()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_emergency_dominates_demand() {
        let snap = with_road(
            cars(100, 100, 0, 0),
            RoadId::West,
            RoadCount {
                ambulance: 1,
                ..RoadCount::default()
            },
        );
        let d = resolve(&snap);
        assert_eq!(d.active, ActivePhase::Emergency(PhaseGroup::B));
        assert_eq!(d.phase(), Phase::Emergency);
        assert_eq!(d.emergency_phase(), Some(PhaseGroup::B));
        assert_eq!(d.tier, DecisionTier::Emergency);
        assert!((d.duration - 15.0).abs() < f64::EPSILON);
        assert_eq!(d.provenance, Provenance::Reactive);
    }

    #[test]
    fn test_emergency_tie_break_follows_road_order() {
        let amb = RoadCount {
            ambulance: 1,
            ..RoadCount::default()
        };
        let snap = IntersectionSnapshot::new()
            .with(RoadId::East, amb)
            .with(RoadId::South, amb);
        assert_eq!(emergency_group(&snap), Some(PhaseGroup::A));
    }

    #[test]
    fn test_forced_non_empty_ignores_predictions() {
        let snap = cars(0, 0, 5, 0);
        let prediction = IntersectionPrediction::new()
            .with(RoadId::North, 500.0)
            .with(RoadId::South, 500.0);
        let r = resolve_with(
            &GreenwaveConfig::default(),
            &ReactiveDuration,
            &snap,
            &prediction,
            &CycleTime::from_secs(0),
        );
        assert_eq!(r.decision.phase(), Phase::B);
        assert_eq!(r.decision.tier, DecisionTier::ForcedNonEmpty);
        // effective(B) = 0.5 * 5 = 2.5 → 10 + 1.25
        assert!((r.decision.duration - 11.25).abs() < 1e-9);
    }

    #[test]
    fn test_school_buses_count_for_forced_tier() {
        let snap = IntersectionSnapshot::new().with(
            RoadId::North,
            RoadCount {
                schoolbus: 1,
                ..RoadCount::default()
            },
        );
        assert_eq!(forced_group(&snap), Some(PhaseGroup::A));
        assert_eq!(forced_group(&IntersectionSnapshot::new()), None);
        assert_eq!(forced_group(&cars(1, 0, 1, 0)), None);
    }

    #[test]
    fn test_adaptive_blends_prediction() {
        let snap = cars(4, 0, 6, 0);
        let prediction = IntersectionPrediction::new().with(RoadId::South, 10.0);
        let r = resolve_with(
            &GreenwaveConfig::default(),
            &ReactiveDuration,
            &snap,
            &prediction,
            &CycleTime::from_secs(0),
        );
        // A = 0.5*4 + 0.5*10 = 7, B = 3
        assert_eq!(r.decision.phase(), Phase::A);
        assert_eq!(r.decision.tier, DecisionTier::Adaptive);
        assert!((r.decision.demand.a - 7.0).abs() < f64::EPSILON);
        assert!((r.decision.demand.b - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_adaptive_tie_favors_a() {
        let d = resolve(&cars(3, 0, 0, 3));
        assert_eq!(d.phase(), Phase::A);
        let d = resolve(&IntersectionSnapshot::new());
        assert_eq!(d.phase(), Phase::A);
        assert_eq!(d.tier, DecisionTier::Adaptive);
    }

    #[test]
    fn test_duration_formula() {
        // effective(A) = 0.5*60 = 30 → 10 + min(15, 20) = 25
        let d = resolve(&cars(60, 0, 1, 0));
        assert_eq!(d.phase(), Phase::A);
        assert!((d.duration - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fuzzy_bucket_tie_favors_a() {
        let mut config = GreenwaveConfig::default();
        config.controller.operation_mode = OperationMode::FuzzyReactive;
        // A = 6, B = 8: same bucket (30) → A
        let r = resolve_with(
            &config,
            &FuzzyDuration,
            &cars(12, 0, 16, 0),
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert_eq!(r.decision.phase(), Phase::A);
        assert!((r.decision.duration - 30.0).abs() < f64::EPSILON);
        assert_eq!(r.decision.provenance, Provenance::Fuzzy);

        // A = 6, B = 12: B's bucket is larger
        let r = resolve_with(
            &config,
            &FuzzyDuration,
            &cars(12, 0, 24, 0),
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert_eq!(r.decision.phase(), Phase::B);
        assert!((r.decision.duration - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accident_report_only() {
        let snap = with_road(
            cars(2, 0, 9, 0),
            RoadId::East,
            RoadCount {
                car: 9,
                accident: 1,
                ..RoadCount::default()
            },
        );
        let d = resolve(&snap);
        assert_eq!(d.phase(), Phase::B);
        assert_eq!(d.accidents, vec![RoadId::East]);
    }

    #[test]
    fn test_accident_flashing_stop_policy() {
        let mut config = GreenwaveConfig::default();
        config.accident_policy = AccidentPolicy::FlashingStop;
        let snap = with_road(
            cars(2, 0, 9, 0),
            RoadId::South,
            RoadCount {
                accident: 2,
                ..RoadCount::default()
            },
        );
        let r = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert_eq!(r.decision.active, ActivePhase::AccidentStop);
        assert_eq!(r.decision.phase(), Phase::AccidentReported);
        assert!((r.decision.duration - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_emergency_beats_flashing_stop() {
        let mut config = GreenwaveConfig::default();
        config.accident_policy = AccidentPolicy::FlashingStop;
        let snap = IntersectionSnapshot::new()
            .with(
                RoadId::North,
                RoadCount {
                    accident: 1,
                    ..RoadCount::default()
                },
            )
            .with(
                RoadId::East,
                RoadCount {
                    ambulance: 1,
                    ..RoadCount::default()
                },
            );
        let r = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert_eq!(r.decision.active, ActivePhase::Emergency(PhaseGroup::B));
        assert_eq!(r.decision.accidents, vec![RoadId::North]);
    }

    #[test]
    fn test_school_multiplier_inside_window() {
        let config = school_config(SchoolPolicy::Multiplier { factor: 2.0 });
        let snap = cars(60, 0, 1, 0);
        let inside = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &at(15, 10),
        );
        assert!((inside.decision.duration - 50.0).abs() < f64::EPSILON);
        assert!(inside.decision.school_priority);

        let outside = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &at(15, 30),
        );
        assert!((outside.decision.duration - 25.0).abs() < f64::EPSILON);
        assert!(!outside.decision.school_priority);
    }

    #[test]
    fn test_school_multiplier_skips_emergency() {
        let config = school_config(SchoolPolicy::Multiplier { factor: 2.0 });
        let snap = IntersectionSnapshot::new().with(
            RoadId::North,
            RoadCount {
                ambulance: 1,
                ..RoadCount::default()
            },
        );
        let r = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &at(15, 10),
        );
        assert!((r.decision.duration - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_school_bus_count_policy() {
        let config = school_config(SchoolPolicy::BusCount);
        let snap = cars(40, 0, 1, 0).with(
            RoadId::West,
            RoadCount {
                car: 1,
                schoolbus: 2,
                ..RoadCount::default()
            },
        );
        let r = resolve_with(
            &config,
            &ReactiveDuration,
            &snap,
            &IntersectionPrediction::new(),
            &at(15, 0),
        );
        assert_eq!(r.decision.phase(), Phase::B);
        assert_eq!(r.decision.tier, DecisionTier::SchoolPriority);
        assert!(r.decision.school_priority);

        // Other intersections are unaffected
        let other = PriorityResolver::new(&config, &ReactiveDuration).resolve(
            &IntersectionId::new("2"),
            &snap,
            &IntersectionPrediction::new(),
            &at(15, 0),
        );
        assert_eq!(other.decision.phase(), Phase::A);
    }

    #[test]
    fn test_bus_count_tie_favors_a() {
        assert_eq!(bus_count_group(&IntersectionSnapshot::new()), PhaseGroup::A);
    }

    #[test]
    fn test_predictor_failure_falls_back_to_reactive() {
        let predictor: Arc<dyn DurationPredictor> =
            Arc::new(|_: f64, _: &CycleTime| -> Result<f64, HookError> {
                Err(HookError::Failed("model not loaded".into()))
            });
        let strategy = LearnedDuration::new(Some(predictor));
        let r = resolve_with(
            &GreenwaveConfig::default(),
            &strategy,
            &cars(60, 0, 1, 0),
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert!((r.decision.duration - 25.0).abs() < f64::EPSILON);
        assert_eq!(r.decision.provenance, Provenance::Reactive);
        assert_eq!(r.issues.len(), 1);
        assert!(matches!(
            r.issues[0],
            CycleIssue::HookUnavailable {
                hook: HookKind::DurationPredictor,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_predicted_duration_uses_base() {
        for bad in [f64::NAN, f64::INFINITY, -4.0] {
            let predictor: Arc<dyn DurationPredictor> =
                Arc::new(move |_: f64, _: &CycleTime| -> Result<f64, HookError> { Ok(bad) });
            let strategy = LearnedDuration::new(Some(predictor));
            let r = resolve_with(
                &GreenwaveConfig::default(),
                &strategy,
                &cars(60, 0, 1, 0),
                &IntersectionPrediction::new(),
                &CycleTime::from_secs(0),
            );
            assert!((r.decision.duration - 10.0).abs() < f64::EPSILON);
            assert!(matches!(
                r.issues[0],
                CycleIssue::InvalidExternalDuration { road: None, .. }
            ));
        }
    }

    #[test]
    fn test_learned_duration_passes_through_large_values() {
        let predictor: Arc<dyn DurationPredictor> =
            Arc::new(|_: f64, _: &CycleTime| -> Result<f64, HookError> { Ok(900.0) });
        let strategy = LearnedDuration::new(Some(predictor));
        let r = resolve_with(
            &GreenwaveConfig::default(),
            &strategy,
            &cars(1, 0, 0, 0),
            &IntersectionPrediction::new(),
            &CycleTime::from_secs(0),
        );
        assert!((r.decision.duration - 900.0).abs() < f64::EPSILON);
        assert_eq!(r.decision.provenance, Provenance::LearnedDuration);
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let snap = cars(7, 3, 9, 1);
        let prediction = IntersectionPrediction::new().with(RoadId::East, 2.5);
        let config = GreenwaveConfig::default();
        let first = resolve_with(&config, &ReactiveDuration, &snap, &prediction, &at(8, 0));
        let second = resolve_with(&config, &ReactiveDuration, &snap, &prediction, &at(8, 0));
        assert_eq!(first, second);
    }
}
