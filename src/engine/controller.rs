//! Signal controller.
//!
//! The [`SignalController`] owns everything that lives longer than one
//! cycle: the frozen configuration, the duration strategy, the optional
//! hooks and the debouncer's keyed state. Per cycle it runs
//!
//! ```text
//! normalize → resolve (+ duration) → debounce → enforce → [agent override]
//! ```
//!
//! for each intersection and returns a [`CycleReport`]. Nothing in a cycle
//! is fatal: problems are reported as [`CycleIssue`]s next to decisions
//! that already fell back to a safe default.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::schema::{GreenwaveConfig, OperationMode};
use crate::config::validation::unknown_intersection_message;
use crate::error::{CycleIssue, DataSource, HookKind};
use crate::model::{
    CycleReport, CyclePrediction, CycleSnapshot, CycleTime, IntersectionId, IntersectionOutcome,
    IntersectionPrediction, IntersectionSnapshot, Provenance, RoadDecision, RoadId,
};
use crate::observability::events::{Event, EventEmitter, StopReason};
use crate::observability::metrics;

use super::debounce::{CycleDebouncer, DebounceOutcome};
use super::duration::{
    DurationStrategy, FuzzyDuration, LearnedDuration, ReactiveDuration, classify_congestion,
    lane_allocation,
};
use super::enforcer::enforce;
use super::hooks::{AgentPlan, DurationPredictor, ExternalAgent};
use super::resolver::PriorityResolver;

/// Per-cycle coordinator for every controlled intersection.
///
/// `SignalController` is `Send + Sync`. [`decide_intersection`] may be
/// called concurrently for distinct intersections; a single intersection
/// must not be decided by two callers at once.
///
/// [`decide_intersection`]: Self::decide_intersection
pub struct SignalController {
    config: Arc<GreenwaveConfig>,
    strategy: Box<dyn DurationStrategy>,
    agent: Option<Arc<dyn ExternalAgent>>,
    events: Option<Arc<EventEmitter>>,
    debouncer: CycleDebouncer,
    cycles: AtomicU64,
    startup_issues: Vec<CycleIssue>,
    startup_reported: AtomicBool,
}

impl std::fmt::Debug for SignalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalController")
            .field("operation_mode", &self.config.controller.operation_mode)
            .field("agent", &self.agent.as_ref().map(|a| a.name().to_owned()))
            .field("cycles", &self.cycles.load(Ordering::Relaxed))
            .field("intersections", &self.debouncer.len())
            .finish_non_exhaustive()
    }
}

impl SignalController {
    /// Creates a controller for a frozen configuration.
    ///
    /// Configuration inconsistencies are logged here once and reported in
    /// the first cycle's `cycle_issues`.
    #[must_use]
    pub fn new(config: Arc<GreenwaveConfig>) -> Self {
        let strategy: Box<dyn DurationStrategy> = match config.controller.operation_mode {
            OperationMode::Reactive | OperationMode::ExternalAgent => Box::new(ReactiveDuration),
            OperationMode::FuzzyReactive => Box::new(FuzzyDuration),
            OperationMode::LearnedDuration => Box::new(LearnedDuration::default()),
        };

        let startup_issues = startup_issues(&config);
        for issue in &startup_issues {
            warn!(%issue, "configuration inconsistency ignored");
        }

        debug!(
            operation_mode = %config.controller.operation_mode,
            intersections = config.intersections.len(),
            "signal controller created"
        );

        Self {
            debouncer: CycleDebouncer::from_config(&config),
            config,
            strategy,
            agent: None,
            events: None,
            cycles: AtomicU64::new(0),
            startup_issues,
            startup_reported: AtomicBool::new(false),
        }
    }

    /// Attaches a learned duration predictor.
    ///
    /// Only consulted in `learned_duration` mode.
    #[must_use]
    pub fn with_duration_predictor<P>(mut self, predictor: P) -> Self
    where
        P: DurationPredictor + 'static,
    {
        if self.config.controller.operation_mode == OperationMode::LearnedDuration {
            let predictor: Arc<dyn DurationPredictor> = Arc::new(predictor);
            self.strategy = Box::new(LearnedDuration::new(Some(predictor)));
        } else {
            debug!(
                operation_mode = %self.config.controller.operation_mode,
                "duration predictor attached but not used in this mode"
            );
        }
        self
    }

    /// Attaches an external optimizing agent.
    ///
    /// Only consulted in `external_agent` mode.
    #[must_use]
    pub fn with_external_agent<A>(mut self, agent: A) -> Self
    where
        A: ExternalAgent + 'static,
    {
        if self.config.controller.operation_mode != OperationMode::ExternalAgent {
            debug!(
                agent = agent.name(),
                operation_mode = %self.config.controller.operation_mode,
                "external agent attached but not used in this mode"
            );
        }
        self.agent = Some(Arc::new(agent));
        self
    }

    /// Attaches an event sink and announces the controller on it.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        events.emit(Event::ControllerStarted {
            timestamp: Utc::now(),
            operation_mode: self.config.controller.operation_mode,
            intersections: self.config.intersections.len(),
        });
        self.events = Some(events);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Arc<GreenwaveConfig> {
        &self.config
    }

    /// Returns the committed phase of `id`, if it was ever decided.
    #[must_use]
    pub fn committed_phase(&self, id: &IntersectionId) -> Option<crate::model::ActivePhase> {
        self.debouncer.committed(id)
    }

    /// Drops the debounce state of `id`; its next decision commits immediately.
    pub fn forget(&self, id: &IntersectionId) -> bool {
        let removed = self.debouncer.forget(id);
        if removed {
            metrics::set_intersections_active(self.debouncer.len());
        }
        removed
    }

    /// Configuration inconsistencies found at construction.
    #[must_use]
    pub fn startup_issues(&self) -> &[CycleIssue] {
        &self.startup_issues
    }

    /// Number of cycles decided so far.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Tears down per-intersection state and announces the stop.
    pub fn shutdown(&self, reason: StopReason) {
        let cycles = self.cycles();
        self.debouncer.clear();
        metrics::set_intersections_active(0);
        info!(?reason, cycles, "signal controller stopped");
        self.emit(|| Event::ControllerStopped {
            timestamp: Utc::now(),
            reason,
            cycles,
        });
    }

    // ========================================================================
    // Cycle pipeline
    // ========================================================================

    /// Decides one control cycle for every intersection.
    ///
    /// Declared intersections come first in configuration order, followed
    /// by undeclared intersections in snapshot order. A declared
    /// intersection missing from the snapshot is decided on zero counts.
    pub fn decide_cycle(
        &self,
        snapshot: &CycleSnapshot,
        prediction: &CyclePrediction,
        time: &CycleTime,
    ) -> CycleReport {
        let started = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst);

        let mut cycle_issues = Vec::new();
        if !self.startup_reported.swap(true, Ordering::SeqCst) {
            cycle_issues.extend(self.startup_issues.iter().cloned());
        }

        let mut intersections: Vec<IntersectionOutcome> = self
            .cycle_order(snapshot)
            .into_iter()
            .map(|id| self.decide(cycle, &id, snapshot.get(&id), prediction.get(&id), time))
            .collect();

        if self.config.controller.operation_mode == OperationMode::ExternalAgent {
            self.apply_agent(cycle, snapshot, &mut intersections, &mut cycle_issues);
        }

        let report_issues = cycle_issues
            .iter()
            .chain(intersections.iter().flat_map(|o| o.issues.iter()));
        let mut degraded = false;
        for issue in report_issues {
            degraded |= issue.is_degraded();
            self.report_issue(cycle, issue);
        }

        let elapsed = started.elapsed();
        metrics::record_cycle(elapsed);
        metrics::set_intersections_active(self.debouncer.len());

        let switched = intersections.iter().filter(|o| o.switched).count();
        let held = intersections.iter().filter(|o| o.held).count();
        debug!(
            cycle,
            intersections = intersections.len(),
            switched,
            held,
            degraded,
            "cycle decided"
        );
        self.emit(|| Event::CycleCompleted {
            timestamp: Utc::now(),
            cycle,
            intersections: intersections.len(),
            switched,
            held,
            degraded,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });

        CycleReport {
            cycle,
            intersections,
            cycle_issues,
            degraded,
        }
    }

    /// Decides a single intersection outside of [`decide_cycle`].
    ///
    /// The external agent is not consulted here; it needs the whole cycle.
    ///
    /// [`decide_cycle`]: Self::decide_cycle
    pub fn decide_intersection(
        &self,
        id: &IntersectionId,
        snapshot: Option<&IntersectionSnapshot>,
        prediction: Option<&IntersectionPrediction>,
        time: &CycleTime,
    ) -> IntersectionOutcome {
        let cycle = self.cycles();
        let outcome = self.decide(cycle, id, snapshot, prediction, time);
        for issue in &outcome.issues {
            self.report_issue(cycle, issue);
        }
        outcome
    }

    fn cycle_order(&self, snapshot: &CycleSnapshot) -> Vec<IntersectionId> {
        let declared = self.config.intersections.keys().cloned();
        let undeclared = snapshot
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !self.config.intersections.contains_key(*id))
            .cloned();
        declared.chain(undeclared).collect()
    }

    fn decide(
        &self,
        cycle: u64,
        id: &IntersectionId,
        snapshot: Option<&IntersectionSnapshot>,
        prediction: Option<&IntersectionPrediction>,
        time: &CycleTime,
    ) -> IntersectionOutcome {
        let roads = self.config.roads_of(id);
        let mut issues = Vec::new();
        let (counts, forecast) = normalize(id, &roads, snapshot, prediction, &mut issues);

        let resolution = PriorityResolver::new(&self.config, self.strategy.as_ref())
            .resolve(id, &counts, &forecast, time);
        issues.extend(resolution.issues);
        let decision = resolution.decision;

        let debounced = self.debouncer.filter(id, decision.active, time.monotonic);
        self.observe_debounce(cycle, id, &decision, &debounced);

        let allocation = lane_allocation(&counts, self.config.controller.cycle_length);
        let congestion = classify_congestion(counts.total_cars());
        let roads = enforce(debounced.committed, &roads)
            .into_iter()
            .map(|(road, signal)| RoadDecision {
                road,
                signal,
                dynamic_green_duration: decision.duration,
                lane_green_time: allocation.for_road(road),
                congestion_level: congestion,
                provenance: decision.provenance,
                accident: decision.accidents.contains(&road),
            })
            .collect();

        if !decision.accidents.is_empty() {
            warn!(
                intersection = %id,
                roads = ?decision.accidents,
                "accident reported"
            );
            metrics::record_accidents(decision.accidents.len() as u64);
            self.emit(|| Event::AccidentReported {
                timestamp: Utc::now(),
                cycle,
                intersection: id.clone(),
                roads: decision.accidents.clone(),
            });
        }

        IntersectionOutcome {
            intersection: id.clone(),
            committed: debounced.committed,
            held: debounced.held,
            switched: debounced.switched,
            decision,
            roads,
            issues,
        }
    }

    fn observe_debounce(
        &self,
        cycle: u64,
        id: &IntersectionId,
        decision: &crate::model::PhaseDecision,
        debounced: &DebounceOutcome,
    ) {
        if debounced.switched {
            match debounced.previous {
                Some(from) => info!(
                    intersection = %id,
                    %from,
                    to = %debounced.committed,
                    tier = ?decision.tier,
                    "phase committed"
                ),
                None => info!(
                    intersection = %id,
                    to = %debounced.committed,
                    tier = ?decision.tier,
                    "initial phase committed"
                ),
            }
            metrics::record_phase_commit(debounced.committed.phase());
            self.emit(|| Event::PhaseCommitted {
                timestamp: Utc::now(),
                cycle,
                intersection: id.clone(),
                from: debounced.previous,
                to: debounced.committed,
                tier: decision.tier,
            });
        } else if debounced.held {
            debug!(
                intersection = %id,
                committed = %debounced.committed,
                resolved = %decision.active,
                "phase change held"
            );
            metrics::record_phase_hold();
            self.emit(|| Event::PhaseHeld {
                timestamp: Utc::now(),
                cycle,
                intersection: id.clone(),
                committed: debounced.committed,
                resolved: decision.active,
            });
        }
    }

    fn apply_agent(
        &self,
        cycle: u64,
        snapshot: &CycleSnapshot,
        outcomes: &mut [IntersectionOutcome],
        cycle_issues: &mut Vec<CycleIssue>,
    ) {
        let Some(agent) = &self.agent else {
            cycle_issues.push(CycleIssue::HookUnavailable {
                hook: HookKind::ExternalAgent,
                reason: "no external agent attached".to_string(),
            });
            return;
        };

        match agent.recommend(snapshot, &self.config) {
            Ok(plan) => self.apply_plan(cycle, &plan, outcomes),
            Err(err) => cycle_issues.push(CycleIssue::HookUnavailable {
                hook: HookKind::ExternalAgent,
                reason: err.to_string(),
            }),
        }
    }

    fn apply_plan(&self, cycle: u64, plan: &AgentPlan, outcomes: &mut [IntersectionOutcome]) {
        let base_duration = self.config.controller.base_duration;

        for (id, directives) in plan.iter() {
            let Some(outcome) = outcomes.iter_mut().find(|o| &o.intersection == id) else {
                debug!(intersection = %id, "agent directive for unknown intersection ignored");
                continue;
            };

            let mut overridden = Vec::new();
            for (road, directive) in directives {
                let Some(target) = outcome.roads.iter_mut().find(|r| r.road == *road) else {
                    debug!(intersection = %id, %road, "agent directive for uncontrolled road ignored");
                    continue;
                };

                let duration = if directive.duration.is_finite() && directive.duration >= 0.0 {
                    directive.duration
                } else {
                    outcome.issues.push(CycleIssue::InvalidExternalDuration {
                        intersection: id.clone(),
                        road: Some(*road),
                        value: directive.duration.to_string(),
                    });
                    base_duration
                };

                target.signal = directive.signal;
                target.dynamic_green_duration = duration;
                target.provenance = Provenance::ExternalAgent;
                overridden.push(*road);
            }

            if overridden.is_empty() {
                continue;
            }

            debug!(intersection = %id, roads = ?overridden, "external agent override applied");
            metrics::record_overrides(overridden.len() as u64);
            self.emit(|| Event::ExternalOverride {
                timestamp: Utc::now(),
                cycle,
                intersection: id.clone(),
                roads: overridden,
            });
        }
    }

    fn report_issue(&self, cycle: u64, issue: &CycleIssue) {
        if !issue.is_degraded() {
            return;
        }
        warn!(cycle, %issue, "degraded mode");
        metrics::record_degraded(issue);
        self.emit(|| Event::DegradedMode {
            timestamp: Utc::now(),
            cycle,
            issue: issue.clone(),
        });
    }

    fn emit(&self, build: impl FnOnce() -> Event) {
        if let Some(events) = &self.events {
            events.emit(build());
        }
    }
}

/// Restricts the inputs to the controlled roads and flags gaps.
///
/// Missing counts are always flagged. Missing forecasts are flagged only
/// when the forecaster reported the intersection at all.
fn normalize(
    id: &IntersectionId,
    roads: &[RoadId],
    snapshot: Option<&IntersectionSnapshot>,
    prediction: Option<&IntersectionPrediction>,
    issues: &mut Vec<CycleIssue>,
) -> (IntersectionSnapshot, IntersectionPrediction) {
    let mut counts = IntersectionSnapshot::new();
    let mut forecast = IntersectionPrediction::new();

    for road in roads {
        let count = snapshot.and_then(|s| s.get(*road)).copied();
        if count.is_none() {
            issues.push(CycleIssue::MissingSnapshotData {
                intersection: id.clone(),
                road: *road,
                source: DataSource::Counts,
            });
        }
        counts.insert(*road, count.unwrap_or_default());

        if let Some(prediction) = prediction {
            match prediction.get(*road) {
                Some(p) => forecast = forecast.with(*road, p.car),
                None => issues.push(CycleIssue::MissingSnapshotData {
                    intersection: id.clone(),
                    road: *road,
                    source: DataSource::Predictions,
                }),
            }
        }
    }

    (counts, forecast)
}

/// Inconsistencies the engine ignores, reported once.
fn startup_issues(config: &GreenwaveConfig) -> Vec<CycleIssue> {
    let mut issues = Vec::new();
    if let Some(school) = &config.school_priority {
        if !config.knows_intersection(&school.intersection) {
            issues.push(CycleIssue::ConfigInconsistency {
                message: format!(
                    "school_priority: {}; the school window is ignored",
                    unknown_intersection_message(config, &school.intersection)
                ),
            });
        }
    }
    issues
}
