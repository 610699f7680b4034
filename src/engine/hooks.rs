//! External strategy hooks.
//!
//! Both hooks are synchronous; bounding their latency is the caller's job.
//! Closures implement the traits directly, so a predictor can be attached
//! as `|demand, time| Ok(...)`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::schema::{GreenwaveConfig, RouteConfig};
use crate::error::HookError;
use crate::model::{CycleSnapshot, CycleTime, IntersectionId, RoadId, Signal};

// ============================================================================
// Duration predictor
// ============================================================================

/// Learned duration model: effective demand and time of day in, seconds out.
pub trait DurationPredictor: Send + Sync {
    /// Predicts a green duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] when the model cannot produce a value.
    fn predict(&self, effective_demand: f64, time: &CycleTime) -> Result<f64, HookError>;
}

impl<F> DurationPredictor for F
where
    F: Fn(f64, &CycleTime) -> Result<f64, HookError> + Send + Sync,
{
    fn predict(&self, effective_demand: f64, time: &CycleTime) -> Result<f64, HookError> {
        self(effective_demand, time)
    }
}

// ============================================================================
// External agent
// ============================================================================

/// Signal and duration an agent wants on one road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentDirective {
    /// Signal to show (accepted verbatim)
    pub signal: Signal,
    /// Green duration in seconds
    pub duration: f64,
}

impl AgentDirective {
    /// Creates a directive.
    #[must_use]
    pub const fn new(signal: Signal, duration: f64) -> Self {
        Self { signal, duration }
    }
}

/// Per-road overrides returned by an [`ExternalAgent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentPlan {
    directives: IndexMap<IntersectionId, IndexMap<RoadId, AgentDirective>>,
}

impl AgentPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(
        mut self,
        intersection: impl Into<IntersectionId>,
        road: RoadId,
        directive: AgentDirective,
    ) -> Self {
        self.insert(intersection.into(), road, directive);
        self
    }

    /// Inserts or replaces the directive for one road.
    pub fn insert(&mut self, intersection: IntersectionId, road: RoadId, directive: AgentDirective) {
        self.directives
            .entry(intersection)
            .or_default()
            .insert(road, directive);
    }

    /// Returns the directives for one intersection.
    #[must_use]
    pub fn get(&self, intersection: &IntersectionId) -> Option<&IndexMap<RoadId, AgentDirective>> {
        self.directives.get(intersection)
    }

    /// Iterates over intersections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&IntersectionId, &IndexMap<RoadId, AgentDirective>)> {
        self.directives.iter()
    }

    /// Returns `true` if the plan overrides nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.values().all(IndexMap::is_empty)
    }
}

/// Optimizing agent consulted once per cycle in `external_agent` mode.
///
/// Its directives are authoritative: they replace the baseline signal and
/// duration of every road they name, after the invariant enforcer ran.
pub trait ExternalAgent: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "external_agent"
    }

    /// Returns the overrides for this cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`HookError`] when the agent cannot produce a plan. The
    /// cycle then keeps its reactive baseline.
    fn recommend(
        &self,
        snapshot: &CycleSnapshot,
        config: &GreenwaveConfig,
    ) -> Result<AgentPlan, HookError>;
}

impl<F> ExternalAgent for F
where
    F: Fn(&CycleSnapshot, &GreenwaveConfig) -> Result<AgentPlan, HookError> + Send + Sync,
{
    fn recommend(
        &self,
        snapshot: &CycleSnapshot,
        config: &GreenwaveConfig,
    ) -> Result<AgentPlan, HookError> {
        self(snapshot, config)
    }
}

// ============================================================================
// Route agent
// ============================================================================

/// Built-in agent that holds a green corridor between two intersections.
///
/// Every intersection whose numeric id lies between the route's endpoints
/// (inclusive, either direction) is covered. The start road at the start
/// intersection and the end road at the end intersection are green; every
/// other covered road is red. Intersections with non-numeric ids are never
/// covered.
#[derive(Debug, Clone)]
pub struct RouteAgent {
    route: RouteConfig,
}

impl RouteAgent {
    /// Creates an agent for `route`.
    #[must_use]
    pub const fn new(route: RouteConfig) -> Self {
        Self { route }
    }

    /// Returns the covered id range, if both endpoints are numeric.
    fn span(&self) -> Option<(u64, u64)> {
        let start = self.route.start.intersection.position()?;
        let end = self.route.end.intersection.position()?;
        Some((start.min(end), start.max(end)))
    }

    fn signal_for(&self, id: &IntersectionId, road: RoadId) -> Signal {
        let start = &self.route.start;
        let end = &self.route.end;
        if (&start.intersection == id && start.road == road)
            || (&end.intersection == id && end.road == road)
        {
            Signal::Green
        } else {
            Signal::Red
        }
    }
}

impl ExternalAgent for RouteAgent {
    fn name(&self) -> &str {
        "route"
    }

    fn recommend(
        &self,
        snapshot: &CycleSnapshot,
        config: &GreenwaveConfig,
    ) -> Result<AgentPlan, HookError> {
        let mut plan = AgentPlan::new();
        let Some((low, high)) = self.span() else {
            return Ok(plan);
        };

        for (id, _) in snapshot.iter() {
            let Some(position) = id.position() else {
                continue;
            };
            if !(low..=high).contains(&position) {
                continue;
            }
            for road in config.roads_of(id) {
                let directive = AgentDirective::new(self.signal_for(id, road), self.route.duration);
                plan.insert(id.clone(), road, directive);
            }
        }

        Ok(plan)
    }
}
