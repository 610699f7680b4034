//! Decision records produced by the engine.
//!
//! - [`PhaseDecision`]: what the priority resolver chose for one intersection
//! - [`ActivePhase`]: the phase actually acted upon (after debouncing)
//! - [`RoadDecision`]: per-road signal contract emitted to collaborators
//! - [`CycleReport`]: everything produced for one control cycle

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CycleIssue;

use super::road::{IntersectionId, PhaseGroup, RoadId};

/// Phase label as reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// North/south green
    A,
    /// East/west green
    B,
    /// Emergency preemption; the emergency group is green
    Emergency,
    /// Accident stop; every road flashes red (opt-in policy only)
    AccidentReported,
}

impl Phase {
    /// Returns the metrics/log label for this phase.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Emergency => "Emergency",
            Self::AccidentReported => "AccidentReported",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A phase together with the data needed to derive signals from it.
///
/// An emergency always names the group it preempts for, so the
/// "emergency without a green group" state cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivePhase {
    /// Normal operation with one group green
    Group(PhaseGroup),
    /// Emergency preemption for the given group
    Emergency(PhaseGroup),
    /// All-way flashing stop after an accident
    AccidentStop,
}

impl ActivePhase {
    /// Returns the reported phase label.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Group(PhaseGroup::A) => Phase::A,
            Self::Group(PhaseGroup::B) => Phase::B,
            Self::Emergency(_) => Phase::Emergency,
            Self::AccidentStop => Phase::AccidentReported,
        }
    }

    /// Returns the emergency group, if this is an emergency.
    #[must_use]
    pub const fn emergency_phase(self) -> Option<PhaseGroup> {
        match self {
            Self::Emergency(group) => Some(group),
            _ => None,
        }
    }

    /// Returns the group whose roads are green, if any.
    #[must_use]
    pub const fn green_group(self) -> Option<PhaseGroup> {
        match self {
            Self::Group(group) | Self::Emergency(group) => Some(group),
            Self::AccidentStop => None,
        }
    }

    /// Returns `true` for an emergency phase.
    #[must_use]
    pub const fn is_emergency(self) -> bool {
        matches!(self, Self::Emergency(_))
    }
}

impl std::fmt::Display for ActivePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group(group) => write!(f, "{group}"),
            Self::Emergency(group) => write!(f, "Emergency({group})"),
            Self::AccidentStop => f.write_str("AccidentReported"),
        }
    }
}

impl Serialize for ActivePhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ActivePhase", 2)?;
        s.serialize_field("phase", &self.phase())?;
        s.serialize_field("emergency_phase", &self.emergency_phase())?;
        s.end()
    }
}

/// Which resolver tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    /// An ambulance was present
    Emergency,
    /// Flashing-stop accident policy fired
    AccidentStop,
    /// Exactly one group had demand
    ForcedNonEmpty,
    /// School window selected the group with more buses
    SchoolPriority,
    /// Blended real-time and predicted demand
    Adaptive,
}

/// Strategy that produced a signal or duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    /// Formula-based extension
    Reactive,
    /// Bucket table lookup
    Fuzzy,
    /// External duration predictor
    LearnedDuration,
    /// External optimizing agent
    ExternalAgent,
}

impl Provenance {
    /// Returns the metrics/log label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reactive => "reactive",
            Self::Fuzzy => "fuzzy",
            Self::LearnedDuration => "learned_duration",
            Self::ExternalAgent => "external_agent",
        }
    }
}

/// Effective (blended) demand per phase group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseDemand {
    /// Effective demand of group A
    pub a: f64,
    /// Effective demand of group B
    pub b: f64,
}

impl PhaseDemand {
    /// Returns the demand of `group`.
    #[must_use]
    pub const fn of(&self, group: PhaseGroup) -> f64 {
        match group {
            PhaseGroup::A => self.a,
            PhaseGroup::B => self.b,
        }
    }
}

/// The resolver's decision for one intersection and cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDecision {
    /// Intersection decided
    pub intersection: IntersectionId,
    /// Chosen phase
    #[serde(flatten)]
    pub active: ActivePhase,
    /// Green duration in seconds
    pub duration: f64,
    /// Tier that produced the phase
    pub tier: DecisionTier,
    /// Strategy that sized `duration`
    pub provenance: Provenance,
    /// Effective demand of both groups
    pub demand: PhaseDemand,
    /// Roads with an accident this cycle (report only)
    pub accidents: Vec<RoadId>,
    /// Whether the school-priority rule influenced this decision
    pub school_priority: bool,
}

impl PhaseDecision {
    /// Returns the chosen phase label.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.active.phase()
    }

    /// Returns the emergency group, if any.
    #[must_use]
    pub const fn emergency_phase(&self) -> Option<PhaseGroup> {
        self.active.emergency_phase()
    }
}

/// Signal shown on one road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Proceed
    Green,
    /// Stop
    Red,
    /// All-way stop
    FlashingRed,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => f.write_str("GREEN"),
            Self::Red => f.write_str("RED"),
            Self::FlashingRed => f.write_str("FLASHING_RED"),
        }
    }
}

/// Coarse congestion classification of an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    /// 20 cars or fewer
    Low,
    /// 21 to 50 cars
    Medium,
    /// More than 50 cars
    High,
}

/// Per-road output of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadDecision {
    /// Road
    pub road: RoadId,
    /// Signal to show
    pub signal: Signal,
    /// Green duration in seconds
    pub dynamic_green_duration: f64,
    /// Proportional share of the nominal cycle (informational)
    pub lane_green_time: f64,
    /// Congestion of the whole intersection
    pub congestion_level: CongestionLevel,
    /// Strategy that produced `signal` and `dynamic_green_duration`
    pub provenance: Provenance,
    /// Whether an accident was detected on this road
    pub accident: bool,
}

/// Everything decided for one intersection in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionOutcome {
    /// Intersection
    pub intersection: IntersectionId,
    /// Phase acted upon after debouncing
    pub committed: ActivePhase,
    /// `true` if the resolved phase differed but was held back by the debouncer
    pub held: bool,
    /// `true` if this cycle committed a new phase
    pub switched: bool,
    /// The resolver's decision (kept even when held)
    pub decision: PhaseDecision,
    /// Per-road outputs
    pub roads: Vec<RoadDecision>,
    /// Problems local to this intersection
    pub issues: Vec<CycleIssue>,
}

impl IntersectionOutcome {
    /// Returns the output for `road`, if that road is controlled.
    #[must_use]
    pub fn road(&self, road: RoadId) -> Option<&RoadDecision> {
        self.roads.iter().find(|r| r.road == road)
    }

    /// Returns the roads currently showing green.
    #[must_use]
    pub fn green_roads(&self) -> Vec<RoadId> {
        self.roads
            .iter()
            .filter(|r| r.signal == Signal::Green)
            .map(|r| r.road)
            .collect()
    }
}

/// Everything produced for one control cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Zero-based cycle counter of the controller
    pub cycle: u64,
    /// Outcomes in deterministic intersection order
    pub intersections: Vec<IntersectionOutcome>,
    /// Problems not tied to a single intersection
    pub cycle_issues: Vec<CycleIssue>,
    /// `true` if any fallback to a safe default happened this cycle
    pub degraded: bool,
}

impl CycleReport {
    /// Returns the outcome for one intersection.
    #[must_use]
    pub fn intersection(&self, id: &IntersectionId) -> Option<&IntersectionOutcome> {
        self.intersections.iter().find(|o| &o.intersection == id)
    }

    /// Iterates over every issue of the cycle, cycle-wide ones first.
    pub fn issues(&self) -> impl Iterator<Item = &CycleIssue> {
        self.cycle_issues
            .iter()
            .chain(self.intersections.iter().flat_map(|o| o.issues.iter()))
    }
}
