//! Data model shared by the engine and its collaborators.
//!
//! Inputs ([`CycleSnapshot`], [`CyclePrediction`], [`CycleTime`]) are
//! immutable for a cycle; outputs ([`CycleReport`] and its parts) are
//! recomputed every cycle and never mutated in place.

pub mod decision;
pub mod road;
pub mod snapshot;

pub use decision::{
    ActivePhase, CongestionLevel, CycleReport, DecisionTier, IntersectionOutcome, Phase,
    PhaseDecision, PhaseDemand, Provenance, RoadDecision, Signal,
};
pub use road::{IntersectionId, PhaseGroup, RoadId};
pub use snapshot::{
    CyclePrediction, CycleSnapshot, CycleTime, IntersectionPrediction, IntersectionSnapshot,
    PredictedCount, RoadCount,
};
