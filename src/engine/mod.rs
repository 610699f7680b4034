//! Phase decision engine.
//!
//! Bottom-up: [`duration`] sizes green time, [`resolver`] picks the phase
//! for one intersection, [`debounce`] filters phase changes across cycles,
//! [`enforcer`] turns the committed phase into signals, and
//! [`controller`] runs all of it once per cycle. [`hooks`] defines the
//! optional external strategies.

pub mod controller;
pub mod debounce;
pub mod duration;
pub mod enforcer;
pub mod hooks;
pub mod resolver;

pub use controller::SignalController;
pub use debounce::{CycleDebouncer, DebounceOutcome, DebounceState};
pub use duration::{
    DurationStrategy, FuzzyDuration, LaneAllocation, LearnedDuration, ReactiveDuration,
    classify_congestion, fuzzy_bucket, lane_allocation,
};
pub use enforcer::{enforce, signal_for};
pub use hooks::{AgentDirective, AgentPlan, DurationPredictor, ExternalAgent, RouteAgent};
pub use resolver::{PriorityResolver, Resolution};
