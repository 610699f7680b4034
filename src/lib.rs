//! `greenwave` - adaptive traffic-signal phase decision engine
//!
//! Once per control cycle the engine takes sensed vehicle counts and
//! forecasts for every intersection and decides which phase group gets
//! green, how long the green lasts, and which signal every road shows.
//! Emergency preemption always wins; the other tiers, the duration
//! strategy and the cross-cycle debouncer are configured through
//! [`config::GreenwaveConfig`].
//!
//! The entry point is [`engine::SignalController`].

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod observability;
pub mod replay;
