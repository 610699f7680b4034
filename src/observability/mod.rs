//! Observability module
//!
//! Logging, metrics, and structured event infrastructure for monitoring
//! the controller. None of it influences a decision.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, StopReason};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
