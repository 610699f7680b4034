//! Phase-to-signal assignment.
//!
//! Signals are derived from the committed phase alone: the green group's
//! roads are green and every other road is red. There is no repair pass,
//! since [`ActivePhase`] cannot express a phase without a green group
//! other than the opt-in accident stop.

use crate::model::{ActivePhase, RoadId, Signal};

/// Returns the signal `road` shows under `active`.
#[must_use]
pub const fn signal_for(active: ActivePhase, road: RoadId) -> Signal {
    match active.green_group() {
        Some(group) if group.contains(road) => Signal::Green,
        Some(_) => Signal::Red,
        None => Signal::FlashingRed,
    }
}

/// Assigns a signal to every controlled road, in layout order.
///
/// Accident-bearing roads get no special treatment here.
#[must_use]
pub fn enforce(active: ActivePhase, roads: &[RoadId]) -> Vec<(RoadId, Signal)> {
    roads
        .iter()
        .map(|road| (*road, signal_for(active, *road)))
        .collect()
}
