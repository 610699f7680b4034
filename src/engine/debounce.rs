//! Cross-cycle debouncing of phase changes.
//!
//! The debouncer owns one [`DebounceState`] per intersection. A resolved
//! phase is committed only when it differs from the committed one and the
//! committed one has been active for at least `min_phase_duration`;
//! otherwise the committed phase is re-emitted and its switch time is
//! kept. The first sighting of an intersection commits immediately.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::schema::GreenwaveConfig;
use crate::model::{ActivePhase, IntersectionId};

/// Per-intersection memory of the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    /// Phase currently acted upon
    pub committed: ActivePhase,
    /// Monotonic time of the last commit
    pub last_switch: Duration,
}

/// Result of filtering one resolved phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOutcome {
    /// Phase to act upon this cycle
    pub committed: ActivePhase,
    /// Phase committed before this cycle (absent on first sighting)
    pub previous: Option<ActivePhase>,
    /// `true` if this cycle committed a new phase
    pub switched: bool,
    /// `true` if a different resolved phase was suppressed
    pub held: bool,
}

/// Keyed store of debounce state with the commit rule.
///
/// Each intersection's entry is locked only while its own cycle updates
/// it, so distinct intersections may be filtered concurrently.
#[derive(Debug)]
pub struct CycleDebouncer {
    states: DashMap<IntersectionId, DebounceState>,
    min_phase_duration: Duration,
    emergency_bypass: bool,
}

impl CycleDebouncer {
    /// Creates an empty debouncer.
    #[must_use]
    pub fn new(min_phase_duration: Duration, emergency_bypass: bool) -> Self {
        Self {
            states: DashMap::new(),
            min_phase_duration,
            emergency_bypass,
        }
    }

    /// Creates a debouncer from the controller configuration.
    #[must_use]
    pub fn from_config(config: &GreenwaveConfig) -> Self {
        Self::new(
            config.controller.min_phase_duration,
            config.debounce.emergency_bypass,
        )
    }

    /// Filters the resolved phase for `id` at monotonic time `now`.
    pub fn filter(&self, id: &IntersectionId, resolved: ActivePhase, now: Duration) -> DebounceOutcome {
        match self.states.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(DebounceState {
                    committed: resolved,
                    last_switch: now,
                });
                DebounceOutcome {
                    committed: resolved,
                    previous: None,
                    switched: true,
                    held: false,
                }
            }
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                let previous = state.committed;

                if resolved == previous {
                    return DebounceOutcome {
                        committed: previous,
                        previous: Some(previous),
                        switched: false,
                        held: false,
                    };
                }

                // Clock regressions count as zero elapsed
                let elapsed = now.saturating_sub(state.last_switch);
                let bypass = self.emergency_bypass && resolved.is_emergency();

                if bypass || elapsed >= self.min_phase_duration {
                    state.committed = resolved;
                    state.last_switch = now;
                    DebounceOutcome {
                        committed: resolved,
                        previous: Some(previous),
                        switched: true,
                        held: false,
                    }
                } else {
                    DebounceOutcome {
                        committed: previous,
                        previous: Some(previous),
                        switched: false,
                        held: true,
                    }
                }
            }
        }
    }

    /// Returns the committed phase of `id`, if it was ever seen.
    #[must_use]
    pub fn committed(&self, id: &IntersectionId) -> Option<ActivePhase> {
        self.states.get(id).map(|s| s.committed)
    }

    /// Returns a copy of the full state of `id`.
    #[must_use]
    pub fn state(&self, id: &IntersectionId) -> Option<DebounceState> {
        self.states.get(id).map(|s| *s)
    }

    /// Drops the state of `id`; its next cycle commits immediately.
    pub fn forget(&self, id: &IntersectionId) -> bool {
        self.states.remove(id).is_some()
    }

    /// Number of intersections with a committed phase.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no intersection has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops all state.
    pub fn clear(&self) {
        self.states.clear();
    }
}
