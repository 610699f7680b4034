//! Structured event stream for `greenwave`.
//!
//! Discrete, typed events emitted while the controller runs. Events are
//! serialized as newline-delimited JSON (JSONL) and include a monotonically
//! increasing sequence number for ordering guarantees. Accident flags are
//! surfaced here rather than in the per-road signal contract.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::OperationMode;
use crate::error::CycleIssue;
use crate::model::{ActivePhase, DecisionTier, IntersectionId, RoadId};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during controller operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The controller was created and is ready to decide cycles.
    ControllerStarted {
        /// When the controller started.
        timestamp: DateTime<Utc>,
        /// Configured duration strategy.
        operation_mode: OperationMode,
        /// Number of declared intersections (0 means "whatever the detector reports").
        intersections: usize,
    },

    /// The controller was shut down.
    ControllerStopped {
        /// When the controller stopped.
        timestamp: DateTime<Utc>,
        /// Why it stopped.
        reason: StopReason,
        /// Number of cycles decided.
        cycles: u64,
    },

    /// A new phase was committed at an intersection.
    PhaseCommitted {
        /// When the commit happened.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// Intersection.
        intersection: IntersectionId,
        /// Previously committed phase (absent on first sighting).
        from: Option<ActivePhase>,
        /// Newly committed phase.
        to: ActivePhase,
        /// Resolver tier that produced the phase.
        tier: DecisionTier,
    },

    /// A resolved phase change was held back by the debouncer.
    PhaseHeld {
        /// When the hold happened.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// Intersection.
        intersection: IntersectionId,
        /// Phase that stays active.
        committed: ActivePhase,
        /// Phase the resolver asked for.
        resolved: ActivePhase,
    },

    /// One or more roads reported an accident.
    AccidentReported {
        /// When the accident was seen.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// Intersection.
        intersection: IntersectionId,
        /// Roads with `accident > 0`.
        roads: Vec<RoadId>,
    },

    /// A fallback to a safe default happened.
    DegradedMode {
        /// When the fallback happened.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// What went wrong.
        issue: CycleIssue,
    },

    /// The external agent overrode one or more roads.
    ExternalOverride {
        /// When the override was applied.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// Intersection.
        intersection: IntersectionId,
        /// Overridden roads.
        roads: Vec<RoadId>,
    },

    /// A control cycle finished.
    CycleCompleted {
        /// When the cycle finished.
        timestamp: DateTime<Utc>,
        /// Cycle counter.
        cycle: u64,
        /// Intersections decided.
        intersections: usize,
        /// Intersections that committed a new phase.
        switched: usize,
        /// Intersections whose change was held.
        held: usize,
        /// Whether any fallback happened.
        degraded: bool,
        /// Wall time spent deciding, in milliseconds.
        duration_ms: u64,
    },
}

/// Why the controller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The input ran out.
    Completed,
    /// SIGINT / Ctrl+C.
    Interrupted,
    /// SIGTERM.
    Terminated,
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped: signal
/// control must not stop because an event sink is unavailable.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
