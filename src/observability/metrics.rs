//! Metrics collection for `greenwave`.
//!
//! Provides Prometheus-compatible metrics and typed convenience functions
//! for recording measurements. Every label value comes from a closed set
//! (phase labels, issue kinds), never from configuration or input data,
//! so intersection ids do not appear as labels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{CycleIssue, GreenwaveError};
use crate::model::Phase;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `GreenwaveError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), GreenwaveError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| GreenwaveError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("greenwave_cycles_total", "Total number of control cycles decided");
    describe_counter!(
        "greenwave_phase_commits_total",
        "Phase commits by committed phase"
    );
    describe_counter!(
        "greenwave_phase_holds_total",
        "Resolved phase changes held back by the debouncer"
    );
    describe_counter!(
        "greenwave_accidents_total",
        "Roads reporting an accident, summed over cycles"
    );
    describe_counter!(
        "greenwave_degraded_total",
        "Fallbacks to a safe default by reason"
    );
    describe_counter!(
        "greenwave_overrides_total",
        "Roads overridden by the external agent"
    );
    describe_histogram!(
        "greenwave_cycle_duration_ms",
        "Time spent deciding one cycle in milliseconds"
    );
    describe_gauge!(
        "greenwave_intersections_active",
        "Intersections with a committed phase"
    );
}

/// Records one decided cycle and how long it took.
pub fn record_cycle(duration: Duration) {
    counter!("greenwave_cycles_total").increment(1);
    histogram!("greenwave_cycle_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Records a phase commit.
pub fn record_phase_commit(to: Phase) {
    counter!("greenwave_phase_commits_total", "to" => to.label()).increment(1);
}

/// Records a held phase change.
pub fn record_phase_hold() {
    counter!("greenwave_phase_holds_total").increment(1);
}

/// Records accident-bearing roads.
pub fn record_accidents(roads: u64) {
    counter!("greenwave_accidents_total").increment(roads);
}

/// Records a degraded-mode fallback.
pub fn record_degraded(issue: &CycleIssue) {
    counter!("greenwave_degraded_total", "reason" => issue_label(issue)).increment(1);
}

/// Records roads overridden by the external agent.
pub fn record_overrides(roads: u64) {
    counter!("greenwave_overrides_total").increment(roads);
}

/// Sets the number of intersections with a committed phase.
#[allow(clippy::cast_precision_loss)]
pub fn set_intersections_active(count: usize) {
    gauge!("greenwave_intersections_active").set(count as f64);
}

/// Returns the closed-set label for an issue.
#[must_use]
pub const fn issue_label(issue: &CycleIssue) -> &'static str {
    match issue {
        CycleIssue::MissingSnapshotData { .. } => "missing_snapshot_data",
        CycleIssue::InvalidExternalDuration { .. } => "invalid_external_duration",
        CycleIssue::HookUnavailable { .. } => "hook_unavailable",
        CycleIssue::ConfigInconsistency { .. } => "config_inconsistency",
    }
}
