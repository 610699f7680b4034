//! `run` command
//!
//! Replays a scenario through one [`SignalController`] and prints one
//! report per cycle on stdout.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::commands::Shutdown;
use crate::config::loader::{ConfigLimits, ConfigLoader};
use crate::config::schema::GreenwaveConfig;
use crate::config::validation::Validator;
use crate::engine::{RouteAgent, SignalController};
use crate::error::{GreenwaveError, ValidationIssue};
use crate::model::{CycleReport, CycleTime, DecisionTier, IntersectionOutcome};
use crate::observability::{EventEmitter, StopReason, init_metrics};
use crate::replay::Scenario;

/// Replay a scenario.
///
/// # Errors
///
/// Returns a config error if the configuration does not load, a scenario
/// error if the scenario does not parse, or an I/O error if the event
/// file or stdout cannot be written.
pub async fn run(args: &RunArgs, shutdown: Shutdown) -> Result<(), GreenwaveError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    info!(config = %args.config.display(), "loading configuration");
    let loaded = ConfigLoader::with_defaults().load(&args.config)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let mut config = loaded.config;
    if let Some(mode) = args.mode.filter(|m| *m != config.controller.operation_mode) {
        Arc::make_mut(&mut config).controller.operation_mode = mode;
        for warning in mode_warnings(&config) {
            warn!(location = %warning.path, "{}", warning.message);
        }
    }

    let scenario = Scenario::load(&args.scenario)?;
    info!(
        scenario = %args.scenario.display(),
        cycles = scenario.len(),
        "scenario loaded"
    );

    let mut controller = SignalController::new(Arc::clone(&config));
    if let Some(path) = &args.events {
        controller = controller.with_events(Arc::new(EventEmitter::from_file(path)?));
    }
    if let Some(route) = &config.route {
        controller = controller.with_external_agent(RouteAgent::new(route.clone()));
    }

    let mut reason = StopReason::Completed;
    for (index, (cycle, time)) in scenario.iter().enumerate() {
        if index > 0 {
            if let Some(interval) = args.interval {
                tokio::select! {
                    () = shutdown.triggered() => {}
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }
        if shutdown.is_triggered() {
            reason = shutdown.reason().unwrap_or(StopReason::Interrupted);
            break;
        }

        let report = controller.decide_cycle(&cycle.counts, &cycle.predicted, &time);
        print_report(&report, &time, args.format)?;
    }

    controller.shutdown(reason);
    Ok(())
}

/// Re-validates after a `--mode` override and keeps the warnings that
/// depend on the operation mode.
fn mode_warnings(config: &GreenwaveConfig) -> Vec<ValidationIssue> {
    Validator::new()
        .validate(config, &ConfigLimits::default())
        .warnings
        .into_iter()
        .filter(|w| w.path == "controller.operation_mode")
        .collect()
}

fn print_report(
    report: &CycleReport,
    time: &CycleTime,
    format: OutputFormat,
) -> Result<(), GreenwaveError> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Human => write!(stdout, "{}", HumanReport { report, time })?,
        OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string(report)?)?,
    }
    stdout.flush()?;
    Ok(())
}

/// Text rendering of one cycle report.
struct HumanReport<'a> {
    report: &'a CycleReport,
    time: &'a CycleTime,
}

impl fmt::Display for HumanReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(
            f,
            "cycle {}  {}  +{}{}",
            report.cycle,
            self.time.time_of_day.format("%H:%M:%S"),
            humantime::format_duration(self.time.monotonic),
            if report.degraded { "  [degraded]" } else { "" }
        )?;
        for issue in &report.cycle_issues {
            writeln!(f, "  ! {issue}")?;
        }
        for outcome in &report.intersections {
            write_outcome(f, outcome)?;
        }
        Ok(())
    }
}

fn write_outcome(f: &mut fmt::Formatter<'_>, outcome: &IntersectionOutcome) -> fmt::Result {
    let status = if outcome.switched {
        "switched".to_string()
    } else if outcome.held {
        format!("held, resolved {}", outcome.decision.active)
    } else {
        "kept".to_string()
    };
    writeln!(
        f,
        "  {}  {}  {}  {:.1}s  {}",
        outcome.intersection,
        outcome.committed,
        tier_label(outcome.decision.tier),
        outcome.decision.duration,
        status
    )?;
    for road in &outcome.roads {
        writeln!(
            f,
            "    {:<5}  {:<12}  {:>6.1}s  lane {:>5.1}s  {:?}  {}{}",
            road.road.as_str(),
            road.signal.to_string(),
            road.dynamic_green_duration,
            road.lane_green_time,
            road.congestion_level,
            road.provenance.label(),
            if road.accident { "  ACCIDENT" } else { "" }
        )?;
    }
    for issue in &outcome.issues {
        writeln!(f, "    ! {issue}")?;
    }
    Ok(())
}

const fn tier_label(tier: DecisionTier) -> &'static str {
    match tier {
        DecisionTier::Emergency => "emergency",
        DecisionTier::AccidentStop => "accident_stop",
        DecisionTier::ForcedNonEmpty => "forced",
        DecisionTier::SchoolPriority => "school",
        DecisionTier::Adaptive => "adaptive",
    }
}
