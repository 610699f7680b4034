//! Diagnostic logging.
//!
//! `greenwave run` writes cycle reports to stdout, so every log line goes
//! to stderr and a replay can be piped straight into `jq` or a file. What
//! each `-v` step adds:
//!
//! | flag   | filter  | adds                                                   |
//! |--------|---------|--------------------------------------------------------|
//! | none   | `warn`  | fallbacks, hook failures, ignored config entries       |
//! | `-v`   | `info`  | phase switches, controller start/stop, file loading    |
//! | `-vv`  | `debug` | emergency and accident tiers, agent overrides          |
//! | `-vvv` | `trace` | dependency crates                                      |
//!
//! `GREENWAVE_LOG_LEVEL` takes a full `EnvFilter` directive and wins over
//! `-v`, e.g. `GREENWAVE_LOG_LEVEL=greenwave::engine=debug`.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

const LOG_LEVEL_VAR: &str = "GREENWAVE_LOG_LEVEL";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Plain text, colored on a terminal
    #[default]
    Human,
    /// One JSON object per line, for collectors next to `--format json`
    Json,
}

/// Filter directive for a `-v` count.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn use_ansi(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
    }
}

/// Installs the global subscriber.
///
/// Targets (`greenwave::engine::resolver` and so on) are shown from `-vv`
/// up, where lines from several modules interleave. A subscriber that is
/// already installed is left in place.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_VAR)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));
    let show_target = verbosity >= 2;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(show_target)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Human => builder.with_ansi(use_ansi(color)).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
