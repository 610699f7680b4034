//! CLI argument definitions
//!
//! All Clap derive structs for `greenwave` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::schema::OperationMode;
use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Adaptive traffic-signal phase decision engine.
#[derive(Parser, Debug)]
#[command(name = "greenwave", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "GREENWAVE_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(
        long,
        default_value = "human",
        global = true,
        env = "GREENWAVE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario through the controller, one report per cycle.
    Run(RunArgs),

    /// Validate configuration files without running the controller.
    Validate(ValidateArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "GREENWAVE_CONFIG")]
    pub config: PathBuf,

    /// Path to the YAML scenario to replay.
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Override `controller.operation_mode` from the configuration.
    #[arg(long)]
    pub mode: Option<OperationMode>,

    /// Report format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Write structured JSONL events to this file.
    #[arg(long, env = "GREENWAVE_EVENTS_FILE")]
    pub events: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "GREENWAVE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Wall-clock pause between cycles (e.g. `500ms`, `2s`).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Human,
    /// One JSON document per line.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "greenwave",
            "-vv",
            "run",
            "--config",
            "c.yaml",
            "--scenario",
            "s.yaml",
            "--format",
            "json",
            "--interval",
            "250ms",
            "--mode",
            "fuzzy-reactive",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.interval, Some(Duration::from_millis(250)));
        assert_eq!(args.mode, Some(OperationMode::FuzzyReactive));
    }

    #[test]
    fn test_validate_requires_files() {
        assert!(Cli::try_parse_from(["greenwave", "validate"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["greenwave", "version", "--quiet", "--log-format", "json"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
