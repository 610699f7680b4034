//! Error types for `greenwave`
//!
//! Two families live here. Process-level errors ([`GreenwaveError`] and
//! friends) are returned from configuration loading and CLI commands and
//! map onto exit codes. Cycle-level problems ([`CycleIssue`]) never cross
//! the engine boundary as `Err`: every failure inside a control cycle
//! degrades to a safe default and is reported alongside the decisions.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::model::{IntersectionId, RoadId};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `greenwave` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Scenario file could not be parsed or replayed
    pub const SCENARIO_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `greenwave` operations.
#[derive(Debug, Error)]
pub enum GreenwaveError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scenario replay error
    #[error("scenario error: {0}")]
    Scenario(String),

    /// External hook failure surfaced outside a control cycle
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GreenwaveError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Scenario(_) | Self::Json(_) => ExitCode::SCENARIO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Hook(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "`school_priority.intersection`")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Hook Errors
// ============================================================================

/// Failure reported by a duration predictor or external agent.
///
/// The controller never propagates these; it converts them into
/// [`CycleIssue::HookUnavailable`] and falls back to the reactive formula.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    /// The hook cannot serve requests right now (not loaded, warming up)
    #[error("hook unavailable: {0}")]
    Unavailable(String),

    /// The hook was invoked and failed
    #[error("hook failed: {0}")]
    Failed(String),
}

// ============================================================================
// Cycle Issues
// ============================================================================

/// Which external hook a [`CycleIssue::HookUnavailable`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// The learned duration predictor
    DurationPredictor,
    /// The external optimizing agent
    ExternalAgent,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DurationPredictor => f.write_str("duration_predictor"),
            Self::ExternalAgent => f.write_str("external_agent"),
        }
    }
}

/// Which input stream was missing data for a road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Sensed counts from the detector
    Counts,
    /// Forecast counts
    Predictions,
}

/// A non-fatal problem encountered while deciding a cycle.
///
/// Each variant names the safe default the engine fell back to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleIssue {
    /// A configured road was absent from the input; zero counts were used.
    MissingSnapshotData {
        /// Intersection with the gap
        intersection: IntersectionId,
        /// Road with no data
        road: RoadId,
        /// Which input stream lacked the road
        source: DataSource,
    },

    /// A hook returned a non-finite or negative duration; `base_duration` was used.
    InvalidExternalDuration {
        /// Intersection the duration was computed for
        intersection: IntersectionId,
        /// Road, when the value came from a per-road agent directive
        road: Option<RoadId>,
        /// Rendered offending value (non-finite values are not JSON numbers)
        value: String,
    },

    /// A hook was missing or failed; the reactive strategy was used.
    HookUnavailable {
        /// Which hook
        hook: HookKind,
        /// Why it was unavailable
        reason: String,
    },

    /// The configuration is internally inconsistent; the offending part is ignored.
    ConfigInconsistency {
        /// Description of the inconsistency
        message: String,
    },
}

impl std::fmt::Display for CycleIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSnapshotData {
                intersection,
                road,
                source,
            } => write!(
                f,
                "missing {source:?} for intersection {intersection}, road {road}; using zero counts"
            ),
            Self::InvalidExternalDuration {
                intersection,
                road,
                value,
            } => match road {
                Some(road) => write!(
                    f,
                    "invalid duration {value} for intersection {intersection}, road {road}; using base duration"
                ),
                None => write!(
                    f,
                    "invalid duration {value} for intersection {intersection}; using base duration"
                ),
            },
            Self::HookUnavailable { hook, reason } => {
                write!(f, "{hook} unavailable ({reason}); falling back to reactive")
            }
            Self::ConfigInconsistency { message } => {
                write!(f, "configuration inconsistency: {message}")
            }
        }
    }
}

impl CycleIssue {
    /// Returns `true` if this issue means the cycle ran in degraded mode.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::HookUnavailable { .. } | Self::InvalidExternalDuration { .. }
        )
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `greenwave` operations.
pub type Result<T> = std::result::Result<T, GreenwaveError>;

// ============================================================================
// Tests
// ============================================================================
