//! `validate` command
//!
//! Loads each configuration file through the full loader pipeline and
//! reports warnings and errors without running the controller.

use std::path::Path;

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadResult};
use crate::error::{ConfigError, GreenwaveError, Severity, ValidationIssue};

/// Validate configuration files.
///
/// Every file is checked even after a failure; the first failure is
/// returned.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or a config error if
/// a file fails validation (or has warnings under `--strict`).
pub fn validate(args: &ValidateArgs) -> Result<(), GreenwaveError> {
    let loader = ConfigLoader::with_defaults();
    let mut first_error = None;

    for path in &args.files {
        let result = validate_file(&loader, path, args.strict);
        report(path, &result, args.format)?;
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn validate_file(
    loader: &ConfigLoader,
    path: &Path,
    strict: bool,
) -> Result<LoadResult, GreenwaveError> {
    if !path.exists() {
        return Err(GreenwaveError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }
    tracing::info!(file = %path.display(), "validating configuration");

    let loaded = loader.load(path)?;

    if strict && !loaded.warnings.is_empty() {
        let errors = loaded
            .warnings
            .iter()
            .map(|w| ValidationIssue {
                path: w.location.clone().unwrap_or_default(),
                message: w.message.clone(),
                severity: Severity::Warning,
            })
            .collect();
        return Err(ConfigError::ValidationError {
            path: path.display().to_string(),
            errors,
        }
        .into());
    }

    Ok(loaded)
}

fn report(
    path: &Path,
    result: &Result<LoadResult, GreenwaveError>,
    format: OutputFormat,
) -> Result<(), GreenwaveError> {
    match (format, result) {
        (OutputFormat::Human, Ok(loaded)) => {
            for warning in &loaded.warnings {
                println!("{}: warning: {warning}", path.display());
            }
            println!("{}: ok", path.display());
        }
        (OutputFormat::Human, Err(err)) => {
            println!("{}: {err}", path.display());
        }
        (OutputFormat::Json, Ok(loaded)) => {
            let warnings: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
            let doc = json!({ "file": path, "valid": true, "warnings": warnings });
            println!("{}", serde_json::to_string(&doc)?);
        }
        (OutputFormat::Json, Err(err)) => {
            let doc = json!({ "file": path, "valid": false, "error": err.to_string() });
            println!("{}", serde_json::to_string(&doc)?);
        }
    }
    Ok(())
}
