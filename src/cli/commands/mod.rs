//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod run;
pub mod validate;
pub mod version;

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::{ExitCode, GreenwaveError};
use crate::observability::StopReason;

/// Graceful-shutdown handle shared between the signal handler and commands.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    /// Creates an untriggered handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Only the first reason is kept.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown was requested.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Returns why shutdown was requested.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Process exit code for a command that returned `Ok`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.reason() {
            Some(StopReason::Interrupted) => ExitCode::INTERRUPTED,
            Some(StopReason::Terminated) => ExitCode::TERMINATED,
            Some(StopReason::Completed) | None => ExitCode::SUCCESS,
        }
    }
}

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, shutdown: Shutdown) -> Result<(), GreenwaveError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, shutdown).await,
        Commands::Validate(args) => validate::validate(&args),
        Commands::Version(args) => version::run(&args),
    }
}
