//! `greenwave` - adaptive traffic-signal phase decision engine

use clap::Parser;

use greenwave::cli::args::Cli;
use greenwave::cli::commands::{self, Shutdown};
use greenwave::error::ExitCode;
use greenwave::observability::{StopReason, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    let shutdown = Shutdown::new();

    // Spawn signal handler for graceful shutdown
    let handler = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        let reason = tokio::select! {
            _ = tokio::signal::ctrl_c() => StopReason::Interrupted,
            _ = sigterm.recv() => StopReason::Terminated,
        };

        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        handler.trigger(reason);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    match commands::dispatch(cli, shutdown.clone()).await {
        Ok(()) => std::process::exit(shutdown.exit_code()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
