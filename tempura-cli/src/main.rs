//! Binary crate for the `tempura` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Human-friendly output and the live dashboard

use clap::Parser;
use std::process::ExitCode;
use tempura_core::AppError;
use tracing_subscriber::EnvFilter;

mod cli;
mod dashboard;
mod output;

/// Exit status for weather service failures; anything else exits with 1.
const EXIT_WEATHER_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = cli::Cli::parse();
    init_tracing(cmd.verbose, cmd.is_fullscreen());

    match cmd.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, message) = exit_status(&err);
            eprintln!("{message}");
            ExitCode::from(code)
        }
    }
}

/// Exit code and stderr text for a failed command.
fn exit_status(err: &anyhow::Error) -> (u8, String) {
    match err.downcast_ref::<AppError>() {
        Some(app_err) => (
            EXIT_WEATHER_ERROR,
            format!("Error: {app_err}\n{}", app_err.remediation()),
        ),
        None => (1, format!("Error: {err:#}")),
    }
}

/// Logs go to stderr so stdout stays clean. `RUST_LOG` wins over `--verbose`.
/// The dashboard shows errors itself, so it logs nothing unless asked.
fn init_tracing(verbose: bool, fullscreen: bool) {
    let default = match (verbose, fullscreen) {
        (true, _) => "debug",
        (false, true) => "off",
        (false, false) => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
