//! gqlbatch CLI - binary entry point.
//!
//! ```text
//! main() -> Cli::parse() -> RunSettings::load(flags, --config) -> init_tracing()
//!        -> gqlbatch_engine::run(settings, cancel)   (Ctrl-C cancels)
//! ```
//!
//! # Exit Status
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Every row was read and recorded; individual rows may have failed |
//! | 1 | Configuration, pre-flight or output error |
//! | 130 | Interrupted; admitted rows were drained and recorded |

mod args;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::{Cli, Commands};
use gqlbatch_config::{RunSettings, config_path};
use gqlbatch_engine::RunSummary;

const LOG_ENV: &str = "GQLBATCH_LOG";
const EXIT_INTERRUPTED: u8 = 130;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

fn print_version(short: bool, explicit_config: Option<&Path>) {
    let version = env!("CARGO_PKG_VERSION");
    if short {
        println!("{version}");
        return;
    }
    let config = explicit_config
        .map(Path::to_path_buf)
        .or_else(|| config_path().filter(|path| path.exists()));
    println!("Version: {version}");
    match config {
        Some(path) => println!("Configuration: {}", path.display()),
        None => println!("Configuration: none"),
    }
}

/// Cancel `cancel` on the first Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupted; finishing in-flight rows");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

async fn run_batch(cli: Cli) -> Result<RunSummary> {
    let settings = RunSettings::load(cli.run.into_layer(), cli.config.as_deref())
        .context("invalid configuration")?;

    init_tracing(settings.verbose);
    if let Some(path) = &settings.config_file {
        tracing::info!(path = %path.display(), "Using config file");
    }
    tracing::debug!(?settings, "Resolved settings");

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let summary = gqlbatch_engine::run(&settings, cancel).await?;
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Version { short }) = cli.command {
        print_version(short, cli.config.as_deref());
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run_batch(cli));
    // An interrupted stdin read stays parked on a blocking thread; exit without joining it.
    runtime.shutdown_background();

    match result {
        Ok(summary) if summary.cancelled => ExitCode::from(EXIT_INTERRUPTED),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
