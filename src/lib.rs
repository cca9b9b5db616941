pub mod core;
mod commands;

use clap::Parser;
use indicatif::MultiProgress;
use tracing_subscriber::EnvFilter;

use crate::commands::{Cli, ExitStatus, LogWriter};

/// Parse arguments, run one update and return the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let progress = MultiProgress::new();

    let default_filter = if cli.verbose {
        "warn,neoforge_updater_lib=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(LogWriter::new(progress.clone()))
        .init();

    tracing::info!("NeoForge updater {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            eprintln!("Failed to start: {}", e);
            return ExitStatus::StartupFailed.code();
        }
    };

    runtime.block_on(commands::update(&cli, progress)).code()
}
