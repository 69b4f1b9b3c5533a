pub mod cli;
pub mod commands;
pub mod core;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::core::state::{AppPaths, AppState};

/// Log filter for a `-v` count; `RUST_LOG` takes precedence.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_target(false)
        .without_time()
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Cannot start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let paths = AppPaths::resolve(cli.home);
    tracing::debug!("Data root: {:?}", paths.root());

    let show_progress = std::io::stderr().is_terminal();
    let mut state = AppState::open(paths, show_progress).await?;
    commands::execute(&mut state, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_log_level() {
        assert!(EnvFilter::try_new(default_filter(0)).is_ok());
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(1), "debug");
        assert_eq!(default_filter(2), default_filter(5));
    }
}
