//! chatpull - main entry point

use chatpull_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use chatpull_ingest::cli::{Cli, Commands};
use chatpull_ingest::commands;
use chatpull_ingest::IngestError;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Conventional exit status for SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Warn };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("chatpull")
        .build();

    // LOG_* variables take precedence; logging is optional for the CLI
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let guard = init_logging(&log_config).ok();

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let code = match run(&cli, cancel).await {
        Ok(code) => code,
        Err(err) => {
            debug!(kind = err.kind(), error = ?err, "Command failed");
            eprintln!("Error [{}]: {}", err.kind(), err);
            err.exit_code()
        },
    };

    // process::exit skips destructors
    drop(guard);
    process::exit(code);
}

async fn run(cli: &Cli, cancel: CancellationToken) -> Result<i32, IngestError> {
    match &cli.command {
        Commands::Pull(args) => {
            let outcome = commands::pull(args, cancel).await?;
            Ok(if outcome.interrupted { EXIT_INTERRUPTED } else { 0 })
        },
        Commands::Verify { summary } => {
            commands::verify(summary)?;
            Ok(0)
        },
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received; stopping after the current record");
                cancel.cancel();
            },
            Err(err) => {
                warn!(error = %err, "Could not install interrupt handler");
                return;
            },
        }

        // A second interrupt does not wait for the run to wind down
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted");
            process::exit(EXIT_INTERRUPTED);
        }
    });
}
