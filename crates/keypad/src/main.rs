//! `keypad`: route key presses from serial keypads to OBS and keyboard commands.

use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use config::{load_from_path, resolve_config_path};
use keypad_engine::Result;
use logging::LogArgs;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod setup;

#[derive(Parser, Debug)]
#[command(
    name = "keypad",
    about = "Bind keypad keys to OBS and keyboard commands",
    version,
    args_conflicts_with_subcommands = true
)]
/// Command-line interface for the `keypad` binary.
struct Cli {
    /// Optional subcommand.
    #[command(subcommand)]
    command: Option<Command>,

    /// Logging controls
    #[command(flatten)]
    log: LogArgs,

    /// Path to the config file (defaults to ~/.keypad.ron)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Load and validate the configuration then exit.
    Check {
        /// Path to configuration file to check (defaults to ~/.keypad.ron)
        path: Option<PathBuf>,
    },
}

/// Load, validate and report on a configuration file. Returns the exit code.
fn check(explicit: Option<&Path>) -> i32 {
    match resolve_config_path(explicit).and_then(|p| load_from_path(&p)) {
        Ok(_) => {
            println!("OK");
            0
        }
        Err(e) => {
            eprintln!("{}", e.pretty());
            1
        }
    }
}

/// Build the controller and run it until Ctrl-C.
async fn run(explicit: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(explicit)?;
    let cfg = load_from_path(&path)?;
    info!(path = %path.display(), "config_loaded");

    let controller = setup::build(&cfg).await?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("interrupt_received"),
            Err(e) => error!(error = %e, "signal_handler_failed"),
        }
        on_signal.cancel();
    });

    controller.run(shutdown).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log);

    if let Some(Command::Check { path }) = &cli.command {
        process::exit(check(path.as_deref().or(cli.config.as_deref())));
    }

    if let Err(e) = run(cli.config.as_deref()).await {
        error!(error = %e, "keypad_failed");
        eprintln!("{e}");
        process::exit(1);
    }
}
