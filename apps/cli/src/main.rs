mod bus;
mod cli;
mod commands;
mod exit_codes;
mod progress;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use ispflash_core::{CancelToken, UpdateConfig};
use tracing::{error, info, warn};

use cli::Cli;
use commands::Env;

fn load_config(cli: &Cli) -> Result<UpdateConfig> {
    match &cli.config {
        Some(path) => UpdateConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(UpdateConfig::default()),
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if cli.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber is already installed");
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {:#}", e);
            process::exit(exit_codes::EXIT_USAGE);
        }
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current transaction");
        handler_token.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let env = Env { config, cancel };
    let code = match commands::run(&env, cli.command) {
        Ok(()) => exit_codes::EXIT_OK,
        Err(e) => {
            error!("Error: {:#}", e);
            exit_codes::for_error(&e)
        }
    };
    if code == exit_codes::EXIT_OK {
        info!("Done");
    }
    process::exit(code);
}
