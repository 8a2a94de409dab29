mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lcolamps_config::{Config, ConfigError};
use lcolamps_core::{BackendKind, LampSet, SwitchController};
use lcolamps_driver::{ActorClient, LampDriver, M2Client};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(lcolamps_config::config_path);
    if !config_path.exists() {
        return Err(CliError::Config {
            path: config_path.display().to_string(),
            source: ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )),
        });
    }
    let config =
        lcolamps_config::load(Some(&config_path)).map_err(|source| CliError::Config {
            path: config_path.display().to_string(),
            source,
        })?;

    let controller = build_controller(&config)?;

    tracing::debug!(command = ?cli.command, "dispatching command");
    commands::dispatch(cli.command, &controller, &cli.global).await
}

/// Assemble the controller: lamp set, policy, and one driver per
/// configured backend section.
fn build_controller(config: &Config) -> Result<SwitchController, CliError> {
    let set = LampSet::new(config.lamp_configs().map_err(invalid_config)?)?;
    let policy = config.controller_policy().map_err(invalid_config)?;

    let mut controller = SwitchController::new(set, policy);
    if let Some(m2) = &config.m2 {
        let client = M2Client::new(m2.host.clone(), m2.port);
        controller = controller.with_driver(BackendKind::M2, Arc::new(client) as Arc<dyn LampDriver>);
    }
    if let Some(actor) = &config.actor {
        let client = ActorClient::new(actor.host.clone(), actor.port);
        controller =
            controller.with_driver(BackendKind::Actor, Arc::new(client) as Arc<dyn LampDriver>);
    }
    controller.ensure_drivers()?;

    Ok(controller)
}

fn invalid_config(err: lcolamps_config::ConfigError) -> CliError {
    CliError::Validation {
        field: "config".into(),
        reason: err.to_string(),
    }
}
