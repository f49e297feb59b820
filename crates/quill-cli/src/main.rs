//! Quill CLI - notes from the terminal against a Quill backend.

mod cli;
mod commands;
mod error;
mod token_store;


use std::sync::Arc;

use clap::Parser;
use quill_core::ClientConfig;

use crate::cli::{Cli, Commands};
use crate::commands::assist::run_assist;
use crate::commands::auth_cmd::run_auth;
use crate::commands::notes::run_notes;
use crate::commands::Session;
use crate::error::CliError;
use crate::token_store::KeyringTokenStore;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if error.is_session_lost() {
            eprintln!("Your session has ended. Run `quill auth login` to sign in again.");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "quill=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let session = Session::open(config, Arc::new(KeyringTokenStore::default()))?;

    match cli.command {
        Commands::Auth { command } => run_auth(command, &session).await,
        Commands::Notes { command } => run_notes(command, &session).await,
        Commands::Assist { action, text } => run_assist(action.into(), &text, &session).await,
    }
}

/// File and environment settings, with `--api-url` taking precedence.
fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url.as_deref() {
        config.base_url = api_url.to_string();
        config.normalize()?;
    }
    Ok(config)
}
