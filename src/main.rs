//! Liszt - Building, Unit and Resident Registry
//!
//! Command-line front end over `liszt-core`. Each invocation opens the
//! configured backend, runs one registrar operation and prints the result
//! as JSON.
//!
//! Exit status:
//! - 0 on success
//! - 1 on invalid input, conflicts and storage failures
//! - 2 when the requested entity does not exist

mod cli;

use std::process::ExitCode;

use clap::Parser;
use liszt_core::{open_registrar, ErrorKind, RegistryError};

use crate::cli::{Cli, Output};

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status for a missing entity
const EXIT_NOT_FOUND: u8 = 2;

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env before clap reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging on stderr, stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Liszt v{}", APP_VERSION);

    let config = cli.registry_config()?;
    tracing::debug!(backend = ?config.backend, "Opening registrar");
    let registrar = open_registrar(&config).await?;

    let ctx = config.context();
    match cli::execute(registrar.as_ref(), &ctx, cli.command).await {
        Ok(Output::Json(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(Output::Missing { entity, id }) => {
            eprintln!("error: {entity} not found: {id}");
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
        Err(err)
            if err
                .downcast_ref::<RegistryError>()
                .is_some_and(|e| e.kind() == ErrorKind::NotFound) =>
        {
            eprintln!("error: {err}");
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
        Err(err) => Err(err),
    }
}
