mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use testservices::{Config, Error as TestServicesError, Parser as ConfigParser, ServiceFactory};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(error) = e.downcast_ref::<TestServicesError>() {
            eprintln!("Error: {}", error);
            if let Some(suggestion) = error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let out = output::CliOutput;

    // ── Commands that only need the config file ─────────────────────
    if let Commands::Validate = cli.command {
        return commands::run_validate(cli.config.clone(), &out);
    }

    let config_path = resolve_config_path(cli.config.clone())?;
    let config = load_config(&config_path)?;
    let collection = ServiceFactory::from_env().collection(&config)?;

    match cli.command {
        Commands::Check { needs, json } => {
            commands::run_check(&collection, &needs, json, &out).await?;
        }
        Commands::Up { needs, json } => {
            commands::run_up(&collection, &needs, json, &out).await?;
        }
        Commands::Get {
            need,
            format,
            prefix,
        } => {
            commands::run_get(&collection, &need, format, prefix.as_deref(), &out).await?;
        }
        Commands::Down { needs } => {
            commands::run_down(&collection, &needs, &out).await?;
        }
        Commands::Validate => unreachable!("handled before loading services"),
    }

    Ok(())
}

/// Resolve the config file from CLI `--config` or by searching upwards from the cwd.
fn resolve_config_path(config: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match config {
        Some(path) => Ok(path),
        None => Ok(ConfigParser::new().find_config_file()?),
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = ConfigParser::new().load_config(path)?;
    tracing::debug!("Using config {}", path.display());
    Ok(config)
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
