use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "testsvc")]
#[command(about = "testservices - Provision the services a test suite needs")]
pub struct Cli {
    /// Config file path (defaults to testservices.yaml, searched upwards)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which candidates are possible and which already exist
    Check {
        /// Needs to check (defaults to all)
        needs: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Provision needs
    Up {
        /// Needs to provision (defaults to all)
        needs: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Provision one need and print how to connect to it
    Get {
        /// Need name
        need: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Env)]
        format: Format,

        /// Prefix for exported variable names (defaults to the need name)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Remove everything the possible candidates started
    Down {
        /// Needs to tear down (defaults to all)
        needs: Vec<String>,
    },
    /// Validate configuration without provisioning anything
    Validate,
}

/// How `get` prints a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// `export NAME=value` lines
    Env,
    /// The handle as JSON
    Json,
    /// A connection URL
    Url,
}
