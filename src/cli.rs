//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// hg-deploy - Deploy Mercurial branches as on-disk environments
#[derive(Parser, Debug)]
#[command(name = "hg-deploy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the deployment configuration file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "HG_DEPLOY_CONFIG",
        default_value = "hg-deploy.yaml"
    )]
    config: PathBuf,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync every source's environments to their upstream branches
    Deploy(commands::deploy::DeployArgs),

    /// Report the convergence state of every environment
    Status(commands::status::StatusArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.log_level),
        )
        .try_init()
        .ok();

        match self.command {
            Commands::Deploy(args) => commands::deploy::execute(&self.config, args),
            Commands::Status(args) => commands::status::execute(&self.config, args),
        }
    }
}
