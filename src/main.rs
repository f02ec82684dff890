//! # hg-deploy CLI
//!
//! This is the binary entry point for the `hg-deploy` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initializing logging.
//! - Executing the appropriate command based on the parsed arguments.
//!
//! The core synchronization logic lives in the `hg_deploy` library crate;
//! the binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
