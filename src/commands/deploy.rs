//! # Deploy Command Implementation
//!
//! Syncs every configured source: preload the mirror cache, generate one
//! environment per upstream branch, converge each working directory, and
//! optionally purge directories no longer backed by a branch.
//!
//! Failures are isolated per source: a broken remote does not abort the
//! deployment of independent sources.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use log::error;

use hg_deploy::source::Source;

/// Sync environments from their sources
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Remove environment directories no longer backed by a branch
    #[arg(long)]
    pub purge: bool,

    /// Deploy only the named source
    #[arg(long, value_name = "NAME")]
    pub source: Option<String>,
}

pub fn execute(config: &Path, args: DeployArgs) -> Result<()> {
    let mut sources = super::load_sources(config)?;
    if let Some(only) = &args.source {
        sources.retain(|source| source.name() == only);
        if sources.is_empty() {
            anyhow::bail!("no such source '{}'", only);
        }
    }

    let mut failed = false;
    for mut source in sources {
        if let Err(e) = deploy_source(&mut source, args.purge) {
            error!("failed to deploy source '{}': {}", source.name(), e);
            failed = true;
        }
    }

    if failed {
        anyhow::bail!("one or more sources failed to deploy");
    }
    Ok(())
}

fn deploy_source(source: &mut Source, purge: bool) -> Result<()> {
    source.preload()?;
    source.sync_all()?;
    if purge {
        source.purge()?;
    }
    Ok(())
}
