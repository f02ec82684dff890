//! # Status Command Implementation
//!
//! Reports the convergence state of every environment of every configured
//! source, one `source/environment: state` line per environment. Sources
//! whose cache has never been populated report as not ready rather than
//! failing; `deploy` populates the cache.

use std::path::Path;

use anyhow::Result;
use clap::Args;

/// Report environment convergence state
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Report only the named source
    #[arg(long, value_name = "NAME")]
    pub source: Option<String>,
}

pub fn execute(config: &Path, args: StatusArgs) -> Result<()> {
    let mut sources = super::load_sources(config)?;
    if let Some(only) = &args.source {
        sources.retain(|source| source.name() == only);
        if sources.is_empty() {
            anyhow::bail!("no such source '{}'", only);
        }
    }

    for mut source in sources {
        let name = source.name().to_string();
        let environments = source.environments()?;
        if environments.is_empty() {
            println!("{}: not ready (run deploy to populate the cache)", name);
            continue;
        }
        for environment in environments {
            println!(
                "{}/{}: {}",
                name,
                environment.dirname(),
                environment.working_dir().status()
            );
        }
    }
    Ok(())
}
