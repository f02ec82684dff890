//! CLI command implementations

pub mod deploy;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use hg_deploy::cache::CacheRegistry;
use hg_deploy::config::{Settings, SourceConfig};
use hg_deploy::process::{HgRunner, SystemHg};
use hg_deploy::source::Source;

/// Load the configuration and build one [`Source`] per configured source,
/// all sharing a single cache registry.
pub(crate) fn load_sources(config: &Path) -> Result<Vec<Source>> {
    let settings = Settings::load(config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;

    let runner: Arc<dyn HgRunner> = Arc::new(SystemHg::new(
        settings.hg.binary.clone(),
        settings.hg.timeout(),
    ));
    let registry = Arc::new(CacheRegistry::new(settings.cache_root(), runner));

    let mut sources = Vec::new();
    for (name, source_config) in &settings.sources {
        sources.push(build_source(name, source_config, Arc::clone(&registry))?);
    }
    Ok(sources)
}

fn build_source(
    name: &str,
    config: &SourceConfig,
    registry: Arc<CacheRegistry>,
) -> Result<Source> {
    Source::new(
        name,
        &config.remote,
        &config.basedir,
        config.prefix,
        config.invalid_branches,
        registry,
    )
    .with_context(|| format!("failed to set up source '{}'", name))
}
