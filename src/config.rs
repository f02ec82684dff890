//! # Deployment Configuration
//!
//! This module defines the schema of the YAML deployment file and the logic
//! for loading it. A minimal file names one source:
//!
//! ```yaml
//! sources:
//!   main:
//!     remote: https://hg.example.org/control
//!     basedir: /srv/environments
//! ```
//!
//! Optional top-level settings select the cache root (defaulting to a
//! per-user dotfile path) and how the `hg` binary is invoked; per-source
//! settings control directory-name prefixing and the invalid-branch-name
//! policy.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::source::InvalidBranches;

/// Top-level deployment settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Root directory for per-remote mirror caches. Defaults to
    /// `~/.hg-deploy/cache`.
    #[serde(default)]
    pub cachedir: Option<PathBuf>,

    /// How the Mercurial binary is invoked.
    #[serde(default)]
    pub hg: HgSettings,

    /// The sources to deploy, keyed by source name.
    pub sources: BTreeMap<String, SourceConfig>,
}

/// Settings for driving the `hg` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HgSettings {
    /// Name or path of the binary.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Time budget for a single invocation, in seconds. Expiry is treated
    /// as a sync failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HgSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HgSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_binary() -> String {
    "hg".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Configuration of one environment source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// The pathname or URI of the remote repository.
    pub remote: String,

    /// The base directory the generated environments are created under.
    pub basedir: PathBuf,

    /// Whether to prefix the source name to environment directory names, to
    /// avoid collisions between sources sharing a basedir.
    #[serde(default)]
    pub prefix: bool,

    /// How branch names that cannot be used as directory names are handled.
    #[serde(default)]
    pub invalid_branches: InvalidBranches,
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse settings from a YAML string.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The effective cache root: the configured one, or the per-user
    /// default.
    pub fn cache_root(&self) -> PathBuf {
        self.cachedir.clone().unwrap_or_else(default_cache_root)
    }
}

/// Default per-user mirror cache root.
pub fn default_cache_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".hg-deploy")
        .join("cache")
}
