//! # Branch-Driven Environment Sources
//!
//! A [`Source`] maps the branches of one remote repository onto a set of
//! deployable environments under a base directory. `preload` brings the
//! source's mirror cache up to date; `environments` enumerates branch names
//! from the cache and builds one [`Environment`] per branch, passing each
//! name through the configured [`InvalidBranches`] policy; `purge`
//! reconciles the base directory to exactly the generated set.
//!
//! Until the cache has been populated at least once, `environments` returns
//! an empty list. That is a quiet not-ready state meaning "run preload
//! first", not an error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use log::{debug, error, warn};
use regex::Regex;
use serde::Deserialize;

use crate::cache::{Cache, CacheRegistry};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::repo::Repository;
use crate::rev::Rev;

/// How branch names that cannot be used as directory names are handled.
///
/// A name is invalid when it contains any character outside `[A-Za-z0-9_]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidBranches {
    /// Sanitize the name and emit a warning.
    #[default]
    CorrectAndWarn,
    /// Sanitize the name silently.
    Correct,
    /// Reject the branch, logging an error; no environment is produced.
    Error,
}

fn invalid_characters() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII word characters only: Unicode letters are invalid in dirnames.
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"))
}

/// A branch name on its way to becoming an environment directory name.
struct BranchName {
    name: String,
    sourcename: String,
    prefix: bool,
    validate: bool,
    correct: bool,
}

impl BranchName {
    fn new(name: String, sourcename: &str, prefix: bool, invalid: InvalidBranches) -> Self {
        let (validate, correct) = match invalid {
            InvalidBranches::CorrectAndWarn => (true, true),
            InvalidBranches::Correct => (false, true),
            InvalidBranches::Error => (true, false),
        };
        Self {
            name,
            sourcename: sourcename.to_string(),
            prefix,
            validate,
            correct,
        }
    }

    fn valid(&self) -> bool {
        if self.validate {
            !invalid_characters().is_match(&self.name)
        } else {
            true
        }
    }

    fn correct(&self) -> bool {
        self.correct
    }

    /// The directory name for this branch: optionally prefixed with the
    /// source name, with non-word characters replaced when correcting.
    fn dirname(&self) -> String {
        let mut dir = self.name.clone();
        if self.prefix {
            dir = format!("{}_{}", self.sourcename, dir);
        }
        if self.correct {
            dir = invalid_characters().replace_all(&dir, "_").into_owned();
        }
        dir
    }
}

/// A source of environments: one remote repository whose branches are
/// deployed under one base directory.
pub struct Source {
    name: String,
    remote: String,
    basedir: PathBuf,
    prefix: bool,
    invalid_branches: InvalidBranches,
    cache: Arc<Cache>,
    registry: Arc<CacheRegistry>,
    environments: Option<Vec<Environment>>,
}

impl Source {
    pub fn new(
        name: &str,
        remote: &str,
        basedir: &Path,
        prefix: bool,
        invalid_branches: InvalidBranches,
        registry: Arc<CacheRegistry>,
    ) -> Result<Self> {
        let cache = registry.get(remote)?;
        Ok(Self {
            name: name.to_string(),
            remote: remote.to_string(),
            basedir: basedir.to_path_buf(),
            prefix,
            invalid_branches,
            cache,
            registry,
            environments: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Update the source's mirror cache to get the latest list of branches.
    /// Idempotent; safe to call before every run.
    pub fn preload(&self) -> Result<()> {
        debug!(
            "determining current branches for mercurial source {:?}",
            self.remote
        );
        self.cache.sync()
    }

    /// The environments generated from the source's branches.
    ///
    /// Returns an empty slice while the cache has never been populated;
    /// otherwise the list is generated on first call and memoized for the
    /// lifetime of the source.
    pub fn environments(&mut self) -> Result<&[Environment]> {
        self.ensure_environments()?;
        Ok(self.environments.as_deref().unwrap_or_default())
    }

    fn ensure_environments(&mut self) -> Result<()> {
        if !self.cache.cached() {
            return Ok(());
        }
        if self.environments.is_none() {
            self.environments = Some(self.generate_environments()?);
        }
        Ok(())
    }

    fn generate_environments(&self) -> Result<Vec<Environment>> {
        let mut environments = Vec::new();
        for branch in self.cache.branches()? {
            let bn = BranchName::new(branch, &self.name, self.prefix, self.invalid_branches);
            if bn.valid() {
                environments.push(self.environment_for(&bn)?);
            } else if bn.correct() {
                warn!(
                    "environment {:?} contained non-word characters, correcting name to {:?}",
                    bn.name,
                    bn.dirname()
                );
                environments.push(self.environment_for(&bn)?);
            } else {
                error!(
                    "environment {:?} contained non-word characters, ignoring it",
                    bn.name
                );
            }
        }
        Ok(environments)
    }

    fn environment_for(&self, bn: &BranchName) -> Result<Environment> {
        Environment::new(
            &bn.name,
            &self.basedir,
            &bn.dirname(),
            &self.remote,
            Rev::branch(bn.name.clone()),
            &self.registry,
        )
    }

    /// Sync every generated environment, isolating failures: one broken
    /// environment does not abort its siblings. The first error is returned
    /// after all environments have been attempted.
    pub fn sync_all(&mut self) -> Result<()> {
        self.ensure_environments()?;
        let mut first_err: Option<Error> = None;
        if let Some(environments) = self.environments.as_mut() {
            for environment in environments {
                if let Err(e) = environment.sync() {
                    error!(
                        "failed to deploy environment {}: {}",
                        environment.name(),
                        e
                    );
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e.sync_context(format!(
                "source '{}' failed to deploy some environments",
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Remove directories under the basedir that no longer correspond to a
    /// generated environment.
    ///
    /// Refuses to act until environments have been generated: an empty
    /// desired set would make every directory look stale.
    pub fn purge(&mut self) -> Result<()> {
        if self.environments()?.is_empty() {
            debug!(
                "source '{}' has no generated environments, skipping purge",
                self.name
            );
            return Ok(());
        }
        crate::purge::Purgeable::purge(self)
    }
}

impl crate::purge::Purgeable for Source {
    fn managed_directory(&self) -> &Path {
        &self.basedir
    }

    fn desired_contents(&self) -> Vec<String> {
        self.environments
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|environment| environment.dirname().to_string())
            .collect()
    }

    /// Entries on disk that fall under this source's responsibility. When
    /// prefixing is enabled, only entries matching the source's own
    /// `<name>_*` glob are considered, so sources sharing a basedir never
    /// purge each other's directories.
    fn current_contents(&self) -> Result<Vec<String>> {
        let glob_part = if self.prefix {
            format!("{}_*", self.name)
        } else {
            "*".to_string()
        };
        let pattern = self.basedir.join(glob_part);

        let mut names = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry?;
            if let Some(name) = path.file_name() {
                names.push(name.to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}
