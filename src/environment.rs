//! # Deployable Environments
//!
//! An [`Environment`] is the thin domain object the rest of a deployment
//! pipeline sees: a name plus the [`WorkingDir`] that materializes it. It
//! holds no synchronization logic of its own; `sync` delegates to the
//! working directory and records that this process has brought the
//! environment up to date, which is what distinguishes `outdated` from
//! `insync` in its reported status.

use std::path::Path;

use log::debug;

use crate::cache::CacheRegistry;
use crate::error::Result;
use crate::rev::Rev;
use crate::working_dir::{Status, WorkingDir};

/// One deployable environment, backed by a working directory.
pub struct Environment {
    name: String,
    dirname: String,
    working_dir: WorkingDir,
    synced: bool,
}

impl Environment {
    /// Create an environment named `name`, materialized at
    /// `<basedir>/<dirname>` from `rev` of `remote`.
    pub fn new(
        name: &str,
        basedir: &Path,
        dirname: &str,
        remote: &str,
        rev: Rev,
        registry: &CacheRegistry,
    ) -> Result<Self> {
        let working_dir = WorkingDir::new(rev, remote, basedir, dirname, registry)?;
        Ok(Self {
            name: name.to_string(),
            dirname: dirname.to_string(),
            working_dir,
            synced: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory name this environment occupies under its basedir.
    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    pub fn working_dir(&self) -> &WorkingDir {
        &self.working_dir
    }

    /// Clone or update the environment's working directory.
    pub fn sync(&mut self) -> Result<()> {
        debug!("deploying environment {}", self.name);
        self.working_dir.sync()?;
        self.synced = true;
        Ok(())
    }

    /// The environment's convergence state.
    ///
    /// Absence and mismatch are read from disk; beyond that, an environment
    /// counts as outdated until this process has synced it, because its
    /// revision may have moved upstream since the last run.
    pub fn status(&self) -> Status {
        if !self.working_dir.exists() {
            Status::Absent
        } else if !self.working_dir.is_checkout() {
            Status::Mismatched
        } else if !self.synced {
            Status::Outdated
        } else {
            Status::InSync
        }
    }
}
