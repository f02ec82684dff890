//! # Working Directory Convergence
//!
//! A [`WorkingDir`] is a real checkout of one revision of one remote, rooted
//! at `<basedir>/<dirname>`. Its job is convergence: `sync` drives the
//! directory from whatever state it is in (absent, stale, drifted) to a
//! clean checkout of the resolved revision, going through the per-remote
//! mirror cache for every network operation.
//!
//! The on-disk remote configuration is the `[paths]` section of
//! `.hg/hgrc`: `default` points at the upstream URL, `cache` at the mirror.
//! It is rewritten wholesale whenever it drifts from expected.
//!
//! When the checked-out content differs from the target but the revision's
//! refresh policy does not require a fetch, the checkout runs directly
//! against already-known history without pulling first. A fixed tag or
//! changeset that already resolves locally cannot move, so a pull could only
//! waste a network round trip.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ini::Ini;
use log::debug;

use crate::cache::{Cache, CacheRegistry};
use crate::error::Result;
use crate::process::HgRunner;
use crate::repo::Repository;
use crate::rev::Rev;

/// Derived convergence state of a working directory. Never stored;
/// recomputed from disk and from the revision on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The target path does not exist.
    Absent,
    /// The path exists but is not a valid checkout, or its configured
    /// remotes differ from expected.
    Mismatched,
    /// The revision needs a refresh, or the checked-out content differs
    /// from the resolved target.
    Outdated,
    InSync,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Absent => "absent",
            Status::Mismatched => "mismatched",
            Status::Outdated => "outdated",
            Status::InSync => "insync",
        };
        f.write_str(name)
    }
}

/// A managed checkout of one revision of one remote repository.
pub struct WorkingDir {
    rev: Rev,
    remote: String,
    path: PathBuf,
    hg_dir: PathBuf,
    hgrc_path: PathBuf,
    cache: Arc<Cache>,
    runner: Arc<dyn HgRunner>,
}

impl WorkingDir {
    /// Create a working directory for `rev` of `remote` at
    /// `<basedir>/<dirname>`, backed by the registry's cache for that
    /// remote.
    pub fn new(
        rev: Rev,
        remote: &str,
        basedir: &Path,
        dirname: &str,
        registry: &CacheRegistry,
    ) -> Result<Self> {
        let path = basedir.join(dirname);
        let hg_dir = path.join(".hg");
        let hgrc_path = hg_dir.join("hgrc");
        let cache = registry.get(remote)?;
        Ok(Self {
            rev,
            remote: remote.to_string(),
            path,
            hg_dir,
            hgrc_path,
            cache,
            runner: registry.runner(),
        })
    }

    /// The upstream remote this checkout tracks.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// The revision this checkout converges to.
    pub fn rev(&self) -> &Rev {
        &self.rev
    }

    /// Does a directory exist where we expect the working dir to be?
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Whether the path holds a valid checkout (the `.hg` metadata
    /// directory is present).
    pub fn is_checkout(&self) -> bool {
        self.hg_dir.is_dir()
    }

    /// Converge the working directory: clone it into existence if it is not
    /// a valid checkout, update it otherwise.
    pub fn sync(&self) -> Result<()> {
        if self.is_checkout() {
            self.update()
        } else {
            self.clone_from_cache()
        }
    }

    fn clone_from_cache(&self) -> Result<()> {
        self.cache.sync()?;
        debug!(
            "cloning {} from mirror into {}",
            self.remote,
            self.path.display()
        );
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mirror = self.cache.path().display().to_string();
        let dest = self.path.display().to_string();
        self.runner
            .run(&["clone", &mirror, &dest], None, false)
            .map_err(|e| e.sync_context(format!("couldn't clone {} from its cache", self.remote)))?;
        self.write_remotes()?;
        self.checkout()
    }

    fn update(&self) -> Result<()> {
        if self.remotes_drifted()? {
            self.write_remotes()?;
        }

        if self.rev.needs_fetch(self) {
            self.cache.sync()?;
            self.pull("cache")
                .map_err(|e| e.sync_context(format!("couldn't pull {} from its cache", self.remote)))?;
            self.checkout()
        } else if self.needs_checkout() {
            self.checkout()
        } else {
            Ok(())
        }
    }

    /// Force the working tree to the resolved revision, discarding local
    /// modifications. Idempotent: succeeds identically whether or not the
    /// tree was already there.
    pub fn checkout(&self) -> Result<()> {
        self.rev
            .resolve(self)
            .and_then(|id| {
                self.runner
                    .run(&["checkout", "--clean", &id], Some(&self.path), false)
                    .map(|_| ())
            })
            .map_err(|e| e.sync_context(format!("cannot check out revision '{}'", self.rev)))
    }

    /// The changeset id the working tree is currently at, if determinable.
    pub fn current_id(&self) -> Result<Option<String>> {
        let output = self
            .runner
            .run(&["id", "-i", "--debug"], Some(&self.path), true)?;
        if !output.success() {
            return Ok(None);
        }
        Ok(output
            .stdout
            .split_whitespace()
            .next()
            .map(|id| id.trim_end_matches('+').to_string()))
    }

    /// Whether this working directory requires a sync: the revision's
    /// refresh policy demands a fetch, or the checked-out content differs
    /// from the resolved target.
    pub fn outdated(&self) -> bool {
        self.rev.needs_fetch(self) || self.needs_checkout()
    }

    /// Derived convergence state, recomputed from disk.
    pub fn status(&self) -> Status {
        if !self.exists() {
            return Status::Absent;
        }
        if !self.is_checkout() {
            return Status::Mismatched;
        }
        // An unreadable remote configuration counts as mismatched so a
        // partially-failed clone never reports in-sync.
        match self.remotes_drifted() {
            Err(_) | Ok(true) => Status::Mismatched,
            Ok(false) => {
                if self.outdated() {
                    Status::Outdated
                } else {
                    Status::InSync
                }
            }
        }
    }

    /// Does the expected revision differ from the actual checked-out one?
    /// Resolution failures on either side make this `false`; the refresh
    /// policy already forces a sync for unresolvable revisions.
    fn needs_checkout(&self) -> bool {
        match (self.rev.resolve(self), self.current_id()) {
            (Ok(expected), Ok(Some(actual))) => expected != actual,
            _ => false,
        }
    }

    /// Whether the on-disk remote configuration differs from expected.
    fn remotes_drifted(&self) -> Result<bool> {
        let remotes = self.remotes()?;
        let cache_path = self.cache.path().display().to_string();
        Ok(remotes.get("default").map(String::as_str) != Some(self.remote.as_str())
            || remotes.get("cache").map(String::as_str) != Some(cache_path.as_str()))
    }

    /// Rewrite the `[paths]` section of `.hg/hgrc` wholesale, mapping
    /// `default` to the upstream URL and `cache` to the mirror path. Other
    /// sections of an existing hgrc are preserved.
    fn write_remotes(&self) -> Result<()> {
        let mut hgrc = if self.hgrc_path.exists() {
            Ini::load_from_file(&self.hgrc_path)?
        } else {
            Ini::new()
        };
        hgrc.delete(Some("paths"));
        hgrc.with_section(Some("paths"))
            .set("default", self.remote.as_str())
            .set("cache", self.cache.path().display().to_string());
        hgrc.write_to_file(&self.hgrc_path)?;
        Ok(())
    }
}

impl Repository for WorkingDir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn runner(&self) -> &dyn HgRunner {
        self.runner.as_ref()
    }

    /// Prefer the cache's copy of history for remote lookups.
    fn remote_lookup_source(&self) -> &str {
        "cache"
    }
}
