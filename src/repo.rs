//! # Repository Gateway
//!
//! The [`Repository`] trait is the gateway to one on-disk Mercurial
//! repository: it resolves revision specs to canonical changeset ids, lists
//! tags and branches, enumerates configured remotes, and pulls new history.
//! Both the mirror cache ([`crate::cache::Cache`]) and the checkout
//! ([`crate::working_dir::WorkingDir`]) implement it; the only behavioral
//! difference between the two is which named remote is consulted when a
//! local lookup misses.
//!
//! Resolution is deliberately a two-outcome operation: [`Repository::lookup_rev`]
//! returns `Ok(None)` when the spec simply is not known, and reserves `Err`
//! for failures to ask the question at all. Callers that need a concrete id
//! go through [`Repository::resolve_rev`], which turns `None` into
//! [`Error::UnresolvableRev`].

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::process::HgRunner;

/// Gateway to a single on-disk Mercurial repository.
pub trait Repository {
    /// The path to the repository root.
    fn path(&self) -> &Path;

    /// The runner used to drive the `hg` binary against [`Repository::path`].
    fn runner(&self) -> &dyn HgRunner;

    /// The named remote consulted when a revision cannot be resolved
    /// locally. Working directories override this to prefer their mirror
    /// cache's copy of history.
    fn remote_lookup_source(&self) -> &str {
        "default"
    }

    /// Resolve a revision spec to a changeset id, trying the local history
    /// first and the named lookup source second.
    ///
    /// Returns `Ok(None)` when neither knows the spec.
    fn lookup_rev(&self, spec: &str) -> Result<Option<String>> {
        if let Some(id) = self.lookup_rev_in(spec, None)? {
            return Ok(Some(id));
        }
        self.lookup_rev_in(spec, Some(self.remote_lookup_source()))
    }

    /// Resolve a revision spec against the local history, or against a named
    /// remote when `source` is given.
    fn lookup_rev_in(&self, spec: &str, source: Option<&str>) -> Result<Option<String>> {
        let mut args = vec!["id", "-r", spec, "-i", "--debug"];
        if let Some(source) = source {
            args.push(source);
        }
        let output = self.runner().run(&args, Some(self.path()), true)?;
        if !output.success() {
            return Ok(None);
        }
        Ok(first_token(&output.stdout).map(|id| id.trim_end_matches('+').to_string()))
    }

    /// Resolve a revision spec to a changeset id, failing with
    /// [`Error::UnresolvableRev`] when neither local nor remote lookup
    /// succeeds.
    fn resolve_rev(&self, spec: &str) -> Result<String> {
        self.lookup_rev(spec)?
            .ok_or_else(|| Error::UnresolvableRev {
                rev: spec.to_string(),
                path: self.path().display().to_string(),
            })
    }

    /// Tag names, in the order the binary reports them.
    fn tags(&self) -> Result<Vec<String>> {
        self.list("tags")
    }

    /// Branch names, in the order the binary reports them.
    fn branches(&self) -> Result<Vec<String>> {
        self.list("branches")
    }

    /// First whitespace-delimited token of each output line of the given
    /// listing command.
    fn list(&self, command: &str) -> Result<Vec<String>> {
        let output = self.runner().run(&[command], Some(self.path()), false)?;
        Ok(output
            .stdout
            .lines()
            .filter_map(first_token_of_line)
            .collect())
    }

    /// The remotes configured for this repository, as a name-to-URL mapping
    /// parsed from `name = url` shaped output lines.
    fn remotes(&self) -> Result<HashMap<String, String>> {
        let output = self.runner().run(&["paths"], Some(self.path()), false)?;
        let mut remotes = HashMap::new();
        for line in output.stdout.lines() {
            if let Some((name, url)) = line.split_once('=') {
                remotes.insert(name.trim().to_string(), url.trim().to_string());
            }
        }
        Ok(remotes)
    }

    /// Pull new changesets from the named remote into this repository's
    /// history. Never touches the working tree.
    fn pull(&self, remote: &str) -> Result<()> {
        self.runner()
            .run(&["pull", remote], Some(self.path()), false)?;
        Ok(())
    }
}

fn first_token(stdout: &str) -> Option<String> {
    stdout.lines().next().and_then(first_token_of_line)
}

fn first_token_of_line(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}
