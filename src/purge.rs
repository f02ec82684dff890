//! # Purging Stray Directories
//!
//! The [`Purgeable`] capability reconciles a managed directory to exactly a
//! desired set of entries: whatever is on disk but not desired gets removed.
//! Implementors define what "desired" and "current" mean; [`crate::source::Source`]
//! scopes "current" to its own prefix glob so it never touches entries
//! belonging to another source.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::Result;

/// Capability for reconciling a managed directory against a desired set of
/// entry names.
pub trait Purgeable {
    /// The directory whose contents are managed.
    fn managed_directory(&self) -> &Path;

    /// The entry names that should exist.
    fn desired_contents(&self) -> Vec<String>;

    /// The entry names that currently exist and fall under this
    /// implementor's responsibility.
    fn current_contents(&self) -> Result<Vec<String>>;

    /// Current entries that are not desired.
    fn stale_contents(&self) -> Result<Vec<String>> {
        let desired = self.desired_contents();
        Ok(self
            .current_contents()?
            .into_iter()
            .filter(|name| !desired.contains(name))
            .collect())
    }

    /// Remove every stale entry, whether directory, file or symlink.
    /// Enumeration failures abort the purge before anything is deleted.
    fn purge(&self) -> Result<()> {
        let stale = self.stale_contents()?;
        for name in stale {
            let path = self.managed_directory().join(&name);
            info!("removing stale entry {}", path.display());
            if fs::symlink_metadata(&path)?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
