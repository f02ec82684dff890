//! # Per-Remote Mirror Caches
//!
//! Working directories never talk to the network directly: every remote gets
//! one full local mirror under the cache root, and clones and pulls go
//! through it. A [`Cache`] wraps one such mirror; the [`CacheRegistry`]
//! hands out at most one `Cache` per distinct remote string, so concurrent
//! consumers share the "already synced this run" flag and cannot race
//! duplicate clones of the same mirror.
//!
//! The mirror's directory name is derived deterministically from the remote
//! by replacing every character outside `[A-Za-z0-9@._-]` with `-`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{Error, Result};
use crate::process::HgRunner;
use crate::repo::Repository;

/// A mirror of one remote repository.
pub struct Cache {
    remote: String,
    root: PathBuf,
    path: PathBuf,
    runner: Arc<dyn HgRunner>,
    synced: Mutex<bool>,
}

impl Cache {
    fn new(remote: &str, root: &Path, runner: Arc<dyn HgRunner>) -> Self {
        let path = root.join(sanitized_dirname(remote));
        Self {
            remote: remote.to_string(),
            root: root.to_path_buf(),
            path,
            runner,
            synced: Mutex::new(false),
        }
    }

    /// The remote this cache mirrors.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Bring the mirror up to date with its remote.
    ///
    /// Idempotent per process run: the first call clones or pulls, later
    /// calls are no-ops. The synced flag is held locked for the duration of
    /// the network operation, so only one sync per cache is ever in flight.
    pub fn sync(&self) -> Result<()> {
        let mut synced = self.synced.lock().map_err(|_| Error::LockPoisoned {
            context: format!("cache for {}", self.remote),
        })?;
        if *synced {
            return Ok(());
        }
        self.sync_now()
            .map_err(|e| e.sync_context(format!("couldn't update cache for {}", self.remote)))?;
        *synced = true;
        Ok(())
    }

    fn sync_now(&self) -> Result<()> {
        if self.cached() {
            self.pull("default")
        } else {
            debug!("creating new mercurial mirror for {:?}", self.remote);
            fs::create_dir_all(&self.root)?;
            let dest = self.path.display().to_string();
            self.runner
                .run(&["clone", &self.remote, &dest], None, false)?;
            Ok(())
        }
    }

    /// Whether the mirror exists on disk, regardless of whether it was
    /// synced during this run.
    pub fn cached(&self) -> bool {
        self.path.exists()
    }
}

impl Repository for Cache {
    fn path(&self) -> &Path {
        &self.path
    }

    fn runner(&self) -> &dyn HgRunner {
        self.runner.as_ref()
    }
}

/// Reformat a remote name into something usable as a directory name.
fn sanitized_dirname(remote: &str) -> String {
    remote
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Registry of [`Cache`] instances, one per distinct remote string.
///
/// Owned by the top-level orchestrator and shared by reference into sources
/// and working directories; get-or-create is atomic under the registry lock.
pub struct CacheRegistry {
    root: PathBuf,
    runner: Arc<dyn HgRunner>,
    instances: Mutex<HashMap<String, Arc<Cache>>>,
}

impl CacheRegistry {
    pub fn new(root: PathBuf, runner: Arc<dyn HgRunner>) -> Self {
        Self {
            root,
            runner,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cache for the given remote, constructing and registering
    /// it on first request. Two calls with the same remote string return the
    /// same instance.
    pub fn get(&self, remote: &str) -> Result<Arc<Cache>> {
        let mut instances = self.instances.lock().map_err(|_| Error::LockPoisoned {
            context: "cache registry".to_string(),
        })?;
        let cache = instances
            .entry(remote.to_string())
            .or_insert_with(|| Arc::new(Cache::new(remote, &self.root, Arc::clone(&self.runner))));
        Ok(Arc::clone(cache))
    }

    /// The runner shared by every cache in this registry.
    pub fn runner(&self) -> Arc<dyn HgRunner> {
        Arc::clone(&self.runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::MockHg;
    use tempfile::TempDir;

    fn registry(root: &Path) -> (Arc<MockHg>, CacheRegistry) {
        let hg = Arc::new(MockHg::new());
        let registry = CacheRegistry::new(root.to_path_buf(), hg.clone() as Arc<dyn HgRunner>);
        (hg, registry)
    }

    #[test]
    fn test_sanitized_dirname_replaces_disallowed_characters() {
        assert_eq!(
            sanitized_dirname("proto://host/path name"),
            "proto---host-path-name"
        );
        // Everything in [@A-Za-z0-9._-] survives untouched
        assert_eq!(
            sanitized_dirname("user@host.example-1_x"),
            "user@host.example-1_x"
        );
    }

    #[test]
    fn test_sanitized_dirname_is_deterministic() {
        let a = sanitized_dirname("ssh://hg@bitbucket.org/team/repo");
        let b = sanitized_dirname("ssh://hg@bitbucket.org/team/repo");
        assert_eq!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-')));
    }

    #[test]
    fn test_registry_returns_same_instance_for_same_remote() {
        let tmp = TempDir::new().unwrap();
        let (_hg, registry) = registry(tmp.path());

        let a = registry.get("https://hg.example.org/repo").unwrap();
        let b = registry.get("https://hg.example.org/repo").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registry_distinct_remotes_get_distinct_mirror_paths() {
        let tmp = TempDir::new().unwrap();
        let (_hg, registry) = registry(tmp.path());

        // Differ only by characters the sanitizer rewrites
        let a = registry.get("https://host/repo one").unwrap();
        let b = registry.get("https://host/repo/one").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_sync_clones_when_mirror_absent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let (hg, registry) = registry(&root);

        let cache = registry.get("https://hg.example.org/repo").unwrap();
        assert!(!cache.cached());
        cache.sync().unwrap();

        assert_eq!(hg.count_matching("clone https://hg.example.org/repo"), 1);
        // The cache root directory was created for the clone
        assert!(root.is_dir());
    }

    #[test]
    fn test_sync_pulls_when_mirror_exists() {
        let tmp = TempDir::new().unwrap();
        let (hg, registry) = registry(tmp.path());

        let cache = registry.get("https://hg.example.org/repo").unwrap();
        fs::create_dir_all(cache.path()).unwrap();
        assert!(cache.cached());

        cache.sync().unwrap();
        assert_eq!(hg.count_matching("pull default"), 1);
        assert_eq!(hg.count_matching("clone"), 0);
    }

    #[test]
    fn test_sync_is_idempotent_per_run() {
        let tmp = TempDir::new().unwrap();
        let (hg, registry) = registry(&tmp.path().join("cache"));

        let cache = registry.get("https://hg.example.org/repo").unwrap();
        cache.sync().unwrap();
        cache.sync().unwrap();

        assert_eq!(hg.count_matching("clone"), 1);
        assert_eq!(hg.count_matching("pull"), 0);
    }

    #[test]
    fn test_sync_failure_is_wrapped_with_remote_context() {
        let tmp = TempDir::new().unwrap();
        let hg = Arc::new(MockHg::new());
        let dest = tmp
            .path()
            .join("cache")
            .join("https---hg.example.org-repo");
        hg.respond_err(
            &format!("clone https://hg.example.org/repo {}", dest.display()),
            "abort: connection refused",
        );
        let registry =
            CacheRegistry::new(tmp.path().join("cache"), hg.clone() as Arc<dyn HgRunner>);

        let cache = registry.get("https://hg.example.org/repo").unwrap();
        let err = cache.sync().unwrap_err();
        assert!(format!("{}", err)
            .contains("couldn't update cache for https://hg.example.org/repo"));

        // A failed sync does not mark the cache as synced
        let _ = cache.sync().unwrap_err();
        assert_eq!(hg.count_matching("clone"), 2);
    }
}
