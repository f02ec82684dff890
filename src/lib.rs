//! # hg-deploy Library
//!
//! This library keeps a tree of on-disk working directories synchronized
//! with branches, tags and changesets of remote Mercurial repositories, for
//! use as deployable environments. It is designed to be used by the
//! `hg-deploy` command-line tool but can also be embedded in other
//! deployment pipelines.
//!
//! ## Core Concepts
//!
//! - **Revision references (`rev`)**: a tagged union of branch, tag,
//!   changeset and raw-revision specs. The variant decides the refresh
//!   policy: branches always fetch, fixed tags and changesets fetch only
//!   until they resolve, floating tags always fetch.
//! - **Repository gateway (`repo`, `process`)**: everything that talks to
//!   the external `hg` binary. The binary is an opaque oracle: this crate
//!   implements no VCS internals.
//! - **Mirror caches (`cache`)**: one full local mirror per remote, handed
//!   out by a registry with get-or-create semantics, so working directories
//!   never hit the network directly and never race duplicate clones.
//! - **Working directories (`working_dir`)**: the convergence state machine
//!   driving a checkout from absent/mismatched/outdated to in-sync.
//! - **Sources (`source`, `environment`, `purge`)**: map a remote's
//!   branches to managed environment directories, and reconcile the
//!   directory tree to exactly the desired set.
//!
//! ## Execution Flow
//!
//! A deploy run, per source: `preload` syncs the source's mirror cache;
//! `environments` lists branches from the cache and builds one environment
//! per branch; each environment's `sync` drives its working directory,
//! which syncs its own cache, clones or pulls through the mirror, and
//! checks out the resolved revision; `purge` then removes directories no
//! longer backed by any branch.

pub mod cache;
pub mod config;
pub mod environment;
pub mod error;
pub mod process;
pub mod purge;
pub mod repo;
pub mod rev;
pub mod source;
pub mod working_dir;
