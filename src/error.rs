//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for
//! `hg-deploy`. It uses the `thiserror` library to create a single `Error`
//! enum covering all anticipated failure modes, providing clear and
//! descriptive error messages.
//!
//! Two kinds deserve special mention:
//!
//! - **`UnresolvableRev`**: a revision spec could not be resolved to a
//!   changeset id, neither locally nor through a named remote. Operations
//!   that require a concrete id (such as checkout) surface this to the
//!   caller; probing helpers such as [`crate::rev::Rev::resolvable`]
//!   downgrade it to a plain `false`.
//!
//! - **`Sync`**: wraps any lower-level failure that occurred while updating
//!   a mirror cache or a working directory, carrying the human-readable
//!   context ("couldn't update cache for ...", "cannot check out revision
//!   ...") alongside the underlying error.

use thiserror::Error;

/// Main error type for hg-deploy operations
#[derive(Error, Debug)]
pub enum Error {
    /// A revision spec could not be resolved to a changeset id.
    ///
    /// Carries the spec as given by the caller and the repository path that
    /// was consulted, for diagnostics.
    #[error("could not resolve mercurial revision '{rev}' at {path}")]
    UnresolvableRev { rev: String, path: String },

    /// An external `hg` invocation failed.
    ///
    /// `status` describes how it failed (nonzero exit code, timeout, or a
    /// spawn failure) and `stderr` holds whatever the command printed.
    #[error("command '{command}' failed with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// A cache or working directory synchronization failed.
    ///
    /// Wraps the underlying error with a human-readable context naming the
    /// remote or revision involved.
    #[error("{context}")]
    Sync {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid or conflicting configuration, detected at construction time.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A failure to read a path matched by a glob pattern.
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// An hgrc read/write error, wrapped from `ini::Error`.
    #[error("hgrc error: {0}")]
    Ini(#[from] ini::Error),
}

impl Error {
    /// Wrap an error as a [`Error::Sync`] with the given context.
    pub fn sync_context(self, context: impl Into<String>) -> Error {
        Error::Sync {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unresolvable_rev() {
        let error = Error::UnresolvableRev {
            rev: "feature/x".to_string(),
            path: "/srv/environments/production".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("could not resolve mercurial revision"));
        assert!(display.contains("'feature/x'"));
        assert!(display.contains("/srv/environments/production"));
    }

    #[test]
    fn test_error_display_command() {
        let error = Error::Command {
            command: "hg pull cache".to_string(),
            status: "exit code 255".to_string(),
            stderr: "abort: repository cache not found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("hg pull cache"));
        assert!(display.contains("exit code 255"));
        assert!(display.contains("abort: repository cache not found"));
    }

    #[test]
    fn test_error_sync_wraps_source() {
        let inner = Error::Command {
            command: "hg clone https://hg.example.org/repo /cache/repo".to_string(),
            status: "exit code 1".to_string(),
            stderr: "connection refused".to_string(),
        };
        let error = inner.sync_context("couldn't update cache for https://hg.example.org/repo");

        let display = format!("{}", error);
        assert!(display.contains("couldn't update cache for"));

        // The underlying command failure stays reachable through source()
        let source = std::error::Error::source(&error).expect("sync error has a source");
        assert!(format!("{}", source).contains("connection refused"));
    }

    #[test]
    fn test_error_display_config() {
        let error = Error::Config {
            message: "conflicting revision selectors: branch, tag".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("configuration error"));
        assert!(display.contains("conflicting revision selectors"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("file not found"));
    }
}
