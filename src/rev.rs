//! # Revision References
//!
//! A [`Rev`] is a caller-supplied identifier denoting a point in history: a
//! branch name, a tag name, a changeset id, or a raw revision expression.
//! The variant decides the refresh policy:
//!
//! - branches are mutable pointers and must always be checked against
//!   upstream;
//! - a fixed tag needs fetching only until it resolves once; a floating tag
//!   (`:latest`, which maps to the `max(tagged())` revset, or `tip`) denotes
//!   a moving target and always does;
//! - changesets and raw revisions are content ids: once resolvable they
//!   never change.
//!
//! A `Rev` holds no reference to a repository. Every resolving method takes
//! the repository explicitly; a [`crate::working_dir::WorkingDir`] owns its
//! `Rev` and always passes itself, so resolution consults the working
//! directory's own view of history.

use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::repo::Repository;

/// Revset selecting the most recently tagged changeset. The `:latest` tag
/// value in a revision selector maps to this.
pub const FLOATING_TAG: &str = "max(tagged())";

/// The moving head of the repository, also treated as floating.
const TIP: &str = "tip";

/// A revision reference: branch, tag, changeset id, or raw revset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rev {
    Branch(String),
    Tag(String),
    Changeset(String),
    Raw(String),
}

impl Rev {
    pub fn branch(name: impl Into<String>) -> Self {
        Rev::Branch(name.into())
    }

    /// Build a tag reference, mapping the `:latest` marker to the floating
    /// `max(tagged())` revset.
    pub fn tag(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == ":latest" {
            Rev::Tag(FLOATING_TAG.to_string())
        } else {
            Rev::Tag(name)
        }
    }

    pub fn changeset(id: impl Into<String>) -> Self {
        Rev::Changeset(id.into())
    }

    pub fn raw(spec: impl Into<String>) -> Self {
        Rev::Raw(spec.into())
    }

    /// The revision spec as given by the caller.
    pub fn spec(&self) -> &str {
        match self {
            Rev::Branch(s) | Rev::Tag(s) | Rev::Changeset(s) | Rev::Raw(s) => s,
        }
    }

    /// Should new changesets be fetched before checking this reference out?
    pub fn needs_fetch(&self, repo: &dyn Repository) -> bool {
        match self {
            Rev::Branch(_) => true,
            Rev::Tag(name) => {
                if name == FLOATING_TAG || name == TIP {
                    true
                } else {
                    !self.resolvable(repo)
                }
            }
            Rev::Changeset(_) | Rev::Raw(_) => !self.resolvable(repo),
        }
    }

    /// Resolve this reference to a canonical changeset id.
    pub fn resolve(&self, repo: &dyn Repository) -> Result<String> {
        if self.spec().is_empty() {
            return Err(Error::UnresolvableRev {
                rev: String::new(),
                path: repo.path().display().to_string(),
            });
        }
        repo.resolve_rev(self.spec())
    }

    /// Whether this reference resolves in the given repository. Any
    /// resolution failure is reported as `false`, never propagated.
    pub fn resolvable(&self, repo: &dyn Repository) -> bool {
        matches!(self.resolve(repo), Ok(_))
    }

    /// Whether two references resolve to the same changeset id. A resolution
    /// failure on either side makes the comparison `false`.
    pub fn resolved_eq(&self, other: &Rev, repo: &dyn Repository) -> bool {
        match (self.resolve(repo), other.resolve(repo)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec())
    }
}

/// Explicit revision selector, as written in a module or environment
/// declaration. At most one field may be set; an empty selector falls back
/// to Mercurial's `default` branch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevSelector {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub changeset: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
}

impl RevSelector {
    /// Convert the selector into a [`Rev`], failing fast on conflicting
    /// options.
    pub fn into_rev(self) -> Result<Rev> {
        let mut picked: Vec<&str> = Vec::new();
        if self.branch.is_some() {
            picked.push("branch");
        }
        if self.tag.is_some() {
            picked.push("tag");
        }
        if self.changeset.is_some() {
            picked.push("changeset");
        }
        if self.rev.is_some() {
            picked.push("rev");
        }
        if picked.len() > 1 {
            return Err(Error::Config {
                message: format!("conflicting revision selectors: {}", picked.join(", ")),
            });
        }

        if let Some(branch) = self.branch {
            Ok(Rev::branch(branch))
        } else if let Some(tag) = self.tag {
            Ok(Rev::tag(tag))
        } else if let Some(changeset) = self.changeset {
            Ok(Rev::changeset(changeset))
        } else if let Some(rev) = self.rev {
            Ok(Rev::raw(rev))
        } else {
            Ok(Rev::branch("default"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::MockHg;
    use crate::repo::tests::TestRepo;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    fn resolvable_repo(spec: &str) -> TestRepo {
        let hg = MockHg::failing_unmatched();
        hg.respond(&format!("id -r {} -i --debug", spec), &format!("{}\n", ID));
        TestRepo::new(hg)
    }

    fn unresolvable_repo() -> TestRepo {
        TestRepo::new(MockHg::failing_unmatched())
    }

    #[test]
    fn test_branch_always_needs_fetch() {
        let repo = resolvable_repo("default");
        assert!(Rev::branch("default").needs_fetch(&repo));

        // Even when nothing resolves, a branch is still a moving target.
        let repo = unresolvable_repo();
        assert!(Rev::branch("default").needs_fetch(&repo));
    }

    #[test]
    fn test_floating_tag_always_needs_fetch() {
        let repo = resolvable_repo(FLOATING_TAG);
        assert!(Rev::tag(":latest").needs_fetch(&repo));
        let repo = resolvable_repo("tip");
        assert!(Rev::tag("tip").needs_fetch(&repo));
    }

    #[test]
    fn test_fixed_tag_needs_fetch_only_until_resolvable() {
        let repo = resolvable_repo("v1.0.0");
        assert!(!Rev::tag("v1.0.0").needs_fetch(&repo));

        let repo = unresolvable_repo();
        assert!(Rev::tag("v1.0.0").needs_fetch(&repo));
    }

    #[test]
    fn test_changeset_and_raw_need_fetch_only_until_resolvable() {
        let repo = resolvable_repo(ID);
        assert!(!Rev::changeset(ID).needs_fetch(&repo));
        assert!(!Rev::raw(ID).needs_fetch(&repo));

        let repo = unresolvable_repo();
        assert!(Rev::changeset(ID).needs_fetch(&repo));
        assert!(Rev::raw(ID).needs_fetch(&repo));
    }

    #[test]
    fn test_latest_tag_maps_to_floating_revset() {
        assert_eq!(Rev::tag(":latest").spec(), FLOATING_TAG);
        assert_eq!(Rev::tag("v2.0").spec(), "v2.0");
    }

    #[test]
    fn test_resolvable_downgrades_failures() {
        let repo = unresolvable_repo();
        assert!(!Rev::tag("v1.0.0").resolvable(&repo));

        let repo = resolvable_repo("v1.0.0");
        assert!(Rev::tag("v1.0.0").resolvable(&repo));
    }

    #[test]
    fn test_resolved_eq_compares_canonical_ids() {
        let hg = MockHg::failing_unmatched();
        hg.respond("id -r default -i --debug", &format!("{}\n", ID));
        hg.respond("id -r v1.0.0 -i --debug", &format!("{}\n", ID));
        let repo = TestRepo::new(hg);

        assert!(Rev::branch("default").resolved_eq(&Rev::tag("v1.0.0"), &repo));
    }

    #[test]
    fn test_resolved_eq_is_false_on_resolution_failure() {
        let hg = MockHg::failing_unmatched();
        hg.respond("id -r default -i --debug", &format!("{}\n", ID));
        let repo = TestRepo::new(hg);

        assert!(!Rev::branch("default").resolved_eq(&Rev::tag("ghost"), &repo));
        assert!(!Rev::tag("ghost").resolved_eq(&Rev::branch("default"), &repo));
    }

    #[test]
    fn test_empty_spec_never_resolves() {
        let repo = resolvable_repo("default");
        assert!(Rev::raw("").resolve(&repo).is_err());
    }

    #[test]
    fn test_selector_defaults_to_default_branch() {
        let rev = RevSelector::default().into_rev().unwrap();
        assert_eq!(rev, Rev::branch("default"));
    }

    #[test]
    fn test_selector_single_field() {
        let selector = RevSelector {
            tag: Some(":latest".to_string()),
            ..Default::default()
        };
        assert_eq!(selector.into_rev().unwrap(), Rev::Tag(FLOATING_TAG.into()));

        let selector = RevSelector {
            changeset: Some(ID.to_string()),
            ..Default::default()
        };
        assert_eq!(selector.into_rev().unwrap(), Rev::changeset(ID));
    }

    #[test]
    fn test_selector_rejects_conflicting_fields() {
        let selector = RevSelector {
            branch: Some("default".to_string()),
            tag: Some("v1.0".to_string()),
            ..Default::default()
        };
        let err = selector.into_rev().unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("conflicting revision selectors"));
        assert!(display.contains("branch, tag"));
    }

    #[test]
    fn test_selector_deserializes_from_yaml() {
        let selector: RevSelector = serde_yaml::from_str("tag: v1.2.3").unwrap();
        assert_eq!(selector.into_rev().unwrap(), Rev::tag("v1.2.3"));
    }
}
