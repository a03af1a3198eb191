//! Matching descriptors against candidate versions.

use std::collections::BTreeSet;
use std::fmt;

use super::{ConcreteVersion, VersionDescriptor};
use crate::{Error, Result};

/// The outcome of matching a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A released version that is present in the index.
    Release(ConcreteVersion),
    /// The nightly build. Acquired only from the nightly archive.
    Nightly,
}

impl Resolved {
    /// The concrete version, if this is a release.
    #[must_use]
    pub fn release(&self) -> Option<&ConcreteVersion> {
        match self {
            Self::Release(v) => Some(v),
            Self::Nightly => None,
        }
    }

    /// Label used for directory names and outputs.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Release(v) => v.as_str(),
            Self::Nightly => "nightly",
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Picks the best candidate for a descriptor.
///
/// Candidates are a set of distinct versions, so ties cannot happen.
pub struct VersionMatcher;

impl VersionMatcher {
    /// Match a descriptor against the candidate set.
    ///
    /// - `Exact(v)` succeeds iff `v` is a candidate.
    /// - `Latest` returns the maximum candidate.
    /// - `Range(r)` returns the maximum candidate inside `r`.
    /// - `Nightly` never consults the candidates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSatisfiable`] with the full candidate list when
    /// nothing matches.
    pub fn match_version(
        candidates: &BTreeSet<ConcreteVersion>,
        descriptor: &VersionDescriptor,
    ) -> Result<Resolved> {
        let found = match descriptor {
            VersionDescriptor::Nightly => return Ok(Resolved::Nightly),
            VersionDescriptor::Exact(v) => candidates.get(v).cloned(),
            VersionDescriptor::Latest => candidates.last().cloned(),
            VersionDescriptor::Range(range) => {
                candidates.iter().rev().find(|v| range.matches(v)).cloned()
            }
        };

        found.map(Resolved::Release).ok_or_else(|| {
            Error::not_satisfiable(
                descriptor.to_string(),
                candidates.iter().map(ToString::to_string).collect(),
            )
        })
    }
}
