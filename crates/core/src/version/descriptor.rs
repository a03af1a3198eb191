//! User-facing version descriptors.

use std::fmt;
use std::str::FromStr;

use super::{ConcreteVersion, VersionRange};
use crate::{Error, Result};

/// What the user asked for.
///
/// Parsed once from raw input and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDescriptor {
    /// A specific version, which must exist in the index.
    Exact(ConcreteVersion),
    /// The highest version in the index.
    Latest,
    /// The rolling nightly build, which is never in the index.
    Nightly,
    /// The highest version in the index that satisfies the range.
    Range(VersionRange),
}

impl VersionDescriptor {
    /// Parse a descriptor.
    ///
    /// `latest` and `nightly` are matched case-insensitively. Anything that
    /// contains range syntax (operators, `*`, `||`, `,` or whitespace) is a
    /// range; everything else must be a plain dotted version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if the text is neither a tag, a range,
    /// nor a valid version.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "latest" => return Ok(Self::Latest),
            "nightly" => return Ok(Self::Nightly),
            "" => return Err(Error::invalid_version(input, "empty version descriptor")),
            _ => {}
        }

        let is_range = trimmed
            .chars()
            .any(|c| matches!(c, '<' | '>' | '=' | '^' | '*' | '|' | ',' | '&') || c.is_whitespace());
        if is_range {
            VersionRange::parse(trimmed).map(Self::Range)
        } else {
            ConcreteVersion::parse(trimmed).map(Self::Exact)
        }
    }

    /// Whether this descriptor is the nightly tag.
    #[must_use]
    pub fn is_nightly(&self) -> bool {
        matches!(self, Self::Nightly)
    }
}

impl fmt::Display for VersionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Latest => f.write_str("latest"),
            Self::Nightly => f.write_str("nightly"),
            Self::Range(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for VersionDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Default for VersionDescriptor {
    fn default() -> Self {
        Self::Latest
    }
}
