//! Concrete, comparable version numbers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A normalized dotted numeric version such as `2.6.2.2` or `8.10.7`.
///
/// Ordering compares components numerically, padding the shorter side with
/// zeros, so `8.10.7 > 8.6.5` and `2.6.2 < 2.6.2.1`. When two versions are
/// equal after padding (`1.0` and `1.0.0`) the one with fewer components sorts
/// first, which keeps `Ord` consistent with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConcreteVersion {
    text: String,
    parts: Vec<u64>,
}

impl ConcreteVersion {
    /// Parse and normalize a version string.
    ///
    /// Leading/trailing whitespace and a single leading `v` are stripped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if any component is not a number.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(Error::invalid_version(input, "empty version"));
        }

        let parts = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::invalid_version(
                        input,
                        format!("component '{part}' is not a number"),
                    ));
                }
                part.parse::<u64>()
                    .map_err(|e| Error::invalid_version(input, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            text: trimmed.to_string(),
            parts,
        })
    }

    /// The normalized version text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Numeric components.
    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Whether this version is at least `other`.
    #[must_use]
    pub fn at_least(&self, other: &Self) -> bool {
        compare_padded(&self.parts, &other.parts) != Ordering::Less
    }

    /// Compare against raw components, padding the shorter side with zeros.
    #[must_use]
    pub fn cmp_parts(&self, other: &[u64]) -> Ordering {
        compare_padded(&self.parts, other)
    }
}

fn compare_padded(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for ConcreteVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_padded(&self.parts, &other.parts)
            .then_with(|| self.parts.len().cmp(&other.parts.len()))
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for ConcreteVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ConcreteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for ConcreteVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConcreteVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ConcreteVersion> for String {
    fn from(value: ConcreteVersion) -> Self {
        value.text
    }
}
