//! Version ranges.
//!
//! Grammar, loosely following cabal and npm:
//!
//! ```text
//! range      := conjunction ( "||" conjunction )*
//! conjunction:= comparator ( ( " " | "," | "&&" ) comparator )*
//! comparator := "*" | op? version | version ".*"
//! op         := ">=" | ">" | "<=" | "<" | "==" | "=" | "^>="
//! ```
//!
//! A bare version without an operator means `==`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::ConcreteVersion;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    /// `^>= x.y.z`: at least `x.y.z`, below `x.(y+1)`.
    MajorBound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Comparator {
    Any,
    /// `x.y.*`
    Prefix(Vec<u64>),
    Cmp(Op, Vec<u64>),
}

impl Comparator {
    fn matches(&self, version: &ConcreteVersion) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => {
                prefix.len() <= version.parts().len() && version.parts().starts_with(prefix)
            }
            Self::Cmp(op, bound) => {
                let ord = version.cmp_parts(bound);
                match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Ge => ord != Ordering::Less,
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    Op::MajorBound => {
                        ord != Ordering::Less
                            && major_upper_bound(bound)
                                .is_none_or(|upper| version.cmp_parts(&upper) == Ordering::Less)
                    }
                }
            }
        }
    }
}

/// `^>= a.b.c` allows everything below `a.(b+1)`. `None` when that bound
/// is past the largest representable component.
fn major_upper_bound(bound: &[u64]) -> Option<Vec<u64>> {
    match bound {
        [] => Some(vec![]),
        [a] => Some(vec![a.checked_add(1)?]),
        [a, b, ..] => Some(vec![*a, b.checked_add(1)?]),
    }
}

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    text: String,
    alternatives: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// The range that accepts every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            text: "*".to_string(),
            alternatives: vec![vec![Comparator::Any]],
        }
    }

    /// Parse a range expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] on empty input, unknown operators or
    /// malformed version numbers.
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        if text.is_empty() {
            return Err(Error::invalid_version(input, "empty range"));
        }

        let mut alternatives = Vec::new();
        for alternative in text.split("||") {
            let normalized = alternative.replace("&&", " ").replace(',', " ");
            let tokens = join_detached_operators(&normalized);
            if tokens.is_empty() {
                return Err(Error::invalid_version(input, "empty alternative in range"));
            }
            let comparators = tokens
                .iter()
                .map(|token| parse_comparator(input, token))
                .collect::<Result<Vec<_>>>()?;
            alternatives.push(comparators);
        }

        Ok(Self {
            text: text.to_string(),
            alternatives,
        })
    }

    /// Whether the version falls inside the range.
    #[must_use]
    pub fn matches(&self, version: &ConcreteVersion) -> bool {
        self.alternatives
            .iter()
            .any(|conj| conj.iter().all(|c| c.matches(version)))
    }

    /// Whether this is the catch-all range.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.alternatives
            .iter()
            .any(|conj| conj.iter().all(|c| *c == Comparator::Any))
    }

    /// The range as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Split on whitespace, re-attaching operators written with a trailing space
/// (`>= 8.6` becomes `>=8.6`).
fn join_detached_operators(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;
    for word in s.split_whitespace() {
        if word.chars().all(|c| matches!(c, '<' | '>' | '=' | '^')) {
            pending = Some(pending.unwrap_or_default() + word);
            continue;
        }
        match pending.take() {
            Some(op) => tokens.push(op + word),
            None => tokens.push(word.to_string()),
        }
    }
    if let Some(op) = pending {
        tokens.push(op);
    }
    tokens
}

fn parse_comparator(input: &str, token: &str) -> Result<Comparator> {
    if token == "*" {
        return Ok(Comparator::Any);
    }

    let (op, rest) = if let Some(rest) = token.strip_prefix("^>=") {
        (Op::MajorBound, rest)
    } else if let Some(rest) = token.strip_prefix(">=") {
        (Op::Ge, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Op::Le, rest)
    } else if let Some(rest) = token.strip_prefix("==") {
        (Op::Eq, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Op::Lt, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (Op::Eq, rest)
    } else {
        (Op::Eq, token)
    };

    if let Some(prefix) = rest.strip_suffix(".*") {
        if op != Op::Eq {
            return Err(Error::invalid_version(
                input,
                format!("wildcard '{token}' cannot be combined with an ordering operator"),
            ));
        }
        let parsed = ConcreteVersion::parse(prefix)?;
        return Ok(Comparator::Prefix(parsed.parts().to_vec()));
    }

    let parsed = ConcreteVersion::parse(rest).map_err(|_| {
        Error::invalid_version(input, format!("cannot parse comparator '{token}'"))
    })?;
    Ok(Comparator::Cmp(op, parsed.parts().to_vec()))
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}
