//! Acquisition strategies and the chain that orders them.
//!
//! Every strategy implements [`AcquisitionSource`]. A strategy answers
//! `Ok(Some(path))` when it produced an install root, `Ok(None)` when it has
//! nothing for this request, and `Err` only for real failures.

mod chain;
mod source;

pub use chain::AcquisitionChain;
pub use source::{SourceBuildStage, ToolCacheSource};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::cache::ToolCacheKey;
use crate::options::BuildOptions;
use crate::paths::AgdaPaths;
use crate::{Error, Result};

/// Which strategy produced an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Runner tool cache
    #[serde(rename = "tool-cache")]
    Cache,
    /// Curated index of prebuilt binary distributions
    PrebuiltIndex,
    /// Built from the source archive
    Source,
    /// The nightly release archive
    Nightly,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "tool-cache"),
            Self::PrebuiltIndex => write!(f, "prebuilt-index"),
            Self::Source => write!(f, "source"),
            Self::Nightly => write!(f, "nightly"),
        }
    }
}

/// Why one strategy did not produce an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMiss {
    /// The strategy that missed
    pub source: SourceKind,
    /// `not found`, or the error it reported
    pub reason: String,
}

impl StageMiss {
    /// Record a miss.
    #[must_use]
    pub fn new(source: SourceKind, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }

    /// Join misses into one line for error messages.
    #[must_use]
    pub fn summarize(misses: &[Self]) -> String {
        misses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for StageMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Outcome of running the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionResult {
    /// An install root and the strategy that produced it.
    Found {
        /// Install root
        path: PathBuf,
        /// Strategy that produced it
        source: SourceKind,
    },
    /// No strategy produced anything.
    NotFound {
        /// What each strategy reported, in chain order
        misses: Vec<StageMiss>,
    },
}

impl AcquisitionResult {
    /// Whether a strategy succeeded.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Everything a strategy may read while acquiring.
#[derive(Debug, Clone)]
pub struct AcquireContext {
    options: BuildOptions,
    paths: AgdaPaths,
}

impl AcquireContext {
    /// Create a context from resolved options.
    #[must_use]
    pub fn new(options: BuildOptions, paths: AgdaPaths) -> Self {
        Self { options, paths }
    }

    /// The resolved options.
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The directory layout.
    #[must_use]
    pub fn paths(&self) -> &AgdaPaths {
        &self.paths
    }

    /// Directory label of the resolved version (`2.6.2.2` or `nightly`).
    ///
    /// # Errors
    ///
    /// Returns an error if the options were never resolved.
    pub fn version_label(&self) -> Result<&str> {
        self.options
            .resolved()
            .map(|r| r.label())
            .ok_or_else(|| Error::configuration_conflict("version must be resolved before acquisition"))
    }

    /// Tool cache key for the resolved release.
    ///
    /// # Errors
    ///
    /// Returns an error if the options do not hold a resolved release.
    pub fn cache_key(&self) -> Result<ToolCacheKey> {
        let version = self.options.resolved_version()?;
        Ok(ToolCacheKey::new(
            self.options.package(),
            version.as_str(),
            *self.options.platform(),
        ))
    }
}

/// One way of obtaining an installation.
#[async_trait]
pub trait AcquisitionSource: Send + Sync {
    /// Which kind of strategy this is.
    fn kind(&self) -> SourceKind;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Try to produce an install root for the request in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error on failures other than "nothing available".
    async fn try_acquire(&self, ctx: &AcquireContext) -> Result<Option<PathBuf>>;
}
