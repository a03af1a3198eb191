//! Binary distribution index.
//!
//! A JSON document mapping versions to per-platform archives:
//!
//! ```json
//! {
//!   "2.6.2.2": {
//!     "linux-x86_64": { "url": "https://.../agda-2.6.2.2-linux.tar.xz", "sha256": "..." },
//!     "darwin":       { "url": "https://.../agda-2.6.2.2-macos.zip", "dir": "agda-2.6.2.2" }
//!   }
//! }
//! ```
//!
//! Platform keys are either `<os>-<arch>` or just `<os>`; the more specific
//! key wins.

use serde::Deserialize;
use setup_agda_core::{ConcreteVersion, Error, Platform, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One downloadable distribution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BdistEntry {
    /// Archive URL
    pub url: String,
    /// Directory inside the archive holding `bin/` and `data/`
    #[serde(default)]
    pub dir: Option<String>,
    /// Expected SHA256 of the archive
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Parsed index document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BdistIndex {
    entries: BTreeMap<String, BTreeMap<String, BdistEntry>>,
}

impl BdistIndex {
    /// Parse an index document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the document is malformed.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::metadata(format!("Invalid binary distribution index: {e}")))
    }

    /// Find the entry for a version and platform.
    #[must_use]
    pub fn lookup(&self, version: &ConcreteVersion, platform: &Platform) -> Option<&BdistEntry> {
        let platforms = self.entries.get(version.as_str())?;
        platforms
            .get(&platform.to_string())
            .or_else(|| platforms.get(&platform.os.to_string()))
    }
}

/// Where to load the index from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    /// Local file
    File(PathBuf),
    /// HTTP(S) URL
    Url(String),
}

impl IndexLocation {
    /// `http(s)://` means a URL, anything else a file path.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }
}

impl std::fmt::Display for IndexLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}
