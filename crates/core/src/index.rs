//! Package index abstraction.
//!
//! The index is a read-only external service. Implementations live in
//! provider crates (Hackage over HTTP); tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::version::ConcreteVersion;

/// Status of a version in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    /// Installable
    Normal,
    /// Marked deprecated by the maintainers
    Deprecated,
}

/// Snapshot of everything the index knows about one package.
///
/// Fetched at most once per run and then shared through [`BuildOptions`].
///
/// [`BuildOptions`]: crate::BuildOptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Every published version with its status.
    pub versions: BTreeMap<ConcreteVersion, VersionStatus>,
}

impl PackageInfo {
    /// Build from a version map.
    #[must_use]
    pub fn new(versions: BTreeMap<ConcreteVersion, VersionStatus>) -> Self {
        Self { versions }
    }

    /// Versions eligible for resolution (deprecated ones are excluded).
    #[must_use]
    pub fn candidates(&self) -> BTreeSet<ConcreteVersion> {
        self.versions
            .iter()
            .filter(|(_, status)| **status == VersionStatus::Normal)
            .map(|(version, _)| version.clone())
            .collect()
    }
}

/// Where a source archive can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    /// Download URL
    pub url: String,
    /// Top-level directory inside the archive (e.g. `Agda-2.6.2`)
    pub root: String,
}

/// Read-only view of a package index.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Index name for logs (e.g. "hackage").
    fn name(&self) -> &'static str;

    /// List every known version of a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be reached or its response
    /// cannot be parsed.
    async fn package_info(&self, package: &str) -> Result<PackageInfo>;

    /// Location of the source archive for one version.
    fn source_location(&self, package: &str, version: &ConcreteVersion) -> ArchiveLocation;

    /// Download and unpack a source archive below `dest`.
    ///
    /// Returns the unpacked source root.
    ///
    /// # Errors
    ///
    /// Returns an error if the download or extraction fails.
    async fn fetch_source(&self, location: &ArchiveLocation, dest: &Path) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ConcreteVersion {
        ConcreteVersion::parse(s).unwrap()
    }

    #[test]
    fn test_candidates_exclude_deprecated() {
        let info = PackageInfo::new(BTreeMap::from([
            (v("2.6.1"), VersionStatus::Deprecated),
            (v("2.6.2"), VersionStatus::Normal),
            (v("2.6.3"), VersionStatus::Normal),
        ]));
        let candidates: Vec<_> = info.candidates().into_iter().map(String::from).collect();
        assert_eq!(candidates, vec!["2.6.2", "2.6.3"]);
        assert_eq!(info.versions[&v("2.6.1")], VersionStatus::Deprecated);
    }

    #[test]
    fn test_package_info_deserializes() {
        let json = r#"{"versions":{"2.6.2":"normal","2.5.1":"deprecated"}}"#;
        let info: PackageInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.versions.len(), 2);
        assert_eq!(info.versions[&v("2.5.1")], VersionStatus::Deprecated);
    }
}
