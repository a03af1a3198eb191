//! Compatible GHC versions declared in a package's `.cabal` file.
//!
//! Agda lists the compilers it is tested with as `tested-with: GHC == 8.6.5`
//! clauses. Those are the only compilers the source build will consider.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::version::ConcreteVersion;
use crate::{Error, Result};

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Capture anything version-shaped so malformed tokens can be reported.
        #[allow(clippy::expect_used)]
        Regex::new(r"GHC\s*==\s*([0-9][0-9A-Za-z.\-]*)").expect("static regex is valid")
    })
}

/// Extracts the compatibility set from build metadata.
pub struct CompatibilityExtractor;

impl CompatibilityExtractor {
    /// Scan metadata text for `GHC == x.y.z` declarations.
    ///
    /// Tokens that are not well-formed `major.minor.patch` versions are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if no valid version was declared.
    pub fn extract(metadata: &str) -> Result<BTreeSet<ConcreteVersion>> {
        let mut versions = BTreeSet::new();
        for captures in declaration_pattern().captures_iter(metadata) {
            let token = &captures[1];
            match validate(token) {
                Some(version) => {
                    debug!(%version, "Found compatible GHC version");
                    versions.insert(version);
                }
                None => warn!(%token, "Could not parse GHC version in package metadata"),
            }
        }

        if versions.is_empty() {
            return Err(Error::metadata("Could not find any compatible GHC versions"));
        }
        Ok(versions)
    }

    /// Locate the single `.cabal` file in a source checkout and extract from it.
    ///
    /// # Errors
    ///
    /// Returns an error if there is not exactly one `.cabal` file, if it cannot
    /// be read, or if it declares no valid versions.
    pub fn extract_from_source_dir(source_dir: &Path) -> Result<BTreeSet<ConcreteVersion>> {
        let cabal_file = find_cabal_file(source_dir)?;
        let contents = std::fs::read_to_string(&cabal_file)
            .map_err(|e| Error::io(e, Some(cabal_file.clone()), "read cabal file"))?;
        Self::extract(&contents).map_err(|e| match e {
            Error::Metadata { message } => {
                Error::metadata(format!("{message} in {}", cabal_file.display()))
            }
            other => other,
        })
    }
}

/// Strict `major.minor.patch` check, as cabal's tested-with clauses use.
fn validate(token: &str) -> Option<ConcreteVersion> {
    semver::Version::parse(token)
        .ok()
        .filter(|v| v.pre.is_empty() && v.build.is_empty())
        .and_then(|_| ConcreteVersion::parse(token).ok())
}

/// Find the one `*.cabal` file at the root of a source tree.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if zero or several files are found.
pub fn find_cabal_file(source_dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(source_dir)
        .map_err(|e| Error::io(e, Some(source_dir.to_path_buf()), "list source directory"))?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "cabal"))
        .collect();
    found.sort();

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(Error::metadata(format!(
            "No .cabal file found in {}",
            source_dir.display()
        ))),
        _ => {
            let listing: Vec<String> = found
                .iter()
                .map(|p| format!("- {}", p.display()))
                .collect();
            Err(Error::metadata(format!(
                "Found multiple .cabal files:\n{}",
                listing.join("\n")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn labels(set: &BTreeSet<ConcreteVersion>) -> Vec<&str> {
        set.iter().map(ConcreteVersion::as_str).collect()
    }

    #[test]
    fn test_extract_tested_with() {
        let text = "name: Agda\ntested-with: GHC == 8.6.5\n           , GHC == 8.10.7\n";
        let set = CompatibilityExtractor::extract(text).unwrap();
        assert_eq!(labels(&set), vec!["8.6.5", "8.10.7"]);
    }

    #[test]
    fn test_extract_multiple_on_one_line() {
        let text = "tested-with: GHC == 9.2.8, GHC == 9.4.7 GHC==9.6.3";
        let set = CompatibilityExtractor::extract(text).unwrap();
        assert_eq!(labels(&set), vec!["9.2.8", "9.4.7", "9.6.3"]);
    }

    #[test]
    fn test_malformed_token_is_skipped() {
        let text = "tested-with: GHC == 8.6\n             GHC == 8.10.7\n";
        let set = CompatibilityExtractor::extract(text).unwrap();
        assert_eq!(labels(&set), vec!["8.10.7"]);
    }

    #[test]
    fn test_leading_zero_is_malformed() {
        let text = "GHC == 08.6.5 GHC == 9.0.2";
        let set = CompatibilityExtractor::extract(text).unwrap();
        assert_eq!(labels(&set), vec!["9.0.2"]);
    }

    #[test]
    fn test_nothing_declared_is_fatal() {
        let err = CompatibilityExtractor::extract("name: Agda\n").unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));

        let err = CompatibilityExtractor::extract("GHC == 8.6").unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
    }

    #[test]
    fn test_extract_from_source_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Agda.cabal"), "tested-with: GHC == 9.4.7\n").unwrap();
        std::fs::write(temp.path().join("README.md"), "GHC == 1.2.3").unwrap();

        let set = CompatibilityExtractor::extract_from_source_dir(temp.path()).unwrap();
        assert_eq!(labels(&set), vec!["9.4.7"]);
    }

    #[test]
    fn test_find_cabal_file_requires_exactly_one() {
        let temp = TempDir::new().unwrap();
        assert!(find_cabal_file(temp.path()).is_err());

        std::fs::write(temp.path().join("a.cabal"), "").unwrap();
        std::fs::write(temp.path().join("b.cabal"), "").unwrap();
        let err = find_cabal_file(temp.path()).unwrap_err();
        assert!(err.to_string().contains("multiple"));
    }
}
