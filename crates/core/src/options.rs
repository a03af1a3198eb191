//! Build options threaded through the pipeline.
//!
//! [`BuildOptions`] is an immutable record. Every stage that learns something
//! returns a new record via a `with_*` method; nothing mutates a shared copy.
//! The search-path lists can only grow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::index::PackageInfo;
use crate::platform::{Os, Platform};
use crate::version::{ConcreteVersion, Resolved, VersionDescriptor, VersionRange};
use crate::{Error, Result};

/// Agda version from which `--flags=+optimise-heavily` exists.
const OPTIMISE_HEAVILY_SINCE: &[u64] = &[2, 6, 2];
/// Agda version from which `--flags=+enable-cluster-counting` builds against text-icu.
const CLUSTER_COUNTING_SINCE: &[u64] = &[2, 5, 3];
/// GHC version from which `--enable-split-sections` works.
const SPLIT_SECTIONS_SINCE: &[u64] = &[8, 0];
/// GHC version from which static executables link reliably.
const EXECUTABLE_STATIC_SINCE: &[u64] = &[8, 8];

fn at_least(version: &ConcreteVersion, threshold: &[u64]) -> bool {
    version.cmp_parts(threshold) != std::cmp::Ordering::Less
}

/// Build flags derived from version comparisons.
///
/// Each flag is gated by a `>=` threshold, so once a version enables a flag
/// every later version does too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// `--flags=+enable-cluster-counting`
    pub cluster_counting: bool,
    /// `--flags=+optimise-heavily`
    pub optimise_heavily: bool,
    /// `--enable-split-sections`
    pub split_sections: bool,
    /// `--enable-executable-static`
    pub executable_static: bool,
}

impl FeatureFlags {
    /// Compute the flag set.
    ///
    /// Needs the selected GHC version, so it runs after toolchain selection.
    #[must_use]
    pub fn compute(
        agda: &ConcreteVersion,
        ghc: &ConcreteVersion,
        platform: &Platform,
        has_icu: bool,
    ) -> Self {
        Self {
            cluster_counting: has_icu && at_least(agda, CLUSTER_COUNTING_SINCE),
            optimise_heavily: at_least(agda, OPTIMISE_HEAVILY_SINCE),
            split_sections: platform.os != Os::Darwin && at_least(ghc, SPLIT_SECTIONS_SINCE),
            executable_static: platform.os == Os::Linux && at_least(ghc, EXECUTABLE_STATIC_SINCE),
        }
    }

    /// Cabal configure flags for this set.
    #[must_use]
    pub fn configure_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "--disable-executable-profiling".to_string(),
            "--disable-library-profiling".to_string(),
        ];
        if self.cluster_counting {
            flags.push("--flags=+enable-cluster-counting".to_string());
        }
        if self.optimise_heavily {
            flags.push("--flags=+optimise-heavily".to_string());
        }
        if self.executable_static {
            flags.push("--enable-executable-static".to_string());
        }
        if self.split_sections {
            flags.push("--enable-split-sections".to_string());
        }
        flags
    }
}

/// Configuration record for one run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    package: String,
    requested: VersionDescriptor,
    resolved: Option<Resolved>,
    ghc_range: VersionRange,
    ghc_version: Option<ConcreteVersion>,
    icu_version: Option<String>,
    features: FeatureFlags,
    force_build: bool,
    force_no_build: bool,
    platform: Platform,
    extra_lib_dirs: Vec<PathBuf>,
    extra_include_dirs: Vec<PathBuf>,
    package_info: Option<Arc<PackageInfo>>,
}

impl BuildOptions {
    /// Create options for a package request on the current platform.
    #[must_use]
    pub fn new(package: impl Into<String>, requested: VersionDescriptor) -> Self {
        Self {
            package: package.into(),
            requested,
            resolved: None,
            ghc_range: VersionRange::any(),
            ghc_version: None,
            icu_version: None,
            features: FeatureFlags::default(),
            force_build: false,
            force_no_build: false,
            platform: Platform::current(),
            extra_lib_dirs: Vec::new(),
            extra_include_dirs: Vec::new(),
            package_info: None,
        }
    }

    /// Set the caller's GHC range.
    #[must_use]
    pub fn with_ghc_range(mut self, range: VersionRange) -> Self {
        self.ghc_range = range;
        self
    }

    /// Skip the cache and prebuilt index.
    #[must_use]
    pub fn with_force_build(mut self, force: bool) -> Self {
        self.force_build = force;
        self
    }

    /// Never build from source.
    #[must_use]
    pub fn with_force_no_build(mut self, force: bool) -> Self {
        self.force_no_build = force;
        self
    }

    /// Override the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Record the resolved version.
    #[must_use]
    pub fn with_resolved(mut self, resolved: Resolved) -> Self {
        self.resolved = Some(resolved);
        self
    }

    /// Attach the package-info snapshot for this session.
    #[must_use]
    pub fn with_package_info(mut self, info: Arc<PackageInfo>) -> Self {
        self.package_info = Some(info);
        self
    }

    /// Record the selected GHC version.
    #[must_use]
    pub fn with_ghc_version(mut self, version: ConcreteVersion) -> Self {
        self.ghc_version = Some(version);
        self
    }

    /// Record the ICU version being provisioned.
    #[must_use]
    pub fn with_icu_version(mut self, version: impl Into<String>) -> Self {
        self.icu_version = Some(version.into());
        self
    }

    /// Record the computed feature flags.
    #[must_use]
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Prepend a library search path.
    #[must_use]
    pub fn with_extra_lib_dir(mut self, dir: PathBuf) -> Self {
        self.extra_lib_dirs.insert(0, dir);
        self
    }

    /// Prepend an include search path.
    #[must_use]
    pub fn with_extra_include_dir(mut self, dir: PathBuf) -> Self {
        self.extra_include_dirs.insert(0, dir);
        self
    }

    /// Reject contradictory flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationConflict`] when both force flags are set.
    pub fn validate(&self) -> Result<()> {
        if self.force_build && self.force_no_build {
            return Err(Error::configuration_conflict(
                "\"force-build\" and \"force-no-build\" are both set",
            ));
        }
        Ok(())
    }

    /// The package name.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The descriptor as requested.
    #[must_use]
    pub fn requested(&self) -> &VersionDescriptor {
        &self.requested
    }

    /// The resolved version, once resolution has run.
    #[must_use]
    pub fn resolved(&self) -> Option<&Resolved> {
        self.resolved.as_ref()
    }

    /// The resolved release version.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution has not run or resolved to nightly.
    pub fn resolved_version(&self) -> Result<&ConcreteVersion> {
        self.resolved
            .as_ref()
            .and_then(Resolved::release)
            .ok_or_else(|| {
                Error::configuration_conflict(format!(
                    "{} version '{}' has not been resolved to a release",
                    self.package, self.requested
                ))
            })
    }

    /// The caller's GHC range.
    #[must_use]
    pub fn ghc_range(&self) -> &VersionRange {
        &self.ghc_range
    }

    /// The selected GHC version.
    #[must_use]
    pub fn ghc_version(&self) -> Option<&ConcreteVersion> {
        self.ghc_version.as_ref()
    }

    /// The ICU version being provisioned, if any.
    #[must_use]
    pub fn icu_version(&self) -> Option<&str> {
        self.icu_version.as_deref()
    }

    /// Computed feature flags.
    #[must_use]
    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    /// Whether the cache and prebuilt index are skipped.
    #[must_use]
    pub fn force_build(&self) -> bool {
        self.force_build
    }

    /// Whether source builds are forbidden.
    #[must_use]
    pub fn force_no_build(&self) -> bool {
        self.force_no_build
    }

    /// Target platform.
    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Library search paths.
    #[must_use]
    pub fn extra_lib_dirs(&self) -> &[PathBuf] {
        &self.extra_lib_dirs
    }

    /// Include search paths.
    #[must_use]
    pub fn extra_include_dirs(&self) -> &[PathBuf] {
        &self.extra_include_dirs
    }

    /// The package-info snapshot, if fetched.
    #[must_use]
    pub fn package_info(&self) -> Option<&Arc<PackageInfo>> {
        self.package_info.as_ref()
    }

    /// Full cabal configure flag list: features, compiler and search paths.
    #[must_use]
    pub fn configure_flags(&self) -> Vec<String> {
        let mut flags = self.features.configure_flags();
        if let Some(ghc) = &self.ghc_version {
            flags.push(format!("--with-compiler=ghc-{ghc}"));
        }
        flags.extend(self.extra_lib_dirs.iter().map(|d| path_flag("--extra-lib-dirs", d)));
        flags.extend(
            self.extra_include_dirs
                .iter()
                .map(|d| path_flag("--extra-include-dirs", d)),
        );
        flags
    }
}

fn path_flag(flag: &str, dir: &Path) -> String {
    format!("{flag}={}", dir.display())
}
