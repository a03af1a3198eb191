//! Building from a source checkout.
//!
//! [`SourceBuilder`] owns the decision logic: which GHC to use and which
//! flags to pass. The actual commands are behind [`BuildToolchain`], so the
//! same logic drives cabal on every platform and a fake in tests.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::compat::CompatibilityExtractor;
use crate::fs::copy_dir_recursive;
use crate::options::{BuildOptions, FeatureFlags};
use crate::platform::Platform;
use crate::version::{ConcreteVersion, Resolved, VersionDescriptor, VersionMatcher, VersionRange};
use crate::{Error, Result};

/// Executables every build produces.
pub const BUILD_TARGETS: &[&str] = &["exe:agda", "exe:agda-mode"];

/// A compiler plus package manager able to build a source checkout.
#[async_trait]
pub trait BuildToolchain: Send + Sync {
    /// Toolchain name for logs.
    fn name(&self) -> &'static str;

    /// Verify the toolchain's own programs are runnable.
    async fn check_prerequisites(&self) -> Result<()>;

    /// Make sure the selected compiler version is installed.
    async fn prepare(&self, compiler: &ConcreteVersion) -> Result<()>;

    /// Configure the checkout with the given flags.
    async fn configure(&self, source_dir: &Path, flags: &[String]) -> Result<()>;

    /// Build the given targets.
    async fn build(&self, source_dir: &Path, targets: &[String]) -> Result<()>;

    /// Copy the built executables into `bin_dir`.
    async fn install(&self, source_dir: &Path, targets: &[String], bin_dir: &Path) -> Result<()>;
}

/// Library and header directories of a provisioned library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDirs {
    /// Passed as `--extra-lib-dirs`
    pub lib_dir: PathBuf,
    /// Passed as `--extra-include-dirs`
    pub include_dir: PathBuf,
}

/// A native library some package versions link against (ICU).
#[async_trait]
pub trait AuxiliaryLibrary: Send + Sync {
    /// Library name for logs.
    fn name(&self) -> &'static str;

    /// Library version a package version needs, or `None` if it needs none.
    fn required_version(&self, package_version: &ConcreteVersion) -> Option<&'static str>;

    /// Install the library and report where it landed.
    async fn provision(
        &self,
        version: &str,
        platform: &Platform,
        install_dir: &Path,
    ) -> Result<LibraryDirs>;
}

/// Drives a [`BuildToolchain`] over a source checkout.
#[derive(Clone)]
pub struct SourceBuilder {
    toolchain: Arc<dyn BuildToolchain>,
}

impl SourceBuilder {
    /// Create a builder over a toolchain.
    #[must_use]
    pub fn new(toolchain: Arc<dyn BuildToolchain>) -> Self {
        Self { toolchain }
    }

    /// The underlying toolchain.
    #[must_use]
    pub fn toolchain(&self) -> &Arc<dyn BuildToolchain> {
        &self.toolchain
    }

    /// Build `source_dir` and install into `install_dir`.
    ///
    /// On success `install_dir/bin` holds the executables and
    /// `install_dir/data` the package's data files. Returns the options with
    /// the selected compiler and computed feature flags recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleToolchain`] if no declared compiler is in
    /// the requested range, or the toolchain's error for any failed step.
    /// `install_dir` must be treated as unusable after an error.
    #[tracing::instrument(
        name = "source_build",
        fields(source_dir = %source_dir.display(), install_dir = %install_dir.display()),
        skip(self, options)
    )]
    pub async fn build(
        &self,
        source_dir: &Path,
        install_dir: &Path,
        options: BuildOptions,
    ) -> Result<BuildOptions> {
        let declared = CompatibilityExtractor::extract_from_source_dir(source_dir)?;
        let ghc = select_toolchain(&declared, options.ghc_range())?;
        info!(%ghc, "Selected GHC version");
        self.toolchain.prepare(&ghc).await?;

        // Flags depend on the selected compiler, so they come after selection.
        let agda = options.resolved_version()?.clone();
        let features = FeatureFlags::compute(
            &agda,
            &ghc,
            options.platform(),
            options.icu_version().is_some(),
        );
        debug!(?features, "Computed feature flags");
        let options = options.with_ghc_version(ghc).with_features(features);

        let flags = options.configure_flags();
        let targets: Vec<String> = BUILD_TARGETS.iter().map(ToString::to_string).collect();

        info!(version = %agda, toolchain = self.toolchain.name(), "Configure {}", options.package());
        self.toolchain.configure(source_dir, &flags).await?;

        info!(version = %agda, "Build {}", options.package());
        self.toolchain.build(source_dir, &targets).await?;

        let bin_dir = install_dir.join("bin");
        std::fs::create_dir_all(&bin_dir)
            .map_err(|e| Error::io(e, Some(bin_dir.clone()), "create bin directory"))?;
        info!(version = %agda, bin_dir = %bin_dir.display(), "Install {}", options.package());
        self.toolchain.install(source_dir, &targets, &bin_dir).await?;

        let data_src = source_dir.join("src").join("data");
        if data_src.is_dir() {
            copy_dir_recursive(&data_src, &install_dir.join("data"))?;
        } else {
            debug!(path = %data_src.display(), "No data directory in source tree");
        }

        Ok(options)
    }
}

/// Pick the highest declared compiler inside the requested range.
///
/// # Errors
///
/// Returns [`Error::IncompatibleToolchain`] listing both sides when the
/// intersection is empty.
pub fn select_toolchain(
    declared: &BTreeSet<ConcreteVersion>,
    requested: &VersionRange,
) -> Result<ConcreteVersion> {
    let incompatible = || {
        Error::incompatible_toolchain(
            declared.iter().map(ToString::to_string).collect(),
            requested.as_str(),
        )
    };
    match VersionMatcher::match_version(declared, &VersionDescriptor::Range(requested.clone())) {
        Ok(Resolved::Release(version)) => Ok(version),
        Ok(Resolved::Nightly) | Err(Error::NotSatisfiable { .. }) => Err(incompatible()),
        Err(other) => Err(other),
    }
}
