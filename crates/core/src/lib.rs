//! Core installation resolution for setup-agda.
//!
//! Turns a request for "Agda at some version descriptor" into a concrete,
//! usable installation directory. The pipeline is:
//!
//! 1. [`PackageResolver`] resolves the descriptor against the package index.
//! 2. [`AcquisitionChain`] tries the tool cache, then the prebuilt index, then
//!    a source build, stopping at the first success.
//! 3. [`SourceBuilder`] picks a compatible GHC from the package's own
//!    metadata and drives the build toolchain.
//!
//! # Example
//!
//! ```ignore
//! use setup_agda_core::{BuildOptions, Pipeline, VersionDescriptor};
//!
//! let options = BuildOptions::new("Agda", VersionDescriptor::Latest);
//! let installation = pipeline.run(options).await?;
//! println!("{}", installation.bin_dir().display());
//! ```

pub mod acquire;
pub mod build;
pub mod cache;
pub mod compat;
pub mod error;
pub mod fs;
pub mod index;
pub mod options;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod resolver;
pub mod retry;
pub mod version;

pub use acquire::{
    AcquireContext, AcquisitionChain, AcquisitionResult, AcquisitionSource, SourceBuildStage,
    SourceKind, StageMiss, ToolCacheSource,
};
pub use build::{AuxiliaryLibrary, BUILD_TARGETS, BuildToolchain, LibraryDirs, SourceBuilder};
pub use cache::{FsToolCache, ToolCache, ToolCacheKey};
pub use compat::CompatibilityExtractor;
pub use error::{Error, Result};
pub use index::{ArchiveLocation, PackageIndex, PackageInfo, VersionStatus};
pub use options::{BuildOptions, FeatureFlags};
pub use paths::AgdaPaths;
pub use pipeline::{Installation, Pipeline};
pub use platform::{Arch, Os, Platform};
pub use resolver::PackageResolver;
pub use retry::{RetryConfig, with_retry};
pub use version::{ConcreteVersion, Resolved, VersionDescriptor, VersionMatcher, VersionRange};
