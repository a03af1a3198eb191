//! Resolving a version descriptor against the package index.

use std::sync::Arc;
use tracing::{debug, info};

use crate::index::{PackageIndex, PackageInfo};
use crate::options::BuildOptions;
use crate::version::{Resolved, VersionDescriptor, VersionMatcher};
use crate::{Error, Result};

/// Resolves the requested descriptor to a concrete version.
pub struct PackageResolver {
    index: Arc<dyn PackageIndex>,
}

impl PackageResolver {
    /// Create a resolver over an index.
    #[must_use]
    pub fn new(index: Arc<dyn PackageIndex>) -> Self {
        Self { index }
    }

    /// Resolve `options.requested()` and return options carrying the result.
    ///
    /// Package info is fetched at most once: if `options` already carries a
    /// snapshot it is reused, otherwise the fetched one is attached to the
    /// returned options. A nightly request never contacts the index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSatisfiable`] if nothing matches, or the index
    /// error if package info cannot be fetched.
    #[tracing::instrument(
        name = "resolve",
        fields(package = %options.package(), requested = %options.requested()),
        skip(self, options)
    )]
    pub async fn resolve(&self, options: BuildOptions) -> Result<BuildOptions> {
        if options.requested().is_nightly() {
            debug!("Nightly requested, skipping index lookup");
            return Ok(options.with_resolved(Resolved::Nightly));
        }

        let (options, info) = self.package_info(options).await?;
        let resolved = VersionMatcher::match_version(&info.candidates(), options.requested())?;

        if !matches!(options.requested(), VersionDescriptor::Exact(v) if Some(v) == resolved.release())
        {
            info!(
                "Resolved {} version '{}' to {}",
                options.package(),
                options.requested(),
                resolved
            );
        }
        Ok(options.with_resolved(resolved))
    }

    async fn package_info(
        &self,
        options: BuildOptions,
    ) -> Result<(BuildOptions, Arc<PackageInfo>)> {
        if let Some(info) = options.package_info() {
            let info = Arc::clone(info);
            return Ok((options, info));
        }

        debug!(index = self.index.name(), "Fetching package info");
        let info = self
            .index
            .package_info(options.package())
            .await
            .map_err(|e| match e {
                Error::Network { message } => Error::network(format!(
                    "Could not fetch versions of {} from {}: {message}",
                    options.package(),
                    self.index.name()
                )),
                other => other,
            })?;
        let info = Arc::new(info);
        Ok((options.with_package_info(Arc::clone(&info)), info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ArchiveLocation, VersionStatus};
    use crate::version::ConcreteVersion;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIndex {
        versions: Vec<(&'static str, VersionStatus)>,
        calls: AtomicUsize,
    }

    impl CountingIndex {
        fn new(versions: Vec<(&'static str, VersionStatus)>) -> Self {
            Self {
                versions,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PackageIndex for CountingIndex {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn package_info(&self, _package: &str) -> Result<PackageInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PackageInfo::new(
                self.versions
                    .iter()
                    .map(|(v, s)| (ConcreteVersion::parse(v).unwrap(), *s))
                    .collect::<BTreeMap<_, _>>(),
            ))
        }

        fn source_location(&self, package: &str, version: &ConcreteVersion) -> ArchiveLocation {
            ArchiveLocation {
                url: format!("memory://{package}-{version}"),
                root: format!("{package}-{version}"),
            }
        }

        async fn fetch_source(&self, _location: &ArchiveLocation, dest: &Path) -> Result<PathBuf> {
            Ok(dest.to_path_buf())
        }
    }

    fn options(descriptor: &str) -> BuildOptions {
        BuildOptions::new("Agda", VersionDescriptor::parse(descriptor).unwrap())
    }

    #[tokio::test]
    async fn test_resolve_latest() {
        let index = Arc::new(CountingIndex::new(vec![
            ("2.6.1", VersionStatus::Normal),
            ("2.6.2", VersionStatus::Normal),
        ]));
        let resolver = PackageResolver::new(index.clone());

        let resolved = resolver.resolve(options("latest")).await.unwrap();
        assert_eq!(resolved.resolved_version().unwrap().as_str(), "2.6.2");
        assert!(resolved.package_info().is_some());
    }

    #[tokio::test]
    async fn test_package_info_fetched_once() {
        let index = Arc::new(CountingIndex::new(vec![("2.6.2", VersionStatus::Normal)]));
        let resolver = PackageResolver::new(index.clone());

        let first = resolver.resolve(options("latest")).await.unwrap();
        let again = BuildOptions::new("Agda", VersionDescriptor::parse("2.6.2").unwrap())
            .with_package_info(Arc::clone(first.package_info().unwrap()));
        resolver.resolve(again).await.unwrap();

        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deprecated_versions_are_not_candidates() {
        let index = Arc::new(CountingIndex::new(vec![
            ("2.6.2", VersionStatus::Normal),
            ("2.6.3", VersionStatus::Deprecated),
        ]));
        let resolver = PackageResolver::new(index);

        let resolved = resolver.resolve(options("latest")).await.unwrap();
        assert_eq!(resolved.resolved_version().unwrap().as_str(), "2.6.2");

        let err = resolver.resolve(options("2.6.3")).await.unwrap_err();
        assert!(matches!(err, Error::NotSatisfiable { .. }));
    }

    #[tokio::test]
    async fn test_nightly_skips_index() {
        let index = Arc::new(CountingIndex::new(vec![]));
        let resolver = PackageResolver::new(index.clone());

        let resolved = resolver.resolve(options("nightly")).await.unwrap();
        assert_eq!(resolved.resolved(), Some(&Resolved::Nightly));
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_range_resolution() {
        let index = Arc::new(CountingIndex::new(vec![
            ("2.5.4.2", VersionStatus::Normal),
            ("2.6.1.3", VersionStatus::Normal),
            ("2.6.2.2", VersionStatus::Normal),
        ]));
        let resolver = PackageResolver::new(index);

        let resolved = resolver.resolve(options(">=2.6 <2.6.2")).await.unwrap();
        assert_eq!(resolved.resolved_version().unwrap().as_str(), "2.6.1.3");
    }
}
