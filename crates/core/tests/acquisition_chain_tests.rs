//! Acquisition chain ordering, verified with call-count instrumentation.

use async_trait::async_trait;
use setup_agda_core::{
    AcquireContext, AcquisitionChain, AcquisitionResult, AcquisitionSource, AgdaPaths, Arch,
    BuildOptions, ConcreteVersion, Error, FsToolCache, Os, Platform, Resolved, Result, SourceKind,
    StageMiss, ToolCache, ToolCacheKey, VersionDescriptor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// Mocks
// =============================================================================

struct MockCache {
    hit: Option<PathBuf>,
    lookups: AtomicUsize,
    stores: AtomicUsize,
}

impl MockCache {
    fn new(hit: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            hit: hit.map(PathBuf::from),
            lookups: AtomicUsize::new(0),
            stores: AtomicUsize::new(0),
        })
    }
}

impl ToolCache for MockCache {
    fn lookup(&self, _key: &ToolCacheKey) -> Result<Option<PathBuf>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.hit.clone())
    }

    fn store(&self, _key: &ToolCacheKey, install_dir: &Path) -> Result<PathBuf> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(install_dir.to_path_buf())
    }
}

enum Behavior {
    Hit(&'static str),
    Miss,
    Fail,
}

struct MockSource {
    kind: SourceKind,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockSource {
    fn new(kind: SourceKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionSource for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn try_acquire(&self, _ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Hit(path) => Ok(Some(PathBuf::from(path))),
            Behavior::Miss => Ok(None),
            Behavior::Fail => Err(Error::build_failure("build", "ghc: panic")),
        }
    }
}

/// Lookup whose mirror drops the connection.
struct Unreachable;

#[async_trait]
impl AcquisitionSource for Unreachable {
    fn kind(&self) -> SourceKind {
        SourceKind::PrebuiltIndex
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn try_acquire(&self, _ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        Err(Error::network("connection reset by mirror"))
    }
}

fn release_ctx(options: BuildOptions) -> AcquireContext {
    let options =
        options.with_resolved(Resolved::Release(ConcreteVersion::parse("2.6.2.2").unwrap()));
    AcquireContext::new(options, AgdaPaths::new(PathBuf::from("/agda")))
}

fn options() -> BuildOptions {
    BuildOptions::new("Agda", VersionDescriptor::Latest)
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn cache_hit_never_reaches_later_stages() {
    let cache = MockCache::new(Some("/cache/Agda/2.6.2.2/x64"));
    let prebuilt = MockSource::new(SourceKind::PrebuiltIndex, Behavior::Hit("/bdist"));
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone()).with_lookup(prebuilt.clone());

    let result = chain.acquire(&release_ctx(options())).await.unwrap();

    assert_eq!(
        result,
        AcquisitionResult::Found {
            path: PathBuf::from("/cache/Agda/2.6.2.2/x64"),
            source: SourceKind::Cache,
        }
    );
    assert_eq!(prebuilt.calls(), 0);
    assert_eq!(build.calls(), 0);
    assert_eq!(cache.stores.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prebuilt_hit_skips_build_and_is_cached() {
    let cache = MockCache::new(None);
    let prebuilt = MockSource::new(SourceKind::PrebuiltIndex, Behavior::Hit("/bdist"));
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone()).with_lookup(prebuilt.clone());

    let result = chain.acquire(&release_ctx(options())).await.unwrap();

    assert_eq!(
        result,
        AcquisitionResult::Found {
            path: PathBuf::from("/bdist"),
            source: SourceKind::PrebuiltIndex,
        }
    );
    assert_eq!(build.calls(), 0);
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stores.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn force_build_skips_cache_and_prebuilt() {
    let cache = MockCache::new(Some("/cache"));
    let prebuilt = MockSource::new(SourceKind::PrebuiltIndex, Behavior::Hit("/bdist"));
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone()).with_lookup(prebuilt.clone());

    let result = chain
        .acquire(&release_ctx(options().with_force_build(true)))
        .await
        .unwrap();

    assert_eq!(
        result,
        AcquisitionResult::Found {
            path: PathBuf::from("/built"),
            source: SourceKind::Source,
        }
    );
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(prebuilt.calls(), 0);
    assert_eq!(build.calls(), 1);
}

// =============================================================================
// Failure policy
// =============================================================================

#[tokio::test]
async fn force_no_build_without_artifact_is_a_conflict() {
    let cache = MockCache::new(None);
    let prebuilt = MockSource::new(SourceKind::PrebuiltIndex, Behavior::Miss);
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache, build.clone()).with_lookup(prebuilt.clone());

    let err = chain
        .acquire(&release_ctx(options().with_force_no_build(true)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConfigurationConflict { .. }));
    assert_eq!(prebuilt.calls(), 1);
    assert_eq!(build.calls(), 0);
}

#[tokio::test]
async fn force_no_build_with_cached_artifact_succeeds() {
    let cache = MockCache::new(Some("/cache"));
    let build = MockSource::new(SourceKind::Source, Behavior::Fail);
    let chain = AcquisitionChain::new(cache, build.clone());

    let result = chain
        .acquire(&release_ctx(options().with_force_no_build(true)))
        .await
        .unwrap();
    assert!(result.is_found());
    assert_eq!(build.calls(), 0);
}

#[tokio::test]
async fn contradictory_flags_fail_before_any_stage() {
    let cache = MockCache::new(Some("/cache"));
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone());

    let err = chain
        .acquire(&release_ctx(
            options().with_force_build(true).with_force_no_build(true),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConfigurationConflict { .. }));
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(build.calls(), 0);
}

#[tokio::test]
async fn build_failure_propagates() {
    let cache = MockCache::new(None);
    let build = MockSource::new(SourceKind::Source, Behavior::Fail);
    let chain = AcquisitionChain::new(cache.clone(), build);

    let err = chain.acquire(&release_ctx(options())).await.unwrap_err();
    assert!(matches!(err, Error::BuildFailure { .. }));
    assert_eq!(cache.stores.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn build_miss_is_not_found() {
    let chain = AcquisitionChain::new(
        MockCache::new(None),
        MockSource::new(SourceKind::Source, Behavior::Miss),
    );
    let result = chain.acquire(&release_ctx(options())).await.unwrap();
    assert_eq!(
        result,
        AcquisitionResult::NotFound {
            misses: vec![
                StageMiss::new(SourceKind::Cache, "not found"),
                StageMiss::new(SourceKind::Source, "not found"),
            ]
        }
    );
}

#[tokio::test]
async fn force_no_build_reports_why_lookups_missed() {
    let prebuilt = Arc::new(Unreachable);
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(MockCache::new(None), build.clone()).with_lookup(prebuilt);

    let err = chain
        .acquire(&release_ctx(options().with_force_no_build(true)))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, Error::ConfigurationConflict { .. }));
    assert!(message.contains("tool-cache: not found"), "{message}");
    assert!(
        message.contains("prebuilt-index: Network error: connection reset by mirror"),
        "{message}"
    );
    assert_eq!(build.calls(), 0);
}

// =============================================================================
// Platform isolation
// =============================================================================

#[tokio::test]
async fn cached_build_for_another_os_is_not_reused() {
    let temp = tempfile::TempDir::new().unwrap();
    let install = temp.path().join("install");
    std::fs::create_dir_all(install.join("bin")).unwrap();

    let cache = Arc::new(FsToolCache::new(temp.path().join("tool-cache")));
    let linux = Platform::new(Os::Linux, Arch::X86_64);
    cache
        .store(&ToolCacheKey::new("Agda", "2.6.2.2", linux), &install)
        .unwrap();

    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone());

    let windows = options().with_platform(Platform::new(Os::Windows, Arch::X86_64));
    let result = chain.acquire(&release_ctx(windows)).await.unwrap();
    assert_eq!(
        result,
        AcquisitionResult::Found {
            path: PathBuf::from("/built"),
            source: SourceKind::Source,
        }
    );
    assert_eq!(build.calls(), 1);

    let result = chain
        .acquire(&release_ctx(options().with_platform(linux)))
        .await
        .unwrap();
    assert!(matches!(
        result,
        AcquisitionResult::Found {
            source: SourceKind::Cache,
            ..
        }
    ));
}

// =============================================================================
// Nightly
// =============================================================================

#[tokio::test]
async fn nightly_bypasses_lookups() {
    let cache = MockCache::new(Some("/cache"));
    let prebuilt = MockSource::new(SourceKind::PrebuiltIndex, Behavior::Hit("/bdist"));
    let build = MockSource::new(SourceKind::Source, Behavior::Hit("/built"));
    let nightly = MockSource::new(SourceKind::Nightly, Behavior::Hit("/agda/agda/nightly"));
    let chain = AcquisitionChain::new(cache.clone(), build.clone())
        .with_lookup(prebuilt.clone())
        .with_nightly(nightly.clone());

    let ctx = AcquireContext::new(
        BuildOptions::new("Agda", VersionDescriptor::Nightly).with_resolved(Resolved::Nightly),
        AgdaPaths::new(PathBuf::from("/agda")),
    );
    let result = chain.acquire(&ctx).await.unwrap();

    assert_eq!(
        result,
        AcquisitionResult::Found {
            path: PathBuf::from("/agda/agda/nightly"),
            source: SourceKind::Nightly,
        }
    );
    assert_eq!(cache.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(cache.stores.load(Ordering::SeqCst), 0);
    assert_eq!(prebuilt.calls(), 0);
    assert_eq!(build.calls(), 0);
    assert_eq!(nightly.calls(), 1);
}
