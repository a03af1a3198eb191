//! Persistent tool cache.
//!
//! Installs are stored by tool name, version and target platform. The
//! platform directory is `<os>-<arch>` so that a cache shared between runs
//! with different `--platform` targets never hands out a foreign binary.
//!
//! ```text
//! <root>/
//! └── Agda/
//!     └── 2.6.2.2/
//!         ├── linux-x64/          # install root (bin/, data/)
//!         └── linux-x64.complete  # written last; entries without it are ignored
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::fs::{copy_dir_recursive, remove_dir_if_exists};
use crate::platform::Platform;
use crate::{Error, Result};

/// Identifies one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolCacheKey {
    /// Tool name (`Agda`)
    pub tool: String,
    /// Exact version
    pub version: String,
    /// Platform the entry was built for
    pub platform: Platform,
}

impl ToolCacheKey {
    /// Create a key.
    #[must_use]
    pub fn new(tool: impl Into<String>, version: impl Into<String>, platform: Platform) -> Self {
        Self {
            tool: tool.into(),
            version: version.into(),
            platform,
        }
    }

    /// Directory name of the platform component, such as `linux-x64`.
    #[must_use]
    pub fn platform_dir(&self) -> String {
        format!(
            "{}-{}",
            self.platform.os,
            self.platform.arch.tool_cache_name()
        )
    }
}

/// Cache of previously acquired installs.
pub trait ToolCache: Send + Sync {
    /// Find a complete entry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache itself cannot be read.
    fn lookup(&self, key: &ToolCacheKey) -> Result<Option<PathBuf>>;

    /// Copy an install into the cache and return the cached path.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn store(&self, key: &ToolCacheKey, install_dir: &Path) -> Result<PathBuf>;
}

/// Filesystem-backed [`ToolCache`].
#[derive(Debug, Clone)]
pub struct FsToolCache {
    root: PathBuf,
}

impl Default for FsToolCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("setup-agda")
            .join("tool-cache");
        Self::new(cache_dir)
    }
}

impl FsToolCache {
    /// Create a cache at the specified root directory.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one entry.
    #[must_use]
    pub fn entry_dir(&self, key: &ToolCacheKey) -> PathBuf {
        self.version_dir(key).join(key.platform_dir())
    }

    fn version_dir(&self, key: &ToolCacheKey) -> PathBuf {
        self.root.join(&key.tool).join(&key.version)
    }

    fn marker_path(&self, key: &ToolCacheKey) -> PathBuf {
        self.version_dir(key)
            .join(format!("{}.complete", key.platform_dir()))
    }
}

impl ToolCache for FsToolCache {
    fn lookup(&self, key: &ToolCacheKey) -> Result<Option<PathBuf>> {
        let dir = self.entry_dir(key);
        if dir.is_dir() && self.marker_path(key).is_file() {
            trace!(tool = %key.tool, version = %key.version, ?dir, "Tool cache hit");
            Ok(Some(dir))
        } else {
            trace!(tool = %key.tool, version = %key.version, "Tool cache miss");
            Ok(None)
        }
    }

    fn store(&self, key: &ToolCacheKey, install_dir: &Path) -> Result<PathBuf> {
        let dest = self.entry_dir(key);
        let marker = self.marker_path(key);

        // A half-written entry from an earlier run must not survive.
        remove_dir_if_exists(&dest)?;
        if marker.exists() {
            std::fs::remove_file(&marker)
                .map_err(|e| Error::io(e, Some(marker.clone()), "remove cache marker"))?;
        }

        copy_dir_recursive(install_dir, &dest)?;
        std::fs::write(&marker, b"")
            .map_err(|e| Error::io(e, Some(marker.clone()), "write cache marker"))?;
        debug!(tool = %key.tool, version = %key.version, ?dest, "Stored in tool cache");
        Ok(dest)
    }
}
