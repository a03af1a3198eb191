//! End-to-end resolution: resolve, acquire, finalize, verify.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{Instrument, debug, info, info_span};

use crate::acquire::{AcquireContext, AcquisitionChain, AcquisitionResult, SourceKind, StageMiss};
use crate::fs::{copy_dir_recursive, remove_dir_if_exists};
use crate::options::BuildOptions;
use crate::paths::AgdaPaths;
use crate::platform::Platform;
use crate::resolver::PackageResolver;
use crate::version::Resolved;
use crate::{Error, Result};

/// A usable installation and the facts callers need about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    version: String,
    source: SourceKind,
    install_dir: PathBuf,
    paths: AgdaPaths,
    platform: Platform,
}

impl Installation {
    /// Describe an installation rooted at `install_dir`.
    #[must_use]
    pub fn new(
        resolved: &Resolved,
        source: SourceKind,
        install_dir: PathBuf,
        paths: AgdaPaths,
        platform: Platform,
    ) -> Self {
        Self {
            version: resolved.label().to_string(),
            source,
            install_dir,
            paths,
            platform,
        }
    }

    /// Resolved version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Strategy that produced the installation.
    #[must_use]
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Installation root.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Directory holding the executables.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    /// Directory holding Agda's data files.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.install_dir.join("data")
    }

    /// Path of the `agda` executable.
    #[must_use]
    pub fn agda_exe(&self) -> PathBuf {
        self.bin_dir().join(self.platform.exe_name("agda"))
    }

    /// Path of the `agda-mode` executable.
    #[must_use]
    pub fn agda_mode_exe(&self) -> PathBuf {
        self.bin_dir().join(self.platform.exe_name("agda-mode"))
    }

    /// Every output as `name -> value`.
    #[must_use]
    pub fn outputs(&self) -> BTreeMap<&'static str, String> {
        let display = |p: &Path| p.display().to_string();
        BTreeMap::from([
            ("agda-version", self.version.clone()),
            ("agda-path", display(&self.bin_dir())),
            ("agda-data-path", display(&self.data_dir())),
            ("agda-exe", display(&self.agda_exe())),
            ("agda-mode-exe", display(&self.agda_mode_exe())),
            ("agda-dir", display(self.paths.agda_dir())),
            ("agda-cache-dir", display(&self.paths.cache_dir())),
            ("agda-install-dir", display(&self.install_dir)),
            ("agda-libraries-dir", display(&self.paths.libraries_dir())),
            ("source", self.source.to_string()),
        ])
    }
}

/// Resolver plus chain plus finalization.
pub struct Pipeline {
    resolver: PackageResolver,
    chain: AcquisitionChain,
    paths: AgdaPaths,
    verify: bool,
}

impl Pipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(resolver: PackageResolver, chain: AcquisitionChain, paths: AgdaPaths) -> Self {
        Self {
            resolver,
            chain,
            paths,
            verify: true,
        }
    }

    /// Whether to run `agda --version` after installing.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Run the whole pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: a flag conflict, an unsatisfiable
    /// descriptor, a failed build, or a failed verification.
    pub async fn run(&self, options: BuildOptions) -> Result<Installation> {
        // Reject contradictory flags before touching the network.
        options.validate()?;

        let options = self.resolver.resolve(options).await?;
        let resolved = options
            .resolved()
            .cloned()
            .ok_or_else(|| Error::configuration_conflict("resolution produced no version"))?;
        info!(version = %resolved, "Resolved {} version", options.package());

        let platform = *options.platform();
        let ctx = AcquireContext::new(options, self.paths.clone());
        let (acquired, source) = match self.chain.acquire(&ctx).await? {
            AcquisitionResult::Found { path, source } => (path, source),
            AcquisitionResult::NotFound { misses } => {
                return Err(Error::source_unavailable(
                    "acquisition",
                    format!(
                        "no strategy produced {} {resolved} ({})",
                        ctx.options().package(),
                        StageMiss::summarize(&misses)
                    ),
                ));
            }
        };

        let install_dir = self.paths.install_dir(resolved.label());
        let span = info_span!("install", version = %resolved, install_dir = %install_dir.display());
        async {
            finalize(&acquired, &install_dir, source)?;
            let installation =
                Installation::new(&resolved, source, install_dir, self.paths.clone(), platform);
            if self.verify {
                verify(&installation).await?;
            }
            Ok::<_, Error>(installation)
        }
        .instrument(span)
        .await
    }
}

/// Move an acquired tree to its install directory.
///
/// Tool cache entries are copied but left in place.
fn finalize(acquired: &Path, install_dir: &Path, source: SourceKind) -> Result<()> {
    if acquired == install_dir {
        return Ok(());
    }
    info!("Install Agda to {}", install_dir.display());
    remove_dir_if_exists(install_dir)?;
    copy_dir_recursive(acquired, install_dir)?;
    if source != SourceKind::Cache {
        if let Err(e) = remove_dir_if_exists(acquired) {
            debug!(error = %e, "Failed to clean up build");
        }
    }
    Ok(())
}

async fn verify(installation: &Installation) -> Result<()> {
    let agda = installation.agda_exe();
    let output = tokio::process::Command::new(&agda)
        .arg("--version")
        .env("Agda_datadir", installation.data_dir())
        .output()
        .await
        .map_err(|e| Error::process(agda.display().to_string(), e.to_string()))?;

    if !output.status.success() {
        return Err(Error::process(
            agda.display().to_string(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    info!("{}", String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use crate::version::ConcreteVersion;
    use tempfile::TempDir;

    fn installation(install_dir: PathBuf, os: Os) -> Installation {
        Installation::new(
            &Resolved::Release(ConcreteVersion::parse("2.6.2.2").unwrap()),
            SourceKind::Source,
            install_dir,
            AgdaPaths::new(PathBuf::from("/agda")),
            Platform::new(os, Arch::X86_64),
        )
    }

    #[test]
    fn test_outputs() {
        let inst = installation(PathBuf::from("/agda/agda/2.6.2.2"), Os::Linux);
        let outputs = inst.outputs();
        assert_eq!(outputs["agda-version"], "2.6.2.2");
        assert_eq!(outputs["agda-path"], "/agda/agda/2.6.2.2/bin");
        assert_eq!(outputs["agda-exe"], "/agda/agda/2.6.2.2/bin/agda");
        assert_eq!(outputs["agda-data-path"], "/agda/agda/2.6.2.2/data");
        assert_eq!(outputs["agda-libraries-dir"], "/agda/libraries");
        assert_eq!(outputs["source"], "source");
        assert_eq!(outputs.len(), 10);
    }

    #[test]
    fn test_windows_executables() {
        let inst = installation(PathBuf::from("C:/agda/2.6.2.2"), Os::Windows);
        assert!(inst.agda_mode_exe().ends_with("agda-mode.exe"));
    }

    #[test]
    fn test_finalize_moves_build() {
        let temp = TempDir::new().unwrap();
        let acquired = temp.path().join("build");
        std::fs::create_dir_all(acquired.join("bin")).unwrap();
        std::fs::write(acquired.join("bin/agda"), b"agda").unwrap();

        let install = temp.path().join("install");
        finalize(&acquired, &install, SourceKind::PrebuiltIndex).unwrap();
        assert!(install.join("bin/agda").is_file());
        assert!(!acquired.exists());
    }

    #[test]
    fn test_finalize_keeps_cache_entry() {
        let temp = TempDir::new().unwrap();
        let acquired = temp.path().join("cache");
        std::fs::create_dir_all(&acquired).unwrap();
        std::fs::write(acquired.join("marker"), b"").unwrap();

        let install = temp.path().join("install");
        finalize(&acquired, &install, SourceKind::Cache).unwrap();
        assert!(install.join("marker").is_file());
        assert!(acquired.join("marker").is_file());
    }

    #[test]
    fn test_finalize_same_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        finalize(temp.path(), temp.path(), SourceKind::Source).unwrap();
        assert!(temp.path().exists());
    }
}
