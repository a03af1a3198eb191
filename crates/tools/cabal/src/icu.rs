//! ICU provisioning.
//!
//! Agda's `enable-cluster-counting` flag links against ICU through
//! `text-icu`. Versions before 2.6.2 depend on `text-icu ^0.7`, which does not
//! compile against ICU 68 or later, so they get 67.1.

use async_trait::async_trait;
use setup_agda_bdist::{ArchiveFormat, Downloader, unpack};
use setup_agda_core::{
    Arch, AuxiliaryLibrary, ConcreteVersion, Error, LibraryDirs, Os, Platform, Result,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::program_output;

const ICU_RELEASES: &str = "https://github.com/unicode-org/icu/releases/download";

/// Upstream prebuilt ICU archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcuArchive {
    /// Download URL
    pub url: String,
    /// Directory inside the archive to install from
    pub subdir: Option<&'static str>,
    /// Library directory relative to the install root
    pub lib_dir: &'static str,
}

/// Prebuilt archive for an ICU version, if upstream publishes one for the platform.
#[must_use]
pub fn icu_archive(version: &str, platform: &Platform) -> Option<IcuArchive> {
    let (release, file) = match (version, platform.os, platform.arch) {
        ("67.1", Os::Linux, Arch::X86_64) => ("release-67-1", "icu4c-67_1-Ubuntu18.04-x64.tgz"),
        ("71.1", Os::Linux, Arch::X86_64) => ("release-71-1", "icu4c-71_1-Ubuntu20.04-x64.tgz"),
        ("67.1", Os::Windows, Arch::X86_64) => ("release-67-1", "icu4c-67_1-Win64-MSVC2017.zip"),
        ("71.1", Os::Windows, Arch::X86_64) => ("release-71-1", "icu4c-71_1-Win64-MSVC2019.zip"),
        _ => return None,
    };
    let (subdir, lib_dir) = match platform.os {
        Os::Windows => (None, "bin64"),
        _ => (Some("icu/usr/local"), "lib"),
    };
    Some(IcuArchive {
        url: format!("{ICU_RELEASES}/{release}/{file}"),
        subdir,
        lib_dir,
    })
}

/// [`AuxiliaryLibrary`] installing ICU from upstream archives or Homebrew.
pub struct IcuInstaller {
    downloader: Downloader,
}

impl IcuInstaller {
    /// Create an installer.
    #[must_use]
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }

    async fn provision_archive(&self, archive: IcuArchive, install_dir: &Path) -> Result<LibraryDirs> {
        let dirs = LibraryDirs {
            lib_dir: install_dir.join(archive.lib_dir),
            include_dir: install_dir.join("include"),
        };
        if dirs.lib_dir.is_dir() && dirs.include_dir.is_dir() {
            debug!(path = %install_dir.display(), "ICU already provisioned");
            return Ok(dirs);
        }

        info!(url = %archive.url, "Download ICU");
        let data = self.downloader.download(&archive.url).await?;
        let format = ArchiveFormat::from_name(&archive.url)
            .ok_or_else(|| Error::metadata(format!("Unsupported archive format: {}", archive.url)))?;
        unpack(&data, format, install_dir, archive.subdir).await?;
        Ok(dirs)
    }

    async fn provision_homebrew(version: &str) -> Result<LibraryDirs> {
        if version != "71.1" {
            return Err(Error::source_unavailable(
                "icu",
                format!("Homebrew only provides the current ICU, not {version}"),
            ));
        }
        let prefix = PathBuf::from(program_output("brew", &["--prefix"]).await?);
        info!("Install ICU through Homebrew");
        program_output("brew", &["install", "icu4c"]).await?;
        let icu = prefix.join("opt").join("icu4c");
        Ok(LibraryDirs {
            lib_dir: icu.join("lib"),
            include_dir: icu.join("include"),
        })
    }
}

#[async_trait]
impl AuxiliaryLibrary for IcuInstaller {
    fn name(&self) -> &'static str {
        "icu"
    }

    fn required_version(&self, package_version: &ConcreteVersion) -> Option<&'static str> {
        if package_version.cmp_parts(&[2, 6, 2]).is_ge() {
            Some("71.1")
        } else if package_version.cmp_parts(&[2, 5, 3]).is_ge() {
            Some("67.1")
        } else {
            None
        }
    }

    async fn provision(
        &self,
        version: &str,
        platform: &Platform,
        install_dir: &Path,
    ) -> Result<LibraryDirs> {
        if platform.os == Os::Darwin {
            return Self::provision_homebrew(version).await;
        }
        let archive = icu_archive(version, platform).ok_or_else(|| {
            Error::source_unavailable("icu", format!("No ICU {version} build for {platform}"))
        })?;
        self.provision_archive(archive, install_dir).await
    }
}
