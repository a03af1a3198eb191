//! Directory layout under the Agda directory.
//!
//! ```text
//! $AGDA_DIR/
//! ├── agda/<version>/        # install roots (bin/, data/)
//! ├── cache/                 # downloads, source checkouts, build scratch
//! ├── icu/<version>/         # auxiliary ICU installs
//! └── libraries/<name>-<v>/  # Agda libraries
//! ```

use std::path::{Path, PathBuf};

use crate::platform::{Os, Platform};

/// Resolved directory layout for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgdaPaths {
    agda_dir: PathBuf,
}

impl AgdaPaths {
    /// Use an explicit Agda directory.
    #[must_use]
    pub fn new(agda_dir: PathBuf) -> Self {
        Self { agda_dir }
    }

    /// Default location: `$AGDA_DIR`, else `%AppData%\agda` on Windows, else `~/.agda`.
    #[must_use]
    pub fn from_env(platform: &Platform) -> Self {
        if let Ok(dir) = std::env::var("AGDA_DIR") {
            if !dir.is_empty() {
                return Self::new(PathBuf::from(dir));
            }
        }
        let agda_dir = match platform.os {
            Os::Windows => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("agda"),
            Os::Darwin | Os::Linux => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".agda"),
        };
        Self::new(agda_dir)
    }

    /// Root of everything setup-agda writes.
    #[must_use]
    pub fn agda_dir(&self) -> &Path {
        &self.agda_dir
    }

    /// Scratch space for downloads and builds.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.agda_dir.join("cache")
    }

    /// Final install root for a version label (a version or `nightly`).
    #[must_use]
    pub fn install_dir(&self, label: &str) -> PathBuf {
        self.agda_dir.join("agda").join(label)
    }

    /// Root of installed Agda libraries.
    #[must_use]
    pub fn libraries_dir(&self) -> PathBuf {
        self.agda_dir.join("libraries")
    }

    /// Install directory for one Agda library.
    #[must_use]
    pub fn library_dir(&self, name: &str, version: &str) -> PathBuf {
        self.libraries_dir().join(format!("{name}-{version}"))
    }

    /// Install directory for an ICU version.
    #[must_use]
    pub fn icu_dir(&self, version: &str) -> PathBuf {
        self.agda_dir.join("icu").join(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Arch;

    #[test]
    fn test_layout() {
        let paths = AgdaPaths::new(PathBuf::from("/home/u/.agda"));
        assert_eq!(paths.cache_dir(), PathBuf::from("/home/u/.agda/cache"));
        assert_eq!(
            paths.install_dir("2.6.2.2"),
            PathBuf::from("/home/u/.agda/agda/2.6.2.2")
        );
        assert_eq!(
            paths.library_dir("standard-library", "1.7.1"),
            PathBuf::from("/home/u/.agda/libraries/standard-library-1.7.1")
        );
        assert_eq!(paths.icu_dir("71.1"), PathBuf::from("/home/u/.agda/icu/71.1"));
    }

    #[test]
    fn test_from_env_respects_agda_dir() {
        temp_env::with_var("AGDA_DIR", Some("/opt/agda"), || {
            let paths = AgdaPaths::from_env(&Platform::new(Os::Linux, Arch::X86_64));
            assert_eq!(paths.agda_dir(), Path::new("/opt/agda"));
        });
    }

    #[test]
    fn test_from_env_default() {
        temp_env::with_var_unset("AGDA_DIR", || {
            let paths = AgdaPaths::from_env(&Platform::new(Os::Linux, Arch::X86_64));
            assert!(paths.agda_dir().ends_with(".agda"));
        });
    }
}
