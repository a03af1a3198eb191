//! Archive unpacking.
//!
//! `.zip` and `.tar.gz` are unpacked in-process. `.tar.xz` goes through the
//! system `tar`, which every supported runner ships with xz support.
//!
//! Unpacking is staged: the archive is extracted into a temporary sibling of
//! the destination and only renamed into place once complete.

use flate2::read::GzDecoder;
use setup_agda_core::{Error, Result};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::process::Command;
use tracing::{debug, trace};

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// `.tar.xz` or `.txz`
    TarXz,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.split(['?', '#']).next().unwrap_or(name);
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else {
            None
        }
    }
}

/// Unpack `data` so that `dest` becomes the archive's root.
///
/// The root is `subdir` inside the archive when given; otherwise the single
/// top-level directory if there is exactly one, else the archive itself.
/// An existing `dest` is replaced.
///
/// # Errors
///
/// Returns an error if extraction fails or `subdir` does not exist.
pub async fn unpack(
    data: &[u8],
    format: ArchiveFormat,
    dest: &Path,
    subdir: Option<&str>,
) -> Result<PathBuf> {
    let staging = staging_dir(dest);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .map_err(|e| Error::io(e, Some(staging.clone()), "remove stale staging directory"))?;
    }
    std::fs::create_dir_all(&staging)
        .map_err(|e| Error::io(e, Some(staging.clone()), "create staging directory"))?;

    let extracted = match format {
        ArchiveFormat::Zip => unpack_zip(data, &staging),
        ArchiveFormat::TarGz => unpack_tar_gz(data, &staging),
        ArchiveFormat::TarXz => unpack_tar_xz(data, &staging).await,
    };
    if let Err(e) = extracted.and_then(|()| promote(&staging, dest, subdir)) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }
    let _ = std::fs::remove_dir_all(&staging);

    debug!(dest = %dest.display(), ?format, "Unpacked archive");
    Ok(dest.to_path_buf())
}

fn staging_dir(dest: &Path) -> PathBuf {
    dest.with_file_name(format!(
        ".{}.tmp",
        dest.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("extract")
    ))
}

/// Move the archive root out of `staging` into `dest`.
fn promote(staging: &Path, dest: &Path, subdir: Option<&str>) -> Result<()> {
    let root = match subdir {
        Some(dir) => {
            let root = staging.join(dir);
            if !root.is_dir() {
                return Err(Error::metadata(format!(
                    "Archive does not contain directory '{dir}'"
                )));
            }
            root
        }
        None => single_top_level_dir(staging)?.unwrap_or_else(|| staging.to_path_buf()),
    };

    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "remove old install"))?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(e, Some(parent.to_path_buf()), "create directory"))?;
    }

    std::fs::rename(&root, dest)
        .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "move unpacked archive"))
}

fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "list directory"))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .collect();
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(Some(only.clone())),
        _ => Ok(None),
    }
}

fn unpack_zip(data: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::metadata(format!("Failed to open zip: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::metadata(format!("Failed to read zip entry: {e}")))?;

        let Some(outpath) = file.enclosed_name().map(|p| dest.join(p)) else {
            continue;
        };
        trace!(path = %outpath.display(), "Extracting zip entry");

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(e, Some(outpath.clone()), "create directory"))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(e, Some(parent.to_path_buf()), "create directory"))?;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::io(e, Some(outpath.clone()), "read zip entry"))?;
        std::fs::write(&outpath, &content)
            .map_err(|e| Error::io(e, Some(outpath.clone()), "write file"))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(e, Some(outpath.clone()), "set permissions"))?;
        }
    }
    Ok(())
}

fn unpack_tar_gz(data: &[u8], dest: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::metadata(format!("Failed to extract tar: {e}")))
}

async fn unpack_tar_xz(data: &[u8], dest: &Path) -> Result<()> {
    let archive_path = dest.join(".archive.tar.xz");
    tokio::fs::write(&archive_path, data)
        .await
        .map_err(|e| Error::io(e, Some(archive_path.clone()), "write archive"))?;

    let output = Command::new("tar")
        .arg("--extract")
        .arg("--xz")
        .arg("--preserve-permissions")
        .arg("--file")
        .arg(&archive_path)
        .arg("--directory")
        .arg(dest)
        .output()
        .await
        .map_err(|e| Error::process("tar", format!("Failed to run tar: {e}")))?;

    let _ = tokio::fs::remove_file(&archive_path).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::process("tar", format!("extraction failed: {stderr}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, &content[..]).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        for (path, content) in files {
            writer.start_file(*path, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ArchiveFormat::from_name("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_name("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(
            ArchiveFormat::from_name("https://x/Agda-nightly-linux.tar.xz"),
            Some(ArchiveFormat::TarXz)
        );
        assert_eq!(
            ArchiveFormat::from_name("https://x/a.tar.gz?raw=1"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::from_name("agda"), None);
    }

    #[tokio::test]
    async fn test_unpack_strips_single_top_level_dir() {
        let temp = TempDir::new().unwrap();
        let data = tar_gz(&[
            ("Agda-2.6.2/bin/agda", b"agda"),
            ("Agda-2.6.2/data/lib/prim/Agda.agda", b"module Agda where"),
        ]);
        let dest = temp.path().join("install");

        unpack(&data, ArchiveFormat::TarGz, &dest, None).await.unwrap();
        assert!(dest.join("bin/agda").is_file());
        assert!(dest.join("data/lib/prim/Agda.agda").is_file());
        assert!(!staging_dir(&dest).exists());
    }

    #[tokio::test]
    async fn test_unpack_keeps_flat_archive() {
        let temp = TempDir::new().unwrap();
        let data = zip(&[("bin/agda.exe", b"agda"), ("data/emacs-mode/x.el", b";")]);
        let dest = temp.path().join("install");

        unpack(&data, ArchiveFormat::Zip, &dest, None).await.unwrap();
        assert!(dest.join("bin/agda.exe").is_file());
        assert!(dest.join("data/emacs-mode/x.el").is_file());
    }

    #[tokio::test]
    async fn test_unpack_subdir() {
        let temp = TempDir::new().unwrap();
        let data = tar_gz(&[
            ("icu/usr/local/lib/libicuuc.so", b"so"),
            ("icu/usr/local/include/unicode/uchar.h", b"h"),
        ]);
        let dest = temp.path().join("icu");

        unpack(&data, ArchiveFormat::TarGz, &dest, Some("icu/usr/local"))
            .await
            .unwrap();
        assert!(dest.join("lib/libicuuc.so").is_file());
        assert!(dest.join("include/unicode/uchar.h").is_file());
    }

    #[tokio::test]
    async fn test_missing_subdir_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let data = tar_gz(&[("other/file", b"x")]);
        let dest = temp.path().join("icu");

        let err = unpack(&data, ArchiveFormat::TarGz, &dest, Some("icu/usr/local"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
        assert!(!dest.exists());
        assert!(!staging_dir(&dest).exists());
    }

    #[tokio::test]
    async fn test_unpack_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("install");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale"), b"old").unwrap();

        let data = tar_gz(&[("root/bin/agda", b"agda")]);
        unpack(&data, ArchiveFormat::TarGz, &dest, None).await.unwrap();
        assert!(!dest.join("stale").exists());
        assert!(dest.join("bin/agda").is_file());
    }
}
