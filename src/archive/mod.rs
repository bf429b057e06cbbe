//! Extraction of the Shinylive assets tarball.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use crate::runtime::{Runtime, normalize_path};

/// Errors that abort an extraction before anything is written.
#[derive(Debug)]
pub enum ExtractError {
    /// An entry would land outside the destination directory.
    PathTraversal { entry: PathBuf },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::PathTraversal { entry } => {
                write!(f, "Attempted path traversal in tar file: {}", entry.display())
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract a `.tar.gz` archive into `dest`.
///
/// Every entry is checked before the first one is written: an absolute path
/// or a `..` that climbs out of `dest` fails the whole extraction with
/// [`ExtractError::PathTraversal`]. Returns the number of files written.
#[tracing::instrument(skip(runtime))]
pub fn extract_tar_gz_safe<R: Runtime>(runtime: &R, archive_path: &Path, dest: &Path) -> Result<u64> {
    check_entries(runtime, archive_path)?;

    debug!("Extracting {:?} to {:?}...", archive_path, dest);
    runtime.create_dir_all(dest)?;

    let mut archive = open_archive(runtime, archive_path)?;
    let mut written = 0;
    for entry in archive.entries().context("Failed to read tar entries")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let entry_path = entry.path().context("Invalid tar entry path")?.into_owned();
        let full_path = dest.join(normalize_path(&entry_path));

        match entry.header().entry_type() {
            EntryType::Directory => runtime.create_dir_all(&full_path)?,
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut out = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                written += 1;
            }
            other => debug!("Skipping {:?} entry {:?}", other, entry_path),
        }
    }

    info!("Extracted {} files to {:?}", written, dest);
    Ok(written)
}

fn open_archive<R: Runtime>(
    runtime: &R,
    archive_path: &Path,
) -> Result<Archive<GzDecoder<Box<dyn std::io::Read + Send>>>> {
    let file = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn check_entries<R: Runtime>(runtime: &R, archive_path: &Path) -> Result<()> {
    let mut archive = open_archive(runtime, archive_path)?;
    for entry in archive.entries().context("Failed to read tar entries")? {
        let entry = entry.context("Failed to read tar entry")?;
        let entry_path = entry.path().context("Invalid tar entry path")?;
        if escapes_root(&entry_path) {
            return Err(ExtractError::PathTraversal {
                entry: entry_path.into_owned(),
            }
            .into());
        }
    }
    Ok(())
}

fn escapes_root(path: &Path) -> bool {
    if path.has_root() || path.is_absolute() {
        return true;
    }
    matches!(
        normalize_path(path).components().next(),
        Some(Component::ParentDir | Component::Prefix(_) | Component::RootDir)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::{self, File};
    use tar::{Builder, Header};
    use tempfile::tempdir;

    fn create_test_archive(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        let file = File::create(path)?;
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(enc);

        for (name, content) in files {
            let mut header = Header::new_gnu();
            // set_path refuses `..`, so write the raw name bytes.
            let raw = &mut header.as_old_mut().name;
            raw[..name.len()].copy_from_slice(name.as_bytes());
            header.set_size(content.len() as u64);
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }

        tar.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn test_extracts_nested_files() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("shinylive.tar.gz");
        let dest = dir.path().join("cache");
        create_test_archive(
            &archive_path,
            &[
                ("shinylive-0.9.1/shinylive/shinylive.js", "js"),
                ("shinylive-0.9.1/./shinylive/pyodide/pyodide-lock.json", "{}"),
            ],
        )?;

        let written = extract_tar_gz_safe(&RealRuntime, &archive_path, &dest)?;

        assert_eq!(written, 2);
        assert_eq!(
            fs::read_to_string(dest.join("shinylive-0.9.1/shinylive/shinylive.js"))?,
            "js"
        );
        assert!(
            dest.join("shinylive-0.9.1/shinylive/pyodide/pyodide-lock.json")
                .exists()
        );
        Ok(())
    }

    #[test_log::test]
    fn test_path_traversal_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("evil.tar.gz");
        let dest = dir.path().join("cache");
        create_test_archive(
            &archive_path,
            &[
                ("shinylive-0.9.1/ok.txt", "fine"),
                ("shinylive-0.9.1/../../escaped.txt", "bad"),
            ],
        )?;

        let err = extract_tar_gz_safe(&RealRuntime, &archive_path, &dest).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::PathTraversal { .. })
        ));
        assert!(!dest.exists());
        assert!(!dir.path().join("escaped.txt").exists());
        Ok(())
    }

    #[test]
    fn test_absolute_entry_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("abs.tar.gz");
        create_test_archive(&archive_path, &[("/etc/shinylive.txt", "bad")])?;

        let err = extract_tar_gz_safe(&RealRuntime, &archive_path, &dir.path().join("out"))
            .unwrap_err();
        assert!(err.to_string().contains("path traversal"));
        Ok(())
    }

    #[test]
    fn test_escapes_root() {
        assert!(escapes_root(Path::new("../x")));
        assert!(escapes_root(Path::new("a/../../x")));
        assert!(!escapes_root(Path::new("a/../x")));
        assert!(!escapes_root(Path::new("./a/b")));
    }

    #[test]
    fn test_missing_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let result = extract_tar_gz_safe(
            &RealRuntime,
            &dir.path().join("missing.tar.gz"),
            dir.path(),
        );
        assert!(result.is_err());
    }
}
