//! The local cache of Shinylive web assets.
//!
//! Each assets version lives in `<cache>/shinylive-<version>/`, unpacked from
//! the release tarball or copied/linked from a local build.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::archive::extract_tar_gz_safe;
use crate::config::{BASE_PYODIDE_FILES, Config};
use crate::http::HttpClient;
use crate::runtime::{Runtime, absolute, list_files_recursive};

/// Which parts of the assets tree a caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    /// Language-agnostic files at the root and in `shinylive/`.
    Base,
    Python,
    R,
}

/// Make sure the configured assets version is in the cache, downloading it if needed.
#[tracing::instrument(skip(runtime, http, config))]
pub async fn ensure_assets<R: Runtime>(
    runtime: &R,
    http: &HttpClient,
    config: &Config,
    url: Option<&str>,
) -> Result<PathBuf> {
    if !runtime.exists(&config.cache_dir) {
        eprintln!("Creating directory {}", config.cache_dir.display());
        runtime.create_dir_all(&config.cache_dir)?;
    }

    let assets_dir = config.assets_dir();
    if !runtime.exists(&assets_dir) {
        eprintln!("{} does not exist.", assets_dir.display());
        let url = url.map_or_else(|| config.bundle_url(), str::to_string);
        download_assets(runtime, http, &config.cache_dir, &url).await?;
    }
    Ok(assets_dir)
}

/// Download the assets tarball at `url` and unpack it into `cache_dir`.
///
/// The tarball's top-level directory is the versioned assets directory.
#[tracing::instrument(skip(runtime, http))]
pub async fn download_assets<R: Runtime>(
    runtime: &R,
    http: &HttpClient,
    cache_dir: &Path,
    url: &str,
) -> Result<()> {
    static DOWNLOADS: AtomicUsize = AtomicUsize::new(0);
    let temp_path = runtime.temp_dir().join(format!(
        "shinylive-download-{}-{}.tar.gz",
        std::process::id(),
        DOWNLOADS.fetch_add(1, Ordering::Relaxed)
    ));

    eprintln!("Downloading {}...", url);
    let result = download_and_extract(runtime, http, cache_dir, url, &temp_path).await;

    if runtime.exists(&temp_path)
        && let Err(e) = runtime.remove_file(&temp_path)
    {
        debug!("Failed to remove {:?}: {}", temp_path, e);
    }
    result
}

async fn download_and_extract<R: Runtime>(
    runtime: &R,
    http: &HttpClient,
    cache_dir: &Path,
    url: &str,
    temp_path: &Path,
) -> Result<()> {
    http.download_file(url, || {
        runtime
            .create_file(temp_path)
            .with_context(|| format!("Failed to create temporary file at {:?}", temp_path))
    })
    .await
    .with_context(|| format!("Failed to download {}", url))?;

    eprintln!("Unzipping to {}/", cache_dir.display());
    extract_tar_gz_safe(runtime, temp_path, cache_dir)?;
    Ok(())
}

/// `true` if the assets bundle at `url` exists.
pub async fn check_assets_url(http: &HttpClient, url: &str) -> Result<bool> {
    http.head_ok(url).await
}

/// Replace the cached assets for `version` with a copy of a local build.
#[tracing::instrument(skip(runtime))]
pub fn copy_from_local<R: Runtime>(
    runtime: &R,
    source_dir: &Path,
    cache_dir: &Path,
    version: &str,
) -> Result<PathBuf> {
    if !runtime.is_dir(source_dir) {
        bail!("Source directory does not exist: {}", source_dir.display());
    }
    let target_dir = version_dir(cache_dir, version);
    remove_target(runtime, &target_dir)?;

    for rel_file in list_files_recursive(runtime, source_dir)? {
        let dest = target_dir.join(&rel_file);
        if let Some(parent) = dest.parent() {
            runtime.create_dir_all(parent)?;
        }
        runtime.copy(&source_dir.join(&rel_file), &dest)?;
    }
    info!("Copied {:?} to {:?}", source_dir, target_dir);
    Ok(target_dir)
}

/// Replace the cached assets for `version` with a symlink to a local build.
#[tracing::instrument(skip(runtime))]
pub fn link_from_local<R: Runtime>(
    runtime: &R,
    source_dir: &Path,
    cache_dir: &Path,
    version: &str,
) -> Result<PathBuf> {
    let source_dir = absolute(runtime, source_dir);
    if !runtime.is_dir(&source_dir) {
        bail!("Source directory does not exist: {}", source_dir.display());
    }
    let target_dir = version_dir(cache_dir, version);
    remove_target(runtime, &target_dir)?;

    runtime.create_dir_all(cache_dir)?;
    runtime.symlink(&source_dir, &target_dir)?;
    info!("Linked {:?} -> {:?}", target_dir, source_dir);
    Ok(target_dir)
}

fn version_dir(cache_dir: &Path, version: &str) -> PathBuf {
    cache_dir.join(format!("shinylive-{}", version))
}

fn remove_target<R: Runtime>(runtime: &R, target_dir: &Path) -> Result<()> {
    if runtime.is_symlink(target_dir) {
        runtime.remove_symlink(target_dir)
    } else if runtime.is_dir(target_dir) {
        runtime.remove_dir_all(target_dir)
    } else {
        Ok(())
    }
}

/// Paths of the assets versions in the cache. Empty if the cache doesn't exist.
pub fn installed_versions<R: Runtime>(runtime: &R, cache_dir: &Path) -> Result<Vec<PathBuf>> {
    if !runtime.exists(cache_dir) {
        return Ok(Vec::new());
    }
    Ok(runtime
        .read_dir(cache_dir)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect())
}

/// Remove the given assets versions from the cache.
#[tracing::instrument(skip(runtime))]
pub fn remove_versions<R: Runtime>(runtime: &R, cache_dir: &Path, versions: &[String]) -> Result<()> {
    if versions.is_empty() {
        println!("No versions of shinylive to remove from {}/", cache_dir.display());
        return Ok(());
    }

    for version in versions {
        let target_dir = version_dir(cache_dir, version);
        println!("Removing {}", target_dir.display());
        if runtime.is_symlink(&target_dir) || runtime.is_dir(&target_dir) {
            remove_target(runtime, &target_dir)?;
        } else {
            println!("{} does not exist.", target_dir.display());
        }
    }
    Ok(())
}

/// Remove every cached version except `keep_version`. Returns the removed versions.
#[tracing::instrument(skip(runtime))]
pub fn cleanup<R: Runtime>(runtime: &R, cache_dir: &Path, keep_version: &str) -> Result<Vec<String>> {
    let mut versions: Vec<String> = installed_versions(runtime, cache_dir)?
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(|name| name.strip_prefix("shinylive-").unwrap_or(name).to_string())
        .collect();

    if let Some(idx) = versions.iter().position(|v| v == keep_version) {
        println!("Keeping version {}", keep_version);
        versions.remove(idx);
    }

    remove_versions(runtime, cache_dir, &versions)?;
    Ok(versions)
}

/// Human-readable description of the cache.
pub fn info<R: Runtime>(runtime: &R, cache_dir: &Path) -> Result<String> {
    let mut out = format!(
        "    Local cached shinylive asset dir:\n    {}\n\n",
        cache_dir.display()
    );
    if !runtime.exists(cache_dir) {
        out.push_str("    (Cache dir does not exist)\n");
        return Ok(out);
    }

    out.push_str("    Installed versions:\n");
    let versions = installed_versions(runtime, cache_dir)?;
    if versions.is_empty() {
        out.push_str("    (None)\n");
    }
    for version in versions {
        out.push_str(&format!("    {}\n", version.display()));
    }
    Ok(out)
}

/// Files from the assets tree that every deployment of the given types needs,
/// as sorted `/`-separated paths relative to `assets_dir`.
///
/// Package wheels are not included; of `shinylive/pyodide` only the runtime
/// files in [`BASE_PYODIDE_FILES`] are.
#[tracing::instrument(skip(runtime))]
pub fn common_files<R: Runtime>(
    runtime: &R,
    assets_dir: &Path,
    asset_types: &[AssetType],
) -> Result<Vec<String>> {
    if !runtime.is_dir(assets_dir) {
        bail!(
            "Shinylive assets not found at {}. Run `shinylive assets download` first.",
            assets_dir.display()
        );
    }

    let has_base = asset_types.contains(&AssetType::Base);
    let has_python = asset_types.contains(&AssetType::Python);
    let has_r = asset_types.contains(&AssetType::R);

    let mut files = Vec::new();
    let mut pending = vec![String::new()];
    while let Some(rel_dir) = pending.pop() {
        for entry in runtime.read_dir(&assets_dir.join(&rel_dir))? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let rel_path = if rel_dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", rel_dir, name)
            };

            if runtime.is_dir(&entry) {
                let skip = match (rel_dir.as_str(), name) {
                    ("", "scripts" | "export_template") => true,
                    ("shinylive", "webr") => !has_r,
                    ("shinylive", "pyodide" | "pyright") => !has_python,
                    ("shinylive/pyodide", "fonts") => true,
                    _ => false,
                };
                if !skip {
                    pending.push(rel_path);
                }
                continue;
            }

            if name.starts_with('.') {
                continue;
            }
            let include = match rel_dir.as_str() {
                "" => has_base,
                "shinylive" => has_base && name != "examples.json",
                "shinylive/pyodide" => BASE_PYODIDE_FILES.contains(&name),
                _ => true,
            };
            if include {
                files.push(rel_path);
            }
        }
    }

    files.sort();
    debug!("{} common files for {:?}", files.len(), asset_types);
    Ok(files)
}
