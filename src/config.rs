//! Process configuration: asset versions, cache locations and the base package set.

use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Version of the Shinylive web assets this build works with.
pub const SHINYLIVE_ASSETS_VERSION: &str = "0.9.1";

/// Version of this tool, stamped by `build.rs`.
pub const SHINYLIVE_PACKAGE_VERSION: &str = env!("SHINYLIVE_VERSION");

/// Packages that are always included in a Shinylive deployment.
pub const BASE_PYODIDE_PACKAGE_NAMES: &[&str] = &["distutils", "micropip", "ssl", "pyodide-http"];

/// Files in `shinylive/pyodide/` that are always included.
pub const BASE_PYODIDE_FILES: &[&str] = &[
    "pyodide.asm.js",
    "pyodide.asm.wasm",
    "python_stdlib.zip",
    "pyodide-lock.json",
];

/// Overrides the assets cache directory.
pub const CACHE_DIR_ENV: &str = "SHINYLIVE_CACHE_DIR";

/// Comma-separated replacement for [`BASE_PYODIDE_PACKAGE_NAMES`].
pub const BASE_PACKAGES_ENV: &str = "SHINYLIVE_BASE_PACKAGES";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub assets_version: String,
    pub cache_dir: PathBuf,
    pub base_packages: BTreeSet<String>,
}

impl Config {
    /// Build a config from an explicit cache dir (if any) and the environment.
    #[tracing::instrument(skip(runtime))]
    pub fn new<R: Runtime>(runtime: &R, cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => match runtime.env_var(CACHE_DIR_ENV) {
                Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => default_cache_dir(runtime)?,
            },
        };
        debug!("Using assets cache dir {:?}", cache_dir);

        let base_packages = match runtime.env_var(BASE_PACKAGES_ENV) {
            Ok(list) if !list.trim().is_empty() => {
                debug!("Base packages overridden by {}: {}", BASE_PACKAGES_ENV, list);
                parse_package_list(&list)
            }
            _ => default_base_packages(),
        };

        Ok(Self {
            assets_version: SHINYLIVE_ASSETS_VERSION.to_string(),
            cache_dir,
            base_packages,
        })
    }

    pub fn with_assets_version(mut self, version: impl Into<String>) -> Self {
        self.assets_version = version.into();
        self
    }

    pub fn with_base_packages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_packages = names.into_iter().map(Into::into).collect();
        self
    }

    /// `<cache>/shinylive-<version>`
    pub fn assets_dir(&self) -> PathBuf {
        self.cache_dir
            .join(format!("shinylive-{}", self.assets_version))
    }

    /// `<assets>/shinylive/pyodide`
    pub fn pyodide_dir(&self) -> PathBuf {
        self.assets_dir().join("shinylive").join("pyodide")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.pyodide_dir().join("pyodide-lock.json")
    }

    pub fn export_template_dir(&self) -> PathBuf {
        self.assets_dir().join("export_template")
    }

    pub fn codeblock_to_json_file(&self) -> PathBuf {
        self.assets_dir().join("scripts").join("codeblock-to-json.js")
    }

    pub fn bundle_url(&self) -> String {
        bundle_url(&self.assets_version)
    }
}

pub fn default_base_packages() -> BTreeSet<String> {
    BASE_PYODIDE_PACKAGE_NAMES
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Split a comma-separated package list, dropping blanks.
pub fn parse_package_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// URL of the release tarball for a given assets version.
pub fn bundle_url(version: &str) -> String {
    format!(
        "https://github.com/posit-dev/shinylive/releases/download/v{}/shinylive-{}.tar.gz",
        version, version
    )
}

#[tracing::instrument(skip(runtime))]
pub fn default_cache_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let cache_dir = runtime
        .cache_dir()
        .context("Could not find the user cache directory")?;
    Ok(cache_dir.join("shinylive"))
}
