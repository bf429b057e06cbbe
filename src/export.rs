//! Turning an app directory into a static site.

use anyhow::{Result, bail};
use log::debug;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::app_json::{AppInfo, read_app_files, write_app_json};
use crate::assets::{AssetType, common_files};
use crate::config::Config;
use crate::deps::{Resolver, dedupe_by_key};
use crate::materialize::{CopyPolicy, MaterializeReport, copy_file, materialize_packages};
use crate::runtime::{Runtime, list_files_recursive};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub appdir: PathBuf,
    pub destdir: PathBuf,
    /// Where the app lands inside `destdir`. Must be relative.
    pub subdir: PathBuf,
    /// Copy every Pyodide package instead of only the ones the app needs.
    pub full_shinylive: bool,
    /// Defaults to the assets' `export_template` directory.
    pub template_dir: Option<PathBuf>,
    pub template_params: Map<String, Value>,
}

/// Export the app in `options.appdir` to `options.destdir`.
///
/// Existing files in `destdir` are never overwritten, so several apps can be
/// exported into the same site. Returns what happened to the package files.
#[tracing::instrument(skip(runtime, config, resolver))]
pub fn export<R: Runtime>(
    runtime: &R,
    config: &Config,
    resolver: &Resolver,
    options: &ExportOptions,
) -> Result<MaterializeReport> {
    let ExportOptions {
        appdir,
        destdir,
        subdir,
        ..
    } = options;

    if !runtime.exists(&appdir.join("app.py")) {
        bail!(
            "Directory {}/ must contain a file named app.py.",
            appdir.display()
        );
    }
    if subdir.is_absolute() {
        bail!(
            "subdir {} is absolute, but only relative paths are allowed.",
            subdir.display()
        );
    }
    if !runtime.exists(destdir) {
        eprintln!("Creating {}/", destdir.display());
        runtime.create_dir_all(destdir)?;
    }

    let policy = CopyPolicy { overwrite: false };
    let assets_dir = config.assets_dir();

    eprintln!(
        "Copying base Shinylive files from {}/ to {}/",
        assets_dir.display(),
        destdir.display()
    );
    let base_files = common_files(runtime, &assets_dir, &[AssetType::Base, AssetType::Python])?;
    for file in &base_files {
        copy_file(runtime, &assets_dir.join(file), &destdir.join(file), policy)?;
    }

    let app_info = AppInfo {
        appdir: appdir.clone(),
        subdir: subdir.clone(),
        files: read_app_files(runtime, appdir, destdir)?,
    };

    let report = if options.full_shinylive {
        let pyodide_dir = config.pyodide_dir();
        let out_dir = destdir.join("shinylive").join("pyodide");
        let mut report = MaterializeReport::default();
        for rel in list_files_recursive(runtime, &pyodide_dir)? {
            let posix = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if base_files.contains(&format!("shinylive/pyodide/{}", posix)) {
                continue;
            }
            let dest = out_dir.join(&rel);
            let outcome = copy_file(runtime, &pyodide_dir.join(&rel), &dest, policy)?;
            report.record(&dest, outcome);
        }
        report
    } else {
        let records = dedupe_by_key(
            resolver
                .base_packages()
                .into_iter()
                .chain(resolver.find_package_deps(&app_info.files)),
        );
        eprintln!(
            "Copying imported packages from {}/ to {}/",
            config.pyodide_dir().display(),
            destdir.join("shinylive").join("pyodide").display()
        );
        debug!(
            "Package files: {}",
            records
                .iter()
                .map(|r| r.file_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        materialize_packages(runtime, &assets_dir, destdir, &records, policy)?
    };

    let template_dir = options
        .template_dir
        .clone()
        .unwrap_or_else(|| config.export_template_dir());
    write_app_json(runtime, &app_info, destdir, &template_dir, &options.template_params)?;

    eprintln!(
        "\nRun the following to serve the app:\n  python3 -m http.server --directory {} --bind localhost 8008",
        destdir.display()
    );
    Ok(report)
}
