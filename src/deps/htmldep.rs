//! HTML dependency descriptions consumed by the Quarto extension.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::Resolver;
use crate::app_json::FileContent;
use crate::assets::{AssetType, common_files};
use crate::config::Config;
use crate::lockfile::PackageRecord;
use crate::runtime::Runtime;

const LOAD_SW_SCRIPT: &str = "load-shinylive-sw.js";
const RUN_BLOCKS_SCRIPT: &str = "run-python-blocks.js";
const STYLESHEET: &str = "shinylive.css";

/// A file to ship with a page: `name` is its path in the output, `path` its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlDepItem {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribs: Option<BTreeMap<String, String>>,
}

impl HtmlDepItem {
    fn asset(assets_dir: &Path, rel_path: &str) -> Self {
        Self {
            name: rel_path.to_string(),
            path: assets_dir.join(rel_path).display().to_string(),
            attribs: None,
        }
    }

    /// The wheel or archive of a lock file package.
    pub fn package(config: &Config, record: &PackageRecord) -> Self {
        Self {
            name: format!("shinylive/pyodide/{}", record.file_name),
            path: config.pyodide_dir().join(&record.file_name).display().to_string(),
            attribs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlDepServiceworkerItem {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuartoHtmlDependency {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Vec<HtmlDepItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheets: Option<Vec<HtmlDepItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<HtmlDepItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serviceworkers: Option<Vec<HtmlDepServiceworkerItem>>,
}

impl QuartoHtmlDependency {
    fn named(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: Some(version.to_string()),
            scripts: None,
            stylesheets: None,
            resources: None,
            meta: None,
            serviceworkers: None,
        }
    }
}

/// The service worker dependency. `sw_dir`, when given, is passed to the page
/// in a `shinylive:serviceworker_dir` meta tag.
pub fn serviceworker_dep(config: &Config, sw_dir: Option<&str>) -> QuartoHtmlDependency {
    let mut dep = QuartoHtmlDependency::named("shinylive-serviceworker", &config.assets_version);
    dep.serviceworkers = Some(vec![HtmlDepServiceworkerItem {
        source: config.assets_dir().join("shinylive-sw.js").display().to_string(),
        destination: "/shinylive-sw.js".to_string(),
    }]);
    if let Some(sw_dir) = sw_dir {
        dep.meta = Some(BTreeMap::from([(
            "shinylive:serviceworker_dir".to_string(),
            sw_dir.to_string(),
        )]));
    }
    dep
}

/// The common files of `asset_types`, split into scripts, stylesheets and resources.
///
/// The two loader scripts are module scripts, ordered so the service worker
/// loader comes first. Every file except the stylesheet is also a resource.
#[tracing::instrument(skip(runtime, config))]
pub fn common_dep<R: Runtime>(
    runtime: &R,
    config: &Config,
    asset_types: &[AssetType],
) -> Result<QuartoHtmlDependency> {
    let assets_dir = config.assets_dir();
    let mut scripts = Vec::new();
    let mut stylesheets = Vec::new();
    let mut resources = Vec::new();

    for file in common_files(runtime, &assets_dir, asset_types)? {
        let basename = file.rsplit('/').next().unwrap_or(&file);
        if basename == LOAD_SW_SCRIPT || basename == RUN_BLOCKS_SCRIPT {
            let mut item = HtmlDepItem::asset(&assets_dir, &file);
            item.attribs = Some(BTreeMap::from([("type".to_string(), "module".to_string())]));
            scripts.push(item);
        }
        if basename == STYLESHEET {
            stylesheets.push(HtmlDepItem::asset(&assets_dir, &file));
        } else {
            resources.push(HtmlDepItem::asset(&assets_dir, &file));
        }
    }

    scripts.sort_by_key(|item| match item.name.rsplit('/').next() {
        Some(LOAD_SW_SCRIPT) => 0,
        Some(RUN_BLOCKS_SCRIPT) => 2,
        _ => 1,
    });

    let mut dep = QuartoHtmlDependency::named("shinylive", &config.assets_version);
    dep.scripts = Some(scripts);
    dep.stylesheets = Some(stylesheets);
    dep.resources = Some(resources);
    Ok(dep)
}

/// The service worker and the language-agnostic common files.
pub fn base_deps_htmldep<R: Runtime>(
    runtime: &R,
    config: &Config,
    sw_dir: Option<&str>,
) -> Result<Vec<QuartoHtmlDependency>> {
    Ok(vec![
        serviceworker_dep(config, sw_dir),
        common_dep(runtime, config, &[AssetType::Base])?,
    ])
}

/// Pyodide and Pyright support files plus the base packages.
#[tracing::instrument(skip_all)]
pub fn python_resources<R: Runtime>(
    runtime: &R,
    config: &Config,
    resolver: &Resolver,
) -> Result<Vec<HtmlDepItem>> {
    let assets_dir = config.assets_dir();
    let mut items: Vec<HtmlDepItem> = common_files(runtime, &assets_dir, &[AssetType::Python])?
        .iter()
        .map(|file| HtmlDepItem::asset(&assets_dir, file))
        .collect();
    items.extend(
        resolver
            .base_packages()
            .iter()
            .map(|record| HtmlDepItem::package(config, record)),
    );
    Ok(items)
}

/// Package files needed by an app on top of the base set.
pub fn app_resources(config: &Config, resolver: &Resolver, files: &[FileContent]) -> Vec<HtmlDepItem> {
    resolver
        .find_package_deps(files)
        .iter()
        .map(|record| HtmlDepItem::package(config, record))
        .collect()
}
