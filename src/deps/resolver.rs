use anyhow::Result;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, OnceLock};

use crate::app_json::FileContent;
use crate::config::Config;
use crate::lockfile::{Manifest, PackageRecord, load_manifest};
use crate::runtime::Runtime;

use super::{find_app_imports, find_app_requirements};

/// Resolves package names, module names and dependency closures against one manifest.
pub struct Resolver {
    manifest: Arc<Manifest>,
    base_names: BTreeSet<String>,
    base_closure: OnceLock<Vec<String>>,
}

impl Resolver {
    pub fn new(manifest: Arc<Manifest>, base_names: BTreeSet<String>) -> Self {
        Self {
            manifest,
            base_names,
            base_closure: OnceLock::new(),
        }
    }

    /// Load the lock file of the configured assets version.
    #[tracing::instrument(skip(runtime, config))]
    pub fn from_config<R: Runtime>(runtime: &R, config: &Config) -> Result<Self> {
        let manifest = load_manifest(runtime, &config.lockfile_path())?;
        Ok(Self::new(manifest, config.base_packages.clone()))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Map a package name to its key in the lock file.
    ///
    /// Base package names are returned unchanged. Other names are matched
    /// case-insensitively against record names (and keys).
    pub fn resolve_to_key(&self, name: &str) -> Option<String> {
        if self.base_names.contains(name) {
            return Some(name.to_string());
        }
        self.manifest
            .key_for_name(&name.to_lowercase())
            .map(str::to_string)
    }

    /// Map an importable module name (`cv2`) to the key of the package providing it.
    ///
    /// Case-sensitive.
    pub fn resolve_module_to_key(&self, module: &str) -> Option<String> {
        self.manifest.key_for_module(module).map(str::to_string)
    }

    /// Expand `seed` to include every transitive dependency declared in the lock file.
    ///
    /// Names that don't resolve are dropped with a warning; they are assumed to
    /// be part of base Pyodide or installed from elsewhere. The result holds
    /// keys in discovery order without duplicates.
    pub fn resolve_closure<I, S>(&self, seed: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frontier: Vec<String> = seed.into_iter().map(Into::into).collect();
        let mut seen: HashSet<String> = frontier.iter().cloned().collect();
        let mut keys = Vec::with_capacity(frontier.len());

        let mut i = 0;
        while i < frontier.len() {
            let name = &frontier[i];
            let Some(key) = self.resolve_to_key(name) else {
                if !self.base_names.contains(name) {
                    warn!(
                        "{} not in pyodide-lock.json. Assuming it is in base Pyodide or in requirements.txt.",
                        name
                    );
                }
                frontier.remove(i);
                continue;
            };

            let new: Vec<String> = match self.manifest.get(&key) {
                Some(record) => record
                    .depends
                    .iter()
                    .filter(|dep| !seen.contains(dep.as_str()))
                    .cloned()
                    .collect(),
                None => {
                    debug!("Base package {} has no entry in pyodide-lock.json", key);
                    Vec::new()
                }
            };
            for dep in new {
                seen.insert(dep.clone());
                frontier.push(dep);
            }

            keys.push(key);
            i += 1;
        }

        let mut unique = HashSet::new();
        keys.retain(|key| unique.insert(key.clone()));
        keys
    }

    /// Closure of the base package set. Computed once per resolver.
    pub fn base_closure(&self) -> &[String] {
        self.base_closure
            .get_or_init(|| self.resolve_closure(self.base_names.iter().cloned()))
    }

    /// Records for the base closure.
    pub fn base_packages(&self) -> Vec<PackageRecord> {
        self.records_for(self.base_closure())
    }

    /// Records for the packages an app needs, not including the base set.
    ///
    /// The seed is the union of the modules imported by `.py` files (mapped to
    /// package keys) and the names listed in `requirements.txt`.
    #[tracing::instrument(skip_all)]
    pub fn find_package_deps(&self, files: &[FileContent]) -> Vec<PackageRecord> {
        let mut seed: BTreeSet<String> = find_app_imports(files)
            .iter()
            .filter_map(|module| self.resolve_module_to_key(module))
            .collect();
        seed.extend(find_app_requirements(files));

        info!(
            "Imports detected in app: {}",
            seed.iter().cloned().collect::<Vec<_>>().join(", ")
        );

        let closure = self.resolve_closure(seed);
        self.records_for(&closure)
    }

    /// Look up the records for a list of keys, skipping keys with no record.
    pub fn records_for(&self, keys: &[String]) -> Vec<PackageRecord> {
        keys.iter()
            .filter_map(|key| self.manifest.get(key).cloned())
            .collect()
    }
}

/// Drop records whose key already occurred earlier.
pub fn dedupe_by_key<I>(records: I) -> Vec<PackageRecord>
where
    I: IntoIterator<Item = PackageRecord>,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.key.clone()))
        .collect()
}
