//! Process-wide cache of parsed lock files.
//!
//! A lock file is read once per absolute path; later changes on disk are not
//! picked up until the process restarts or the cache is cleared.

use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use super::{LockFile, LockfileError, Manifest};
use crate::runtime::{Runtime, absolute};

/// Cache of manifests keyed by absolute lock file path. First read wins.
#[derive(Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<PathBuf, Arc<Manifest>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn load<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<Arc<Manifest>, LockfileError> {
        let key = absolute(runtime, path);

        if let Some(manifest) = self.lock().get(&key) {
            debug!("Using cached package lock file {:?}", key);
            return Ok(Arc::clone(manifest));
        }

        debug!("Reading package lock file {:?}", key);
        let content = runtime
            .read_to_string(&key)
            .map_err(|source| LockfileError::Read {
                path: key.clone(),
                source,
            })?;
        let lock: LockFile =
            serde_json::from_str(&content).map_err(|source| LockfileError::Parse {
                path: key.clone(),
                source,
            })?;
        let manifest = Arc::new(Manifest::new(lock));
        debug!("Loaded {} packages from {:?}", manifest.len(), key);

        let mut entries = self.lock();
        Ok(Arc::clone(entries.entry(key).or_insert(manifest)))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<Manifest>>> {
        // The map holds only fully built entries, so a poisoned lock is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn global() -> &'static ManifestCache {
    static CACHE: OnceLock<ManifestCache> = OnceLock::new();
    CACHE.get_or_init(ManifestCache::new)
}

/// Load a lock file through the process-wide cache.
pub fn load_manifest<R: Runtime>(runtime: &R, path: &Path) -> Result<Arc<Manifest>, LockfileError> {
    global().load(runtime, path)
}

/// Forget every cached lock file.
pub fn clear_manifest_cache() {
    global().clear();
}
