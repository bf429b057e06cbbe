//! The Pyodide lock file (`pyodide-lock.json`) and its derived lookup indices.
//!
//! The keys in `packages` are not always the package names. The key
//! `jsonschema-specifications` points at a record whose `name` is
//! `jsonschema_specifications`, and dependencies are listed by name. Module
//! names differ again: the `opencv-python` package provides the module `cv2`.
//! [`Manifest`] builds both indices once, when it is constructed.

mod cache;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub use cache::{ManifestCache, clear_manifest_cache, load_manifest};

/// One entry of `packages` in the lock file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PackageRecord {
    /// Lookup key in the lock file. Not part of the record on disk.
    #[serde(skip)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub file_name: String,
    #[serde(default)]
    pub install_dir: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unvendored_tests: Option<bool>,
    /// Fields this tool doesn't interpret, kept for pass-through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw contents of `pyodide-lock.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LockFile {
    #[serde(default)]
    pub info: BTreeMap<String, Value>,
    pub packages: BTreeMap<String, PackageRecord>,
}

/// An immutable lock file plus its `name -> key` and `module -> key` indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    lock: LockFile,
    name_to_key: HashMap<String, String>,
    module_to_key: HashMap<String, String>,
}

impl Manifest {
    pub fn new(mut lock: LockFile) -> Self {
        for (key, record) in lock.packages.iter_mut() {
            record.key = key.clone();
        }

        let mut name_to_key = HashMap::new();
        // Lowercased keys first, so a closure made of keys resolves to itself.
        // Canonical names take precedence on collision.
        for key in lock.packages.keys() {
            name_to_key.insert(key.to_lowercase(), key.clone());
        }
        for (key, record) in &lock.packages {
            name_to_key.insert(record.name.to_lowercase(), key.clone());
        }

        let mut module_to_key = HashMap::new();
        for (key, record) in &lock.packages {
            for module in &record.imports {
                module_to_key.insert(module.clone(), key.clone());
            }
        }

        Self {
            lock,
            name_to_key,
            module_to_key,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn get(&self, key: &str) -> Option<&PackageRecord> {
        self.lock.packages.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock.packages.contains_key(key)
    }

    /// Look up a key by lowercased package name.
    pub fn key_for_name(&self, lowercase_name: &str) -> Option<&str> {
        self.name_to_key.get(lowercase_name).map(String::as_str)
    }

    /// Look up a key by exact module name.
    pub fn key_for_module(&self, module: &str) -> Option<&str> {
        self.module_to_key.get(module).map(String::as_str)
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.lock.packages.values()
    }

    pub fn info(&self) -> &BTreeMap<String, Value> {
        &self.lock.info
    }

    pub fn len(&self) -> usize {
        self.lock.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock.packages.is_empty()
    }
}

/// Failure to read or parse a lock file. Always fatal to the calling command.
#[derive(Debug)]
pub enum LockfileError {
    Read {
        path: PathBuf,
        source: anyhow::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for LockfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockfileError::Read { path, .. } => {
                write!(f, "Could not read package lock file {}", path.display())
            }
            LockfileError::Parse { path, source } => {
                write!(
                    f,
                    "Package lock file {} is malformed: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for LockfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockfileError::Read { source, .. } => Some(&**source),
            LockfileError::Parse { source, .. } => Some(source),
        }
    }
}
