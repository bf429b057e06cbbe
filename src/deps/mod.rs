//! Finding the Pyodide packages an app needs.
//!
//! Source files give module names (`import cv2`), `requirements.txt` gives
//! package names (`opencv-python`). Both are resolved against the lock file
//! and expanded to their dependency closure by [`Resolver`].

pub mod htmldep;
mod imports;
mod requirements;
mod resolver;

use std::collections::BTreeSet;

use crate::app_json::FileContent;

pub use imports::find_imports;
pub use requirements::find_requirement_names;
pub use resolver::{Resolver, dedupe_by_key};

/// Modules imported by the app's `.py` files.
pub fn find_app_imports(files: &[FileContent]) -> BTreeSet<String> {
    files
        .iter()
        .filter(|file| file.name.ends_with(".py"))
        .flat_map(|file| find_imports(&file.content))
        .collect()
}

/// Package names listed in the app's `requirements.txt`.
pub fn find_app_requirements(files: &[FileContent]) -> Vec<String> {
    files
        .iter()
        .filter(|file| file.name == "requirements.txt")
        .flat_map(|file| find_requirement_names(&file.content))
        .collect()
}
