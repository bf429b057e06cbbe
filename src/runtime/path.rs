//! Path utility functions for normalization and comparison.

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // At the root (or an empty relative path) there is nothing to pop; keep the `..`
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// # Security
/// Both paths are normalized first, so `/cache/shinylive/../../etc/passwd` is NOT
/// under `/cache/shinylive`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Number of components in a relative path after normalization.
///
/// `a` has depth 1, `a/b` has depth 2, and `.` or the empty path have depth 0.
pub fn path_depth(path: &Path) -> Result<usize> {
    if path.is_absolute() {
        bail!("path must be a relative path: {}", path.display());
    }
    Ok(normalize_path(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count())
}

/// Relative path from `base` to `path`, using `/` as the separator.
///
/// Used for bundle file names, which are always POSIX-style regardless of platform.
pub fn to_posix_relative(path: &Path, base: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(path, base)?;
    if relative.is_absolute() {
        return None;
    }
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/cache/shinylive/../other")),
            PathBuf::from("/cache/other")
        );
    }

    #[test]
    fn test_normalize_path_relative_escape_is_kept() {
        assert_eq!(
            normalize_path(Path::new("../../etc/passwd")),
            PathBuf::from("../../etc/passwd")
        );
    }

    #[test]
    fn test_normalize_path_with_dot() {
        assert_eq!(
            normalize_path(Path::new("./shinylive/./pyodide")),
            PathBuf::from("shinylive/pyodide")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_is_path_under() {
        assert!(is_path_under(
            Path::new("/cache/shinylive-0.9.1/shinylive"),
            Path::new("/cache")
        ));
        assert!(is_path_under(Path::new("/cache"), Path::new("/cache")));
        assert!(!is_path_under(Path::new("/cachex/file"), Path::new("/cache")));
        assert!(!is_path_under(
            Path::new("/cache/a/../../etc/passwd"),
            Path::new("/cache")
        ));
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth(Path::new("")).unwrap(), 0);
        assert_eq!(path_depth(Path::new(".")).unwrap(), 0);
        assert_eq!(path_depth(Path::new("a")).unwrap(), 1);
        assert_eq!(path_depth(Path::new("a/b/c")).unwrap(), 3);
        assert_eq!(path_depth(Path::new("a/./b/")).unwrap(), 2);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_path_depth_rejects_absolute() {
        assert!(path_depth(Path::new("/a/b")).is_err());
    }

    #[test]
    fn test_to_posix_relative() {
        let base = Path::new("project").join("app");
        let file = base.join("www").join("style.css");
        assert_eq!(
            to_posix_relative(&file, &base),
            Some("www/style.css".to_string())
        );
    }
}
