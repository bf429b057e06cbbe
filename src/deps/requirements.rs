use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9._-]+)(.*)").expect("valid package name regex"));

/// Extract the package names listed in a `requirements.txt`.
///
/// Version constraints and URL requirements are dropped, and `_` becomes `-`
/// (`typing_extensions` -> `typing-extensions`). Case is preserved. The result
/// keeps file order and may contain duplicates.
pub fn find_requirement_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Wheels at URLs can never be provided by Pyodide.
        if line.starts_with("http://") || line.starts_with("https://") {
            debug!("Ignoring URL requirement {}", line);
            continue;
        }

        // "my-package (>= 1.0.0)" -> "my-package"
        let name = PACKAGE_NAME.replace(line, "${1}");
        let name = name.trim().replace('_', "-");
        if name.is_empty() {
            continue;
        }
        names.push(name);
    }

    names
}
