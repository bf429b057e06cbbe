//! An app's files as stored in `app.json`, and writing the exported app directory.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::runtime::path::path_depth;
use crate::runtime::{Runtime, absolute, is_path_under, list_files_recursive};

/// Directory names never read into an app bundle.
const EXCLUDED_NAMES: &[&str] = &["__pycache__", "venv", ".venv"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    Text,
    Binary,
}

/// One file of an app. Binary content is base64-encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileContent {
    pub name: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
}

impl FileContent {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            kind: FileKind::Text,
        }
    }

    pub fn binary(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            content: STANDARD.encode(bytes),
            kind: FileKind::Binary,
        }
    }

    /// Text files are stored as UTF-8, anything else as base64.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::text(name, text),
            Err(err) => Self::binary(name, err.as_bytes()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self.kind {
            FileKind::Text => Ok(self.content.clone().into_bytes()),
            FileKind::Binary => STANDARD
                .decode(&self.content)
                .with_context(|| format!("Invalid base64 content in {}", self.name)),
        }
    }
}

/// An app ready to be written to an export directory.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub appdir: PathBuf,
    pub subdir: PathBuf,
    pub files: Vec<FileContent>,
}

/// Read every file of the app at `appdir`.
///
/// Dotfiles, `__pycache__` and virtualenvs are skipped, as is `destdir` when
/// it lives inside the app. Files are sorted by name within each directory,
/// with `app.py` first, and precede the contents of subdirectories.
#[tracing::instrument(skip(runtime))]
pub fn read_app_files<R: Runtime>(
    runtime: &R,
    appdir: &Path,
    destdir: &Path,
) -> Result<Vec<FileContent>> {
    let destdir = absolute(runtime, destdir);
    let mut app_files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel_dir) = pending.pop() {
        let dir = appdir.join(&rel_dir);
        if is_path_under(&absolute(runtime, &dir), &destdir) {
            debug!("Skipping export directory {:?}", dir);
            continue;
        }

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in runtime
            .read_dir(&dir)
            .with_context(|| format!("Failed to read app directory {:?}", dir))?
        {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || EXCLUDED_NAMES.contains(&name) {
                continue;
            }
            if runtime.is_dir(&entry) {
                if !runtime.is_symlink(&entry) {
                    subdirs.push(rel_dir.join(name));
                }
            } else {
                files.push(name.to_string());
            }
        }

        files.sort();
        if let Some(idx) = files.iter().position(|f| f == "app.py") {
            let app_py = files.remove(idx);
            files.insert(0, app_py);
        }

        for filename in files {
            if filename == "shinylive.js" {
                eprintln!(
                    "Warning: Found shinylive.js in source directory '{}'. Are you including a shinylive distribution in your app?",
                    dir.display()
                );
            }
            let rel_path = rel_dir.join(&filename);
            let bytes = runtime.read(&appdir.join(&rel_path))?;
            app_files.push(FileContent::from_bytes(posix_name(&rel_path), bytes));
        }

        // Reversed so the stack yields subdirectories in sorted order.
        subdirs.sort();
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(app_files)
}

fn posix_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `app.json` and the HTML templates for an app into `<destdir>/<subdir>`.
///
/// `.html` templates get `{{ key }}` / `{{{ key }}}` placeholders filled from
/// `title` (default "Shiny App"), the user's `template_params`, and the forced
/// `REL_PATH` and `APP_ENGINE` values.
#[tracing::instrument(skip(runtime, app_info, template_params))]
pub fn write_app_json<R: Runtime>(
    runtime: &R,
    app_info: &AppInfo,
    destdir: &Path,
    template_dir: &Path,
    template_params: &Map<String, Value>,
) -> Result<()> {
    let app_destdir = destdir.join(&app_info.subdir);
    // For a subdir like a/b/c this is ../../../
    let rel_path = "../".repeat(path_depth(&app_info.subdir)?);

    runtime.create_dir_all(&app_destdir)?;

    let mut replacements = BTreeMap::new();
    replacements.insert("title".to_string(), "Shiny App".to_string());
    for (key, value) in template_params {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        replacements.insert(key.clone(), value);
    }
    replacements.insert("REL_PATH".to_string(), rel_path);
    replacements.insert("APP_ENGINE".to_string(), "python".to_string());

    let html = glob::Pattern::new("*.html")?;
    for rel_file in list_files_recursive(runtime, template_dir)? {
        let src = template_dir.join(&rel_file);
        let dest = app_destdir.join(&rel_file);
        if let Some(parent) = dest.parent() {
            runtime.create_dir_all(parent)?;
        }

        if html.matches_path(&rel_file) {
            let content = runtime.read_to_string(&src)?;
            runtime.write(&dest, substitute(&content, &replacements).as_bytes())?;
        } else {
            runtime.copy(&src, &dest)?;
        }
    }

    let app_json = app_destdir.join("app.json");
    let json = serde_json::to_vec(&app_info.files).context("Failed to serialize app.json")?;
    runtime.write(&app_json, &json)?;
    eprintln!("Writing {}: {} bytes", app_json.display(), json.len());
    info!("Wrote {} app files to {:?}", app_info.files.len(), app_json);

    Ok(())
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}\}|\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("valid placeholder regex")
});

/// Fill `{{ key }}` and `{{{ key }}}` placeholders. Unknown keys are left as-is.
fn substitute(template: &str, replacements: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            match replacements.get(key) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[FileContent]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_file_kind_defaults_to_text() {
        let file: FileContent =
            serde_json::from_str(r#"{"name": "app.py", "content": "x = 1"}"#).unwrap();
        assert_eq!(file.kind, FileKind::Text);

        let json = serde_json::to_value(FileContent::binary("a.bin", &[0xff])).unwrap();
        assert_eq!(json["type"], "binary");
        assert_eq!(json["content"], "/w==");
    }

    #[test]
    fn test_from_bytes_detects_binary() {
        assert_eq!(FileContent::from_bytes("a.txt", b"hi".to_vec()).kind, FileKind::Text);

        let file = FileContent::from_bytes("img.png", vec![0x89, 0x50, 0xff, 0x00]);
        assert_eq!(file.kind, FileKind::Binary);
        assert_eq!(file.to_bytes().unwrap(), vec![0x89, 0x50, 0xff, 0x00]);
    }

    #[test]
    fn test_read_app_files_order_and_exclusions() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("myapp");
        fs::create_dir_all(app.join("www/img")).unwrap();
        fs::create_dir_all(app.join("__pycache__")).unwrap();
        fs::create_dir_all(app.join(".git")).unwrap();
        fs::create_dir_all(app.join("site/shinylive")).unwrap();
        fs::write(app.join("utils.py"), "import numpy").unwrap();
        fs::write(app.join("app.py"), "from shiny import App").unwrap();
        fs::write(app.join("README.md"), "# app").unwrap();
        fs::write(app.join(".env"), "SECRET=1").unwrap();
        fs::write(app.join("__pycache__/app.cpython-311.pyc"), [0u8, 1]).unwrap();
        fs::write(app.join(".git/HEAD"), "ref").unwrap();
        fs::write(app.join("www/style.css"), "body {}").unwrap();
        fs::write(app.join("www/img/logo.png"), [0x89u8, 0xff, 0x00]).unwrap();
        fs::write(app.join("site/shinylive/shinylive.js"), "").unwrap();

        let files = read_app_files(&RealRuntime, &app, &app.join("site")).unwrap();

        assert_eq!(
            names(&files),
            vec![
                "app.py",
                "README.md",
                "utils.py",
                "www/style.css",
                "www/img/logo.png",
            ]
        );
        assert_eq!(files[4].kind, FileKind::Binary);
        assert_eq!(files[0].content, "from shiny import App");
    }

    #[test]
    fn test_substitute() {
        let mut replacements = BTreeMap::new();
        replacements.insert("title".to_string(), "My App".to_string());
        replacements.insert("REL_PATH".to_string(), "../".to_string());

        assert_eq!(
            substitute(
                "<title>{{ title }}</title><script src=\"{{{REL_PATH}}}x.js\"></script>{{ other }}",
                &replacements
            ),
            "<title>My App</title><script src=\"../x.js\"></script>{{ other }}"
        );
    }

    #[test]
    fn test_write_app_json() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("export_template");
        fs::create_dir_all(template.join("edit")).unwrap();
        fs::write(
            template.join("index.html"),
            "<title>{{ title }}</title>{{REL_PATH}}|{{ APP_ENGINE }}|{{ theme }}",
        )
        .unwrap();
        fs::write(template.join("edit/index.html"), "{{ REL_PATH }}").unwrap();
        fs::write(template.join("edit/logo.svg"), "{{ title }}").unwrap();

        let dest = dir.path().join("site");
        let app_info = AppInfo {
            appdir: dir.path().join("app"),
            subdir: PathBuf::from("apps/one"),
            files: vec![FileContent::text("app.py", "print(1)")],
        };
        let mut params = Map::new();
        params.insert("theme".to_string(), Value::from("dark"));
        params.insert("REL_PATH".to_string(), Value::from("ignored"));

        write_app_json(&RealRuntime, &app_info, &dest, &template, &params).unwrap();

        let app_dir = dest.join("apps/one");
        assert_eq!(
            fs::read_to_string(app_dir.join("index.html")).unwrap(),
            "<title>Shiny App</title>../../|python|dark"
        );
        assert_eq!(
            fs::read_to_string(app_dir.join("edit/index.html")).unwrap(),
            "../../"
        );
        assert_eq!(
            fs::read_to_string(app_dir.join("edit/logo.svg")).unwrap(),
            "{{ title }}"
        );

        let files: Vec<FileContent> =
            serde_json::from_str(&fs::read_to_string(app_dir.join("app.json")).unwrap()).unwrap();
        assert_eq!(files, app_info.files);
    }
}
