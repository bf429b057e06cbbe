//! shinylive.io links: an app's files packed into the URL fragment.
//!
//! The bundle is a JSON array of `{name, content, type?}` objects compressed
//! with LZ-string's URI-safe encoding. Text files leave `type` out.

use anyhow::{Context, Result, bail};
use log::debug;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::app_json::{FileContent, FileKind};
use crate::runtime::path::to_posix_relative;
use crate::runtime::{Runtime, is_path_under, list_files_recursive, normalize_path};

const SHINYLIVE_BASE_URL: &str = "https://shinylive.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLanguage {
    Py,
    R,
}

impl AppLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppLanguage::Py => "py",
            AppLanguage::R => "r",
        }
    }

    /// `app.py` or `app.R`
    pub fn default_app_file(&self) -> &'static str {
        match self {
            AppLanguage::Py => "app.py",
            AppLanguage::R => "app.R",
        }
    }

    fn chunk_engine(&self) -> &'static str {
        match self {
            AppLanguage::Py => "python",
            AppLanguage::R => "r",
        }
    }
}

impl FromStr for AppLanguage {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "py" | "python" => Ok(AppLanguage::Py),
            "r" | "R" => Ok(AppLanguage::R),
            other => Err(UrlError::InvalidLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for AppLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether shinylive.io shows the editor next to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppMode {
    #[default]
    Editor,
    App,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Editor => "editor",
            AppMode::App => "app",
        }
    }
}

impl FromStr for AppMode {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editor" => Ok(AppMode::Editor),
            "app" => Ok(AppMode::App),
            other => Err(UrlError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkComponent {
    Editor,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkLayout {
    #[default]
    Horizontal,
    Vertical,
}

/// Errors from decoding a link or working out an app's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The payload is missing, doesn't decompress, or isn't JSON.
    InvalidPayload,
    NotAList,
    NotAnObject,
    MissingField,
    FieldNotString(String),
    UnknownFileType { name: String, kind: String },
    NonStringValue(String),
    LanguageNotDetected,
    InvalidLanguage(String),
    InvalidMode(String),
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlError::InvalidPayload => {
                write!(f, "Could not parse and decode the shinylive URL code payload.")
            }
            UrlError::NotAList => write!(
                f,
                "The shinylive URL was not formatted correctly: `code` did not decode to a list."
            ),
            UrlError::NotAnObject => write!(
                f,
                "Invalid shinylive URL: `code` did not decode to a list of dictionaries."
            ),
            UrlError::MissingField => write!(
                f,
                "Invalid shinylive URL: `code` included an object that was missing required fields `name` or `content`."
            ),
            UrlError::FieldNotString(key) => write!(
                f,
                "Invalid shinylive URL: encoded file bundle contains an file where `{}` was not a string.",
                key
            ),
            UrlError::UnknownFileType { name, kind } => write!(
                f,
                "Invalid shinylive URL: unexpected file type '{}' in '{}'.",
                kind, name
            ),
            UrlError::NonStringValue(name) => write!(
                f,
                "Invalid shinylive URL: not all items in '{}' were strings.",
                name
            ),
            UrlError::LanguageNotDetected => write!(
                f,
                "Could not automatically detect the language of the app. Please specify `language`."
            ),
            UrlError::InvalidLanguage(lang) => write!(
                f,
                "Invalid language '{}', must be one of 'py', 'python', 'r', 'R'.",
                lang
            ),
            UrlError::InvalidMode(mode) => write!(
                f,
                "Invalid mode '{}', must be either 'editor' or 'app'.",
                mode
            ),
        }
    }
}

impl std::error::Error for UrlError {}

static PY_SHINY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(import|from) shiny").expect("valid regex"));
static R_SHINY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^library\(shiny\)").expect("valid regex"));

/// Guess the language of an app from its code or, for a single line, its file name.
pub fn detect_app_language(app: &str) -> Result<AppLanguage, UrlError> {
    if app.contains('\n') {
        if PY_SHINY.is_match(app) {
            return Ok(AppLanguage::Py);
        }
        if R_SHINY.is_match(app) {
            return Ok(AppLanguage::R);
        }
        return Err(UrlError::LanguageNotDetected);
    }

    let extension = Path::new(app)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("py") => Ok(AppLanguage::Py),
        Some("r") => Ok(AppLanguage::R),
        _ => Err(UrlError::LanguageNotDetected),
    }
}

/// An app as shinylive.io sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShinyliveApp {
    pub bundle: Vec<FileContent>,
    pub language: AppLanguage,
    pub mode: AppMode,
    /// Only used in [`AppMode::App`].
    pub header: bool,
}

#[derive(Serialize)]
struct BundleFile<'a> {
    name: &'a str,
    content: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl ShinyliveApp {
    pub fn new(bundle: Vec<FileContent>, language: AppLanguage) -> Self {
        Self {
            bundle,
            language,
            mode: AppMode::Editor,
            header: true,
        }
    }

    pub fn with_mode(mut self, mode: AppMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// An app from the code of its main file. Extra `files` are stored under
    /// their file names only.
    pub fn from_text<R: Runtime>(
        runtime: &R,
        code: &str,
        files: &[&Path],
        language: AppLanguage,
    ) -> Result<Self> {
        let mut app = Self::new(
            vec![FileContent::text(language.default_app_file(), code)],
            language,
        );
        for file in files {
            app.add_path(runtime, file, None)?;
        }
        Ok(app)
    }

    /// An app from a main file on disk.
    ///
    /// The main file becomes `app.py` or `app.R` unless it is `ui.R` or
    /// `server.R`. Extra `files` (or the files in directories) are named
    /// relative to the main file's directory.
    #[tracing::instrument(skip(runtime))]
    pub fn from_local<R: Runtime>(
        runtime: &R,
        app_path: &Path,
        files: &[&Path],
        language: AppLanguage,
    ) -> Result<Self> {
        let root = app_path.parent().unwrap_or(Path::new(""));
        let mut main = read_file(runtime, app_path, Some(root))?;
        if main.name != "ui.R" && main.name != "server.R" {
            main.name = language.default_app_file().to_string();
        }

        let mut app = Self::new(vec![main], language);
        for file in files {
            if normalize_path(file) == normalize_path(app_path) {
                continue;
            }
            app.add_path(runtime, file, Some(root))?;
        }
        Ok(app)
    }

    fn add_path<R: Runtime>(&mut self, runtime: &R, path: &Path, root: Option<&Path>) -> Result<()> {
        if runtime.is_dir(path) {
            for rel in list_files_recursive(runtime, path)? {
                self.bundle.push(read_file(runtime, &path.join(rel), root)?);
            }
        } else {
            self.bundle.push(read_file(runtime, path, root)?);
        }
        Ok(())
    }

    /// The bundle as shinylive.io expects it.
    pub fn to_json(&self) -> Result<String> {
        let files: Vec<BundleFile> = self
            .bundle
            .iter()
            .map(|file| BundleFile {
                name: &file.name,
                content: &file.content,
                kind: match file.kind {
                    FileKind::Text => None,
                    FileKind::Binary => Some("binary"),
                },
            })
            .collect();
        serde_json::to_string(&files).context("Failed to serialize the app bundle")
    }

    pub fn to_url(&self) -> Result<String> {
        let code = lz_str::compress_to_encoded_uri_component(self.to_json()?.as_str());
        let h = if !self.header && self.mode == AppMode::App {
            "h=0&"
        } else {
            ""
        };
        Ok(format!(
            "{}/{}/{}/#{}code={}",
            SHINYLIVE_BASE_URL, self.language, self.mode, h, code
        ))
    }

    /// The body of a Quarto shinylive block: each file preceded by `## file:` markers.
    pub fn to_chunk_contents(&self) -> String {
        let mut lines = Vec::new();
        for file in &self.bundle {
            lines.push(format!("## file: {}", file.name));
            if file.kind == FileKind::Binary {
                lines.push("## type: binary".to_string());
            }
            lines.push(file.content.clone());
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// A complete Quarto `{shinylive-python}` or `{shinylive-r}` block.
    pub fn to_chunk(
        &self,
        components: &[ChunkComponent],
        layout: ChunkLayout,
        viewer_height: u32,
    ) -> String {
        let components = components
            .iter()
            .map(|c| match c {
                ChunkComponent::Editor => "editor",
                ChunkComponent::Viewer => "viewer",
            })
            .collect::<Vec<_>>()
            .join(", ");
        let layout = match layout {
            ChunkLayout::Horizontal => "horizontal",
            ChunkLayout::Vertical => "vertical",
        };
        format!(
            "\n```{{shinylive-{}}}\n#| standalone: true\n#| components: [{}]\n#| layout: {}\n#| viewerHeight: {}\n{}\n```\n",
            self.language.chunk_engine(),
            components,
            layout,
            viewer_height,
            self.to_chunk_contents()
        )
    }

    /// Write the bundle's files under `dir`, which is created if needed.
    ///
    /// File names that would land outside `dir` are refused.
    #[tracing::instrument(skip(self, runtime))]
    pub fn write_files<R: Runtime>(&self, runtime: &R, dir: &Path) -> Result<()> {
        runtime.create_dir_all(dir)?;
        for file in &self.bundle {
            let rel = normalize_path(Path::new(&file.name));
            let dest = normalize_path(&dir.join(&rel));
            if rel.has_root() || !is_path_under(&dest, &normalize_path(dir)) {
                bail!("Refusing to write {} outside of {}", file.name, dir.display());
            }
            if let Some(parent) = dest.parent() {
                runtime.create_dir_all(parent)?;
            }
            runtime
                .write(&dest, &file.to_bytes()?)
                .with_context(|| format!("Failed to write {:?}", dest))?;
            debug!("Wrote {:?}", dest);
        }
        Ok(())
    }
}

/// Turn a shinylive.io link back into an app.
pub fn url_decode(url: &str) -> Result<ShinyliveApp, UrlError> {
    let url = url.trim();
    let language = if url.contains("shinylive.io/r/") {
        AppLanguage::R
    } else {
        AppLanguage::Py
    };

    let payload = url.split("code=").nth(1).ok_or(UrlError::InvalidPayload)?;
    let wide = lz_str::decompress_from_encoded_uri_component(payload).ok_or(UrlError::InvalidPayload)?;
    let json = String::from_utf16(&wide).map_err(|_| UrlError::InvalidPayload)?;
    let bundle: Value = serde_json::from_str(&json).map_err(|_| UrlError::InvalidPayload)?;

    let Value::Array(entries) = bundle else {
        return Err(UrlError::NotAList);
    };
    let files = entries
        .iter()
        .map(bundle_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let mode = if url.contains(&format!("{}/app/", language)) {
        AppMode::App
    } else {
        AppMode::Editor
    };
    Ok(ShinyliveApp::new(files, language)
        .with_mode(mode)
        .with_header(!url.contains("h=0")))
}

fn bundle_entry(entry: &Value) -> Result<FileContent, UrlError> {
    let Value::Object(map) = entry else {
        return Err(UrlError::NotAnObject);
    };
    if !map.contains_key("name") || !map.contains_key("content") {
        return Err(UrlError::MissingField);
    }
    let string_field = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| UrlError::FieldNotString(key.to_string()))
    };
    let name = string_field("name")?;
    let content = string_field("content")?;

    let kind = match map.get("type") {
        None => FileKind::Text,
        Some(Value::String(kind)) if kind == "text" => FileKind::Text,
        Some(Value::String(kind)) if kind == "binary" => FileKind::Binary,
        Some(other) => {
            return Err(UrlError::UnknownFileType {
                name: name.to_string(),
                kind: other.as_str().map_or_else(|| other.to_string(), str::to_string),
            });
        }
    };
    if !map.values().all(Value::is_string) {
        return Err(UrlError::NonStringValue(name.to_string()));
    }

    Ok(FileContent {
        name: name.to_string(),
        content: content.to_string(),
        kind,
    })
}

/// Read a file as text, or as base64 when it isn't UTF-8. Named relative to
/// `root`, or by its file name alone.
fn read_file<R: Runtime>(runtime: &R, path: &Path, root: Option<&Path>) -> Result<FileContent> {
    let bytes = runtime
        .read(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let name = match root {
        Some(root) => to_posix_relative(path, root),
        None => None,
    };
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {:?}", path))?,
    };
    Ok(FileContent::from_bytes(name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    const PY_EDITOR: &str = "https://shinylive.io/py/editor/#code=NobwRAdghgtgpmAXGKAHVA6VBPMAaMAYwHsIAXOcpMAMwCdiYACAZwAsBLCbJjmVYnTJMAgujxM6lACZw6EgK4cAOhDABfALpA5g";
    const PY_APP: &str = "https://shinylive.io/py/app/#code=NobwRAdghgtgpmAXGKAHVA6VBPMAaMAYwHsIAXOcpMAMwCdiYACAZwAsBLCbJjmVYnTJMAgujxM6lACZw6EgK4cAOhDABfALpA";
    const PY_APP_NO_HEADER: &str = "https://shinylive.io/py/app/#h=0&code=NobwRAdghgtgpmAXGKAHVA6VBPMAaMAYwHsIAXOcpMAMwCdiYACAZwAsBLCbJjmVYnTJMAgujxM6lACZw6EgK4cAOhDABfALpA";
    const R_EDITOR: &str = "https://shinylive.io/r/editor/#code=NobwRAdghgtgpmAXGKAHVA6ASmANGAYwHsIAXOMpMAGwEsAjAJykYE8AKAZwAtaJWAlAB0IYAL4BdIA";
    const R_APP: &str = "https://shinylive.io/r/app/#code=NobwRAdghgtgpmAXGKAHVA6ASmANGAYwHsIAXOMpMAGwEsAjAJykYE8AKAZwAtaJWAlAB0IYAL4BdIA";
    const R_APP_NO_HEADER: &str = "https://shinylive.io/r/app/#h=0&code=NobwRAdghgtgpmAXGKAHVA6ASmANGAYwHsIAXOMpMAGwEsAjAJykYE8AKAZwAtaJWAlAB0IYAL4BdIA";

    fn encode(bundle: &str) -> String {
        format!(
            "https://shinylive.io/py/editor/#code={}",
            lz_str::compress_to_encoded_uri_component(bundle)
        )
    }

    #[test]
    fn test_decode_py_links() {
        for (url, mode, header) in [
            (PY_EDITOR, AppMode::Editor, true),
            (PY_APP, AppMode::App, true),
            (PY_APP_NO_HEADER, AppMode::App, false),
        ] {
            let app = url_decode(url).unwrap();
            assert_eq!(app.language, AppLanguage::Py);
            assert_eq!(app.mode, mode);
            assert_eq!(app.header, header);
            assert_eq!(app.bundle[0].name, "app.py");
            assert!(app.bundle[0].content.contains("from shiny import"));
            assert_eq!(app.bundle[0].kind, FileKind::Text);
        }
    }

    #[test]
    fn test_decode_r_links() {
        for (url, mode, header) in [
            (R_EDITOR, AppMode::Editor, true),
            (R_APP, AppMode::App, true),
            (R_APP_NO_HEADER, AppMode::App, false),
        ] {
            let app = url_decode(url).unwrap();
            assert_eq!(app.language, AppLanguage::R);
            assert_eq!(app.mode, mode);
            assert_eq!(app.header, header);
            assert_eq!(app.bundle[0].name, "app.R");
            assert!(app.bundle[0].content.contains("library(shiny)"));
        }
    }

    #[test]
    fn test_encode_py_text() {
        let code = "from shiny.express import ui\nui.div()";
        let language = detect_app_language(code).unwrap();
        let app = ShinyliveApp::from_text(&RealRuntime, code, &[], language).unwrap();

        assert_eq!(app.language, AppLanguage::Py);
        assert_eq!(app.bundle, vec![FileContent::text("app.py", code)]);
        assert_eq!(app.to_json().unwrap(), format!(r#"[{{"name":"app.py","content":{:?}}}]"#, code));
        assert!(app.to_chunk_contents().contains("## file: app.py"));
        assert!(app.to_chunk_contents().contains(code));

        let url = app.to_url().unwrap();
        assert!(url.starts_with("https://shinylive.io/py/editor/#code="));
        assert_eq!(url_decode(&url).unwrap(), app);
    }

    #[test]
    fn test_encode_r_text() {
        let code = "library(shiny)\n\nshinyApp(pageFluid(), function(...) { })";
        let language = detect_app_language(code).unwrap();
        let app = ShinyliveApp::from_text(&RealRuntime, code, &[], language).unwrap();

        assert_eq!(app.language, AppLanguage::R);
        assert_eq!(app.bundle[0].name, "app.R");
        assert_eq!(
            app.to_chunk_contents(),
            format!("## file: app.R\n{}\n", code)
        );
    }

    #[test]
    fn test_url_header_only_hidden_in_app_mode() {
        let app = ShinyliveApp::new(vec![FileContent::text("app.py", "x")], AppLanguage::Py)
            .with_header(false);
        assert!(app.to_url().unwrap().starts_with("https://shinylive.io/py/editor/#code="));

        let app = app.with_mode(AppMode::App);
        let url = app.to_url().unwrap();
        assert!(url.starts_with("https://shinylive.io/py/app/#h=0&code="));
        let decoded = url_decode(&url).unwrap();
        assert_eq!(decoded.mode, AppMode::App);
        assert!(!decoded.header);
    }

    #[test]
    fn test_detect_app_language() {
        assert_eq!(detect_app_language("app.py"), Ok(AppLanguage::Py));
        assert_eq!(detect_app_language("dir/app.R"), Ok(AppLanguage::R));
        assert_eq!(detect_app_language("server.r"), Ok(AppLanguage::R));
        assert_eq!(
            detect_app_language("import shiny\nApp()"),
            Ok(AppLanguage::Py)
        );
        assert_eq!(
            detect_app_language("x <- 1\nlibrary(shiny)\n"),
            Ok(AppLanguage::R)
        );
        assert_eq!(
            detect_app_language("print(1)\nprint(2)"),
            Err(UrlError::LanguageNotDetected)
        );
        assert_eq!(detect_app_language("README.md"), Err(UrlError::LanguageNotDetected));
    }

    #[test]
    fn test_language_and_mode_from_str() {
        assert_eq!("python".parse::<AppLanguage>(), Ok(AppLanguage::Py));
        assert_eq!("R".parse::<AppLanguage>(), Ok(AppLanguage::R));
        assert!("julia".parse::<AppLanguage>().is_err());
        assert_eq!("app".parse::<AppMode>(), Ok(AppMode::App));
        assert!("viewer".parse::<AppMode>().is_err());
    }

    #[test]
    fn test_decode_rejects_malformed_bundles() {
        assert_eq!(
            url_decode("https://shinylive.io/py/editor/"),
            Err(UrlError::InvalidPayload)
        );
        assert_eq!(url_decode(&encode(r#"{"name":"a"}"#)), Err(UrlError::NotAList));
        assert_eq!(url_decode(&encode(r#"["a"]"#)), Err(UrlError::NotAnObject));
        assert_eq!(
            url_decode(&encode(r#"[{"name":"app.py"}]"#)),
            Err(UrlError::MissingField)
        );
        assert_eq!(
            url_decode(&encode(r#"[{"name":1,"content":"x"}]"#)),
            Err(UrlError::FieldNotString("name".to_string()))
        );
        assert_eq!(
            url_decode(&encode(r#"[{"name":"a.png","content":"x","type":"image"}]"#)),
            Err(UrlError::UnknownFileType {
                name: "a.png".to_string(),
                kind: "image".to_string()
            })
        );
        assert_eq!(
            url_decode(&encode(r#"[{"name":"a.py","content":"x","size":3}]"#)),
            Err(UrlError::NonStringValue("a.py".to_string()))
        );
    }

    #[test]
    fn test_binary_files_keep_their_type() {
        let app = ShinyliveApp::new(
            vec![
                FileContent::text("app.py", "import shiny"),
                FileContent::binary("logo.png", &[0x89, 0x50, 0x4e, 0x47, 0xff]),
            ],
            AppLanguage::Py,
        );
        let json = app.to_json().unwrap();
        assert!(json.contains(r#""type":"binary""#));
        assert_eq!(json.matches("\"type\"").count(), 1);
        assert!(app.to_chunk_contents().contains("## file: logo.png\n## type: binary\n"));

        let decoded = url_decode(&app.to_url().unwrap()).unwrap();
        assert_eq!(decoded.bundle[1].kind, FileKind::Binary);
        assert_eq!(decoded.bundle[1].to_bytes().unwrap(), vec![0x89, 0x50, 0x4e, 0x47, 0xff]);
    }

    #[test]
    fn test_from_local_names_files_relative_to_app() {
        let dir = tempdir().unwrap();
        let app_dir = dir.path().join("myapp");
        fs::create_dir_all(app_dir.join("www/img")).unwrap();
        fs::write(app_dir.join("main.py"), "from shiny import App\n").unwrap();
        fs::write(app_dir.join("utils.py"), "X = 1\n").unwrap();
        fs::write(app_dir.join("www/style.css"), "body {}").unwrap();
        fs::write(app_dir.join("www/img/logo.png"), [0xffu8, 0xfe, 0x00]).unwrap();

        let app_path = app_dir.join("main.py");
        let utils = app_dir.join("utils.py");
        let www = app_dir.join("www");
        let app = ShinyliveApp::from_local(
            &RealRuntime,
            &app_path,
            &[app_path.as_path(), utils.as_path(), www.as_path()],
            AppLanguage::Py,
        )
        .unwrap();

        let names: Vec<&str> = app.bundle.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["app.py", "utils.py", "www/img/logo.png", "www/style.css"]);
        assert_eq!(app.bundle[2].kind, FileKind::Binary);
    }

    #[test]
    fn test_from_local_keeps_ui_r_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ui.R"), "library(shiny)\nfluidPage()").unwrap();

        let app =
            ShinyliveApp::from_local(&RealRuntime, &dir.path().join("ui.R"), &[], AppLanguage::R)
                .unwrap();
        assert_eq!(app.bundle[0].name, "ui.R");
    }

    #[test]
    fn test_from_text_flattens_extra_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        let data = dir.path().join("data/values.csv");
        fs::write(&data, "a,b\n1,2\n").unwrap();

        let app = ShinyliveApp::from_text(
            &RealRuntime,
            "from shiny import App\n",
            &[data.as_path()],
            AppLanguage::Py,
        )
        .unwrap();
        assert_eq!(app.bundle[1].name, "values.csv");
    }

    #[test]
    fn test_to_chunk() {
        let app = ShinyliveApp::new(vec![FileContent::text("app.py", "import shiny")], AppLanguage::Py);
        let chunk = app.to_chunk(
            &[ChunkComponent::Editor, ChunkComponent::Viewer],
            ChunkLayout::Vertical,
            300,
        );
        assert_eq!(
            chunk,
            "\n```{shinylive-python}\n#| standalone: true\n#| components: [editor, viewer]\n#| layout: vertical\n#| viewerHeight: 300\n## file: app.py\nimport shiny\n\n```\n"
        );
    }

    #[test]
    fn test_write_files() {
        let dir = tempdir().unwrap();
        let app = ShinyliveApp::new(
            vec![
                FileContent::text("app.py", "import shiny"),
                FileContent::text("www/style.css", "body {}"),
                FileContent::binary("data.bin", &[0, 1, 2]),
            ],
            AppLanguage::Py,
        );

        app.write_files(&RealRuntime, &dir.path().join("out")).unwrap();

        let out = dir.path().join("out");
        assert_eq!(fs::read_to_string(out.join("app.py")).unwrap(), "import shiny");
        assert_eq!(fs::read_to_string(out.join("www/style.css")).unwrap(), "body {}");
        assert_eq!(fs::read(out.join("data.bin")).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_write_files_refuses_escaping_names() {
        let dir = tempdir().unwrap();
        let app = ShinyliveApp::new(
            vec![FileContent::text("../evil.py", "x")],
            AppLanguage::Py,
        );

        assert!(app.write_files(&RealRuntime, &dir.path().join("out")).is_err());
        assert!(!dir.path().join("evil.py").exists());
    }
}
