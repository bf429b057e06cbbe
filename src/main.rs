use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Value, json};
use std::io::Read;
use std::path::{Path, PathBuf};

use shinylive::app_json::FileContent;
use shinylive::assets;
use shinylive::config::{
    BASE_PACKAGES_ENV, CACHE_DIR_ENV, Config, SHINYLIVE_ASSETS_VERSION, SHINYLIVE_PACKAGE_VERSION,
    parse_package_list,
};
use shinylive::deps::Resolver;
use shinylive::deps::htmldep;
use shinylive::export::{ExportOptions, export};
use shinylive::http::build_http_client;
use shinylive::runtime::{RealRuntime, Runtime};
use shinylive::url::{AppLanguage, AppMode, ShinyliveApp, detect_app_language, url_decode};

/// shinylive - Shiny apps that run entirely in the browser
///
/// Export Shiny for Python apps as static sites, manage the local copy of the
/// Shinylive web assets, and create or decode shinylive.io links.
#[derive(Parser, Debug)]
#[command(author, version = SHINYLIVE_PACKAGE_VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print debugging information
    #[arg(long, global = true)]
    verbose: bool,

    /// Directory holding the cached web assets
    #[arg(long = "cache-dir", env = CACHE_DIR_ENV, value_name = "PATH", global = true)]
    cache_dir: Option<PathBuf>,

    /// Comma-separated packages included in every deployment
    #[arg(long = "base-packages", env = BASE_PACKAGES_ENV, value_name = "NAMES", global = true)]
    base_packages: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Turn a Shiny app into a bundle that can be deployed to a static web host
    ///
    /// Files in venv/ and files starting with '.' are left out. Serve the
    /// result locally with:
    ///   python3 -m http.server --directory DESTDIR --bind localhost 8008
    Export(ExportArgs),

    /// Manage the local copy of the Shinylive web assets
    Assets {
        #[command(subcommand)]
        command: AssetsCommand,
    },

    /// Integration with the Quarto shinylive extension
    Extension {
        #[command(subcommand)]
        command: ExtensionCommand,
    },

    /// Create or decode a shinylive.io URL
    Url {
        #[command(subcommand)]
        command: UrlCommand,
    },
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    /// Directory containing the Shiny application
    appdir: PathBuf,

    /// Destination directory for the static site
    destdir: PathBuf,

    /// Subdir in which to put the app
    #[arg(long)]
    subdir: Option<PathBuf>,

    /// Include every Pyodide package, not only the ones the app needs
    #[arg(long)]
    full_shinylive: bool,

    /// A JSON object, or a path to a JSON file, with template parameters
    #[arg(long, value_name = "JSON|FILE")]
    template_params: Option<String>,

    /// Directory with the templates for the exported files
    #[arg(long, value_name = "PATH")]
    template_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct DirArg {
    /// Assets directory, if not the default
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum AssetsCommand {
    /// Print information about the local assets
    Info(DirArg),

    /// Download the assets of a version
    Download {
        /// Version to download
        #[arg(long, default_value = SHINYLIVE_ASSETS_VERSION)]
        version: String,

        /// URL to download from; overrides --version
        #[arg(long)]
        url: Option<String>,

        #[command(flatten)]
        dir: DirArg,
    },

    /// Remove every local version except the one in use
    Cleanup(DirArg),

    /// Remove one local version
    Remove {
        version: String,

        #[command(flatten)]
        dir: DirArg,
    },

    /// Copy assets from a local shinylive build directory
    InstallFromLocal {
        /// The build directory, e.g. ./build of a shinylive checkout
        build: PathBuf,

        /// Version of the assets being copied
        #[arg(long, default_value = SHINYLIVE_ASSETS_VERSION)]
        version: String,

        #[command(flatten)]
        dir: DirArg,
    },

    /// Symlink assets from a local shinylive build directory
    LinkFromLocal {
        /// The build directory, e.g. ./build of a shinylive checkout
        build: PathBuf,

        /// Version of the assets being linked
        #[arg(long, default_value = SHINYLIVE_ASSETS_VERSION)]
        version: String,

        #[command(flatten)]
        dir: DirArg,
    },

    /// Print the assets version this tool uses
    Version,
}

#[derive(clap::Subcommand, Debug)]
enum ExtensionCommand {
    /// Print the tool version, assets version and script locations
    Info,

    /// Print the HTML dependencies for language-agnostic assets
    BaseHtmldeps {
        /// Directory of shinylive-sw.js, relative to the output directory
        #[arg(long)]
        sw_dir: Option<String>,
    },

    /// Print the Pyodide and Pyright resources
    LanguageResources,

    /// Print the package resources an app needs
    AppResources {
        /// JSON array of {name, content, type} objects; read from stdin if absent
        #[arg(long, value_name = "FILE")]
        json_file: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum UrlCommand {
    /// Create a shinylive.io URL from local files
    Encode {
        /// The main app file, or - to read its code from stdin
        #[arg(default_value = "-")]
        app: String,

        /// Extra files or directories
        files: Vec<PathBuf>,

        /// Show the editor, or only the app
        #[arg(short, long, default_value = "editor")]
        mode: AppMode,

        /// Language of the app: py, python, r or R. Detected when absent
        #[arg(short, long)]
        language: Option<AppLanguage>,

        /// Print the bundle as JSON
        #[arg(long)]
        json: bool,

        /// Hide the Shinylive header
        #[arg(long)]
        no_header: bool,
    },

    /// Decode a shinylive.io URL
    Decode {
        /// The URL, or - to read it from stdin
        #[arg(default_value = "-")]
        url: String,

        /// Write the app's files here instead of printing them
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,

        /// Print the bundle as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    let runtime = RealRuntime;

    match cli.command {
        Commands::Export(ref args) => {
            let config = load_config(&runtime, &cli, None)?;
            run_export(&runtime, &config, args).await?
        }
        Commands::Assets { ref command } => run_assets(&runtime, &cli, command).await?,
        Commands::Extension { ref command } => run_extension(&runtime, &cli, command).await?,
        Commands::Url { ref command } => run_url(&runtime, command)?,
    }
    Ok(())
}

fn load_config<R: Runtime>(runtime: &R, cli: &Cli, dir: Option<&DirArg>) -> Result<Config> {
    let cache_dir = dir
        .and_then(|d| d.dir.clone())
        .or_else(|| cli.cache_dir.clone());
    let mut config = Config::new(runtime, cache_dir)?;
    if let Some(names) = &cli.base_packages {
        config = config.with_base_packages(parse_package_list(names));
    }
    Ok(config)
}

async fn ensure_assets<R: Runtime>(runtime: &R, config: &Config) -> Result<()> {
    let http = build_http_client()?;
    assets::ensure_assets(runtime, &http, config, None).await?;
    Ok(())
}

async fn run_export<R: Runtime>(runtime: &R, config: &Config, args: &ExportArgs) -> Result<()> {
    let template_params = match &args.template_params {
        Some(params) => parse_template_params(runtime, params)?,
        None => Map::new(),
    };

    ensure_assets(runtime, config).await?;
    let resolver = Resolver::from_config(runtime, config)?;
    let options = ExportOptions {
        appdir: args.appdir.clone(),
        destdir: args.destdir.clone(),
        subdir: args.subdir.clone().unwrap_or_default(),
        full_shinylive: args.full_shinylive,
        template_dir: args.template_dir.clone(),
        template_params,
    };
    export(runtime, config, &resolver, &options)?;
    Ok(())
}

/// Template parameters come from a JSON file when `params` names one, else from `params` itself.
fn parse_template_params<R: Runtime>(runtime: &R, params: &str) -> Result<Map<String, Value>> {
    let path = Path::new(params);
    let text = if runtime.exists(path) {
        runtime.read_to_string(path)?
    } else {
        params.to_string()
    };
    match serde_json::from_str(&text).context("Failed to parse template parameters")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Template parameters must be a JSON object"),
    }
}

async fn run_assets<R: Runtime>(runtime: &R, cli: &Cli, command: &AssetsCommand) -> Result<()> {
    match command {
        AssetsCommand::Info(dir) => {
            let config = load_config(runtime, cli, Some(dir))?;
            print!("{}", assets::info(runtime, &config.cache_dir)?);
        }
        AssetsCommand::Download { version, url, dir } => {
            let config = load_config(runtime, cli, Some(dir))?.with_assets_version(version);
            let url = url.clone().unwrap_or_else(|| config.bundle_url());
            let http = build_http_client()?;
            assets::download_assets(runtime, &http, &config.cache_dir, &url).await?;
        }
        AssetsCommand::Cleanup(dir) => {
            let config = load_config(runtime, cli, Some(dir))?;
            assets::cleanup(runtime, &config.cache_dir, SHINYLIVE_ASSETS_VERSION)?;
        }
        AssetsCommand::Remove { version, dir } => {
            let config = load_config(runtime, cli, Some(dir))?;
            assets::remove_versions(runtime, &config.cache_dir, std::slice::from_ref(version))?;
        }
        AssetsCommand::InstallFromLocal {
            build,
            version,
            dir,
        } => {
            let config = load_config(runtime, cli, Some(dir))?;
            println!(
                "Copying shinylive-{} from {} to {}",
                version,
                build.display(),
                config.cache_dir.display()
            );
            assets::copy_from_local(runtime, build, &config.cache_dir, version)?;
        }
        AssetsCommand::LinkFromLocal {
            build,
            version,
            dir,
        } => {
            let config = load_config(runtime, cli, Some(dir))?;
            let target = assets::link_from_local(runtime, build, &config.cache_dir, version)?;
            println!(
                "Creating symlink from {} to {}",
                target.display(),
                build.display()
            );
        }
        AssetsCommand::Version => println!("{}", SHINYLIVE_ASSETS_VERSION),
    }
    Ok(())
}

async fn run_extension<R: Runtime>(
    runtime: &R,
    cli: &Cli,
    command: &ExtensionCommand,
) -> Result<()> {
    let config = load_config(runtime, cli, None)?;
    let output = match command {
        ExtensionCommand::Info => json!({
            "version": SHINYLIVE_PACKAGE_VERSION,
            "assets_version": SHINYLIVE_ASSETS_VERSION,
            "scripts": {
                "codeblock-to-json": config.codeblock_to_json_file(),
            },
        }),
        ExtensionCommand::BaseHtmldeps { sw_dir } => {
            ensure_assets(runtime, &config).await?;
            serde_json::to_value(htmldep::base_deps_htmldep(
                runtime,
                &config,
                sw_dir.as_deref(),
            )?)?
        }
        ExtensionCommand::LanguageResources => {
            ensure_assets(runtime, &config).await?;
            let resolver = Resolver::from_config(runtime, &config)?;
            serde_json::to_value(htmldep::python_resources(runtime, &config, &resolver)?)?
        }
        ExtensionCommand::AppResources { json_file } => {
            let text = match json_file {
                Some(path) => runtime.read_to_string(path)?,
                None => read_stdin()?,
            };
            let files: Vec<FileContent> =
                serde_json::from_str(&text).context("Failed to parse the app's files")?;
            ensure_assets(runtime, &config).await?;
            let resolver = Resolver::from_config(runtime, &config)?;
            serde_json::to_value(htmldep::app_resources(&config, &resolver, &files))?
        }
    };
    println!("{}", output);
    Ok(())
}

fn run_url<R: Runtime>(runtime: &R, command: &UrlCommand) -> Result<()> {
    match command {
        UrlCommand::Encode {
            app,
            files,
            mode,
            language,
            json,
            no_header,
        } => {
            let from_stdin = app == "-";
            let app_in = if from_stdin { read_stdin()? } else { app.clone() };
            let language = match language {
                Some(language) => *language,
                None => detect_app_language(&app_in)?,
            };
            let files: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
            let app = if from_stdin {
                ShinyliveApp::from_text(runtime, &app_in, &files, language)?
            } else {
                ShinyliveApp::from_local(runtime, Path::new(&app_in), &files, language)?
            }
            .with_mode(*mode)
            .with_header(!no_header);

            if *json {
                println!("{}", app.to_json()?);
            } else {
                println!("{}", app.to_url()?);
            }
        }
        UrlCommand::Decode { url, dir, json } => {
            let url_in = if url == "-" { read_stdin()? } else { url.clone() };
            let app = url_decode(&url_in)?;
            if *json {
                println!("{}", app.to_json()?);
            } else if let Some(dir) = dir {
                app.write_files(runtime, dir)?;
            } else {
                println!("{}", app.to_chunk_contents());
            }
        }
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}
