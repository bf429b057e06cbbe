pub mod app_json;
pub mod archive;
pub mod assets;
pub mod config;
pub mod deps;
pub mod export;
pub mod http;
pub mod lockfile;
pub mod materialize;
pub mod runtime;
pub mod url;
