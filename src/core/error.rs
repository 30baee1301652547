//! Error types for Sigrun

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using Sigrun's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Sigrun error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Project not found: {path}")]
    ProjectNotFound { path: PathBuf },

    #[error("Parse error in {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Unsupported file type: {path}")]
    UnsupportedFile { path: PathBuf },

    #[error("Instrumentation error in {path}: {message}")]
    InstrumentError { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("No inventory found at {path} (run `sigrun run` first)")]
    InventoryNotFound { path: PathBuf },

    #[error("No execution record found at {path} (run `sigrun run` first)")]
    ExecutionNotFound { path: PathBuf },

    #[error("Report error: {message}")]
    ReportError { message: String },

    #[error("Source map error: {message}")]
    SourceMapError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
