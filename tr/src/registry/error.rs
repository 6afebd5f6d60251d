//! Registry error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or refreshing the tool catalog
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Manifest not found at {path}")]
    ManifestNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Version '{version}' of tool '{name}' not found")]
    VersionNotFound { name: String, version: String },

    #[error("Script file missing: {path}")]
    ScriptMissing { path: PathBuf },

    #[error("Registry API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Registry network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed registry response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
