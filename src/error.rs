//! Error types shared across the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the collector, stores, and orchestration layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Path is outside the allowed roots: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to read {source_id}: {cause}")]
    SourceRead {
        source_id: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Failed to fetch {url}: {cause}")]
    Fetch {
        url: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
