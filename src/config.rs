use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable overriding `[collector].allowed_roots`,
/// `;`-separated. Empty or unset means no override.
pub const ALLOWED_ROOTS_ENV: &str = "VECTORKB_ALLOWED_ROOTS";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub collector: CollectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selection: `jsonl` (self-contained) or `sqlite` (managed).
    pub backend: String,
    /// Directory holding one `<collection>.jsonl` file per collection.
    pub data_dir: PathBuf,
    /// Database file for the sqlite backend.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "jsonl".to_string(),
            data_dir: PathBuf::from("data/kb"),
            db_path: PathBuf::from("data/kb.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider selection: `hash` (offline, deterministic) or `http`
    /// (OpenAI-compatible endpoint).
    pub provider: String,
    /// Default model name passed to the provider.
    pub model: String,
    /// Vector dimensionality for the hash provider.
    pub dims: usize,
    /// Endpoint base URL for the http provider, e.g.
    /// `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key, when the
    /// endpoint requires one.
    pub api_key_env: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: "embedding-3".to_string(),
            dims: 256,
            base_url: None,
            api_key_env: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectorConfig {
    /// Roots that local sources must resolve under. Empty means
    /// unrestricted.
    pub allowed_roots: Vec<PathBuf>,
    /// File extensions picked up from files and directories.
    pub allowed_extensions: Vec<String>,
    pub fetch_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            allowed_extensions: vec!["md".to_string(), "txt".to_string()],
            fetch_timeout_secs: 15,
        }
    }
}

/// Load configuration from a TOML file, apply environment overrides,
/// and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&content)?;
    finish(config)
}

/// Like [`load_config`], but a missing file falls back to defaults.
/// Other read or parse failures still fail.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return finish(Config::default());
    }
    load_config(path)
}

fn finish(mut config: Config) -> Result<Config> {
    if let Ok(raw) = std::env::var(ALLOWED_ROOTS_ENV) {
        let roots: Vec<PathBuf> = raw
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        if !roots.is_empty() {
            config.collector.allowed_roots = roots;
        }
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(Error::Config(
            "chunking.overlap must be smaller than chunking.chunk_size".to_string(),
        ));
    }

    match config.store.backend.as_str() {
        "jsonl" | "sqlite" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown store backend: '{}'. Must be jsonl or sqlite.",
                other
            )))
        }
    }

    match config.embedding.provider.as_str() {
        "hash" => {
            if config.embedding.dims == 0 {
                return Err(Error::Config(
                    "embedding.dims must be > 0 for the hash provider".to_string(),
                ));
            }
        }
        "http" => {
            if config.embedding.base_url.is_none() {
                return Err(Error::Config(
                    "embedding.base_url must be set for the http provider".to_string(),
                ));
            }
        }
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{}'. Must be hash or http.",
                other
            )))
        }
    }

    Ok(())
}
