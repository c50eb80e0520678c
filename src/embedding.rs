//! Embedding capability and implementations.
//!
//! The pipeline never computes embeddings itself; it is handed an
//! [`Embedder`] and calls it with the model name chosen by the caller.
//! Two implementations are provided:
//!
//! - **[`HttpEmbedder`]** — calls an OpenAI-compatible `/embeddings`
//!   endpoint with bounded timeout and exponential-backoff retry.
//! - **[`HashEmbedder`]** — deterministic trigram-hash vectors; no
//!   network, no model weights. Useful for tests and offline smoke runs.
//!
//! Also home to the shared vector utilities:
//! [`cosine_similarity`] for ranking, and [`vec_to_blob`] /
//! [`blob_to_vec`] for the SQLite backend's BLOB encoding.
//!
//! # Retry Strategy (HTTP)
//!
//! - HTTP 429 and 5xx → retry with backoff 1s, 2s, 4s, … (capped at 2^5)
//! - other 4xx → fail immediately
//! - network errors → retry

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Norm offset guarding against division by zero in cosine similarity.
const NORM_EPSILON: f32 = 1e-12;

/// A capability that turns text into fixed-dimensionality vectors.
///
/// `embed_batch` must be length-preserving: one vector per input text,
/// in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts with the given model.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_single(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()], model).await?;
        if vectors.is_empty() {
            return Err(Error::Embedding("empty embedding response".to_string()));
        }
        Ok(vectors.remove(0))
    }
}

/// Create the [`Embedder`] named by the configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashEmbedder::new(config.dims))),
        "http" => Ok(Box::new(HttpEmbedder::new(config)?)),
        other => Err(Error::Config(format!(
            "Unknown embedding provider: '{}'. Must be hash or http.",
            other
        ))),
    }
}

// ============ HTTP provider ============

/// Client for an OpenAI-compatible embeddings API.
///
/// Sends `POST {base_url}/embeddings` with `{"model": …, "input": […]}`
/// and reads `data[].embedding`, re-ordered by `data[].index` so the
/// output always matches input order. The API key is read from the
/// environment variable named in the config, when one is named.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("embedding.base_url required for http provider".into()))?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::Config(format!("environment variable {} not set", var))
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn request_once(&self, texts: &[String], model: &str) -> Result<reqwest::Response> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });
        let mut req = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        Ok(req.send().await?)
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.request_once(texts, model).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: EmbeddingsResponse = response.json().await?;
                        let mut items = parsed.data;
                        items.sort_by_key(|item| item.index);
                        let vectors: Vec<Vec<f32>> =
                            items.into_iter().map(|item| item.embedding).collect();
                        if vectors.len() != texts.len() {
                            return Err(Error::Embedding(format!(
                                "expected {} embeddings, got {}",
                                texts.len(),
                                vectors.len()
                            )));
                        }
                        return Ok(vectors);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = Error::Embedding(format!("API error {}: {}", status, body));
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Embedding("embedding failed after retries".to_string())))
    }
}

// ============ Hash provider ============

/// Deterministic content-derived embeddings.
///
/// Hashes character trigrams of each whitespace-separated token into a
/// fixed number of dimensions and normalizes the result to unit length.
/// Not semantically meaningful, but stable across runs and
/// content-dependent, which is what tests and offline runs need.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();

        for token in lower.split_whitespace() {
            let chars: Vec<char> = token.chars().collect();
            // Whole-token signal plus trigram signals.
            vector[hash_slot(token.bytes(), self.dims)] += 1.0;
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                vector[hash_slot(trigram.bytes(), self.dims)] += 1.0;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

fn hash_slot(bytes: impl Iterator<Item = u8>, dims: usize) -> usize {
    let hash = bytes.fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    (hash % dims as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ Vector utilities ============

/// Cosine similarity between two embedding vectors, in `[-1.0, 1.0]`.
///
/// Each norm is offset by a small epsilon so zero vectors (including the
/// empty-embedding default written by `add`) yield similarity `0.0`
/// instead of dividing by zero. Vectors of different lengths are compared
/// over their common prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    dot / (norm_a * norm_b)
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
