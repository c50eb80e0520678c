//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the two operations the pipeline
//! needs — `add` and `query` — and both backends must behave identically
//! from the caller's view: same response shape, same ranking order, same
//! edge-case handling. The backends differ only in where records live:
//!
//! | Backend | Persistence | Module |
//! |---------|-------------|--------|
//! | [`sqlite::SqliteStore`] | one shared SQLite database | [`sqlite`] |
//! | [`jsonl::JsonlStore`] | one append-only JSONL file per collection | [`jsonl`] |
//!
//! Collections are created lazily on first write and are append-only:
//! there is no update or delete, and a record once written is never
//! mutated. Ranking for both backends runs through [`rank_queries`], so
//! ordering and tie-breaking cannot drift between them.

pub mod jsonl;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};

/// Free-form per-record metadata, keyed by field name.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Response to a [`VectorStore::query`] call: one inner list per query
/// vector, each holding up to `n_results` matches ordered by descending
/// similarity. `distances` uses `1 − cosine similarity`, so smaller
/// means more similar.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
    pub distances: Vec<Vec<f32>>,
}

/// Abstract vector store with two conforming implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist one record per document in `collection`.
    ///
    /// A no-op when `documents` is empty (no record written, no
    /// collection created). Fails with a validation error when `ids`
    /// and `documents` differ in length. A missing metadata entry
    /// defaults to an empty map, a missing embedding to an empty vector.
    async fn add(
        &self,
        collection: &str,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<()>;

    /// Rank every stored record of `collection` against each query
    /// vector and return the top `n_results` per query.
    ///
    /// Querying a collection that does not exist returns one empty row
    /// per query vector, never an error.
    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<QueryResponse>;
}

/// Open the store backend named by the configuration.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    match config.backend.as_str() {
        "jsonl" => Ok(Box::new(jsonl::JsonlStore::new(&config.data_dir))),
        "sqlite" => Ok(Box::new(sqlite::SqliteStore::new(&config.db_path))),
        other => Err(Error::Config(format!(
            "Unknown store backend: '{}'. Must be jsonl or sqlite.",
            other
        ))),
    }
}

/// A collection materialized in memory, in insertion order.
#[derive(Debug, Default)]
pub(crate) struct LoadedCollection {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub embeddings: Vec<Vec<f32>>,
}

impl LoadedCollection {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Validate the parallel-input invariant of `add`.
pub(crate) fn check_add_lengths(documents: &[String], ids: &[String]) -> Result<()> {
    if documents.len() != ids.len() {
        return Err(Error::Validation(format!(
            "ids length {} does not match documents length {}",
            ids.len(),
            documents.len()
        )));
    }
    Ok(())
}

/// Brute-force top-k ranking shared by both backends.
///
/// For each query vector, computes cosine similarity against every
/// record, selects the `n_results` most similar, and reports
/// `distance = 1 − similarity`. Equal similarities keep insertion
/// order, earlier-inserted record first, so results are reproducible.
pub(crate) fn rank_queries(
    loaded: &LoadedCollection,
    query_embeddings: &[Vec<f32>],
    n_results: usize,
) -> QueryResponse {
    let mut response = QueryResponse::default();

    for query in query_embeddings {
        let similarities: Vec<f32> = loaded
            .embeddings
            .iter()
            .map(|record| cosine_similarity(query, record))
            .collect();

        let mut order: Vec<usize> = (0..loaded.len()).collect();
        order.sort_by(|&a, &b| {
            similarities[b]
                .partial_cmp(&similarities[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        order.truncate(n_results);

        response
            .ids
            .push(order.iter().map(|&i| loaded.ids[i].clone()).collect());
        response
            .documents
            .push(order.iter().map(|&i| loaded.documents[i].clone()).collect());
        response
            .metadatas
            .push(order.iter().map(|&i| loaded.metadatas[i].clone()).collect());
        response
            .distances
            .push(order.iter().map(|&i| 1.0 - similarities[i]).collect());
    }

    response
}
