//! Query orchestration.
//!
//! Embeds the query text once, issues a single-vector store query, and
//! assembles ranked hits. The query path always returns a
//! [`SearchResponse`] object: an empty query becomes a structured
//! failure (`success = false`) without touching the store, while store
//! and embedding failures propagate as errors.

use serde::Serialize;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::VectorStore;

/// One ranked search hit. Fields sourced from record metadata are
/// optional: a record written with sparse metadata still produces a
/// hit, with the missing fields unset.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 1-based position in the similarity-ordered result list.
    pub rank: usize,
    pub id: Option<String>,
    pub text: String,
    pub source: Option<String>,
    pub kb: Option<String>,
    pub chunk_index: Option<i64>,
    /// `1 − cosine similarity`; smaller is closer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Outcome of a search call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub kb: String,
    pub query: String,
    pub model: String,
    pub top_k: usize,
    pub results: Vec<SearchHit>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Semantic search over the `kb` collection.
pub async fn search_kb(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    kb: &str,
    query: &str,
    top_k: usize,
    model: &str,
) -> Result<SearchResponse> {
    if query.trim().is_empty() {
        return Ok(SearchResponse {
            success: false,
            kb: kb.to_string(),
            query: query.to_string(),
            model: model.to_string(),
            top_k,
            results: Vec::new(),
            count: 0,
            error: Some("query text must not be empty".to_string()),
        });
    }

    let query_embedding = embedder.embed_single(query, model).await?;
    let response = store.query(kb, &[query_embedding], top_k).await?;
    debug!(kb, top_k, "query returned {} rows", response.ids.len());

    // Single query vector, so unpack the first (and only) result row.
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response.documents.into_iter().next().unwrap_or_default();
    let metadatas = response.metadatas.into_iter().next().unwrap_or_default();
    let distances = response.distances.into_iter().next().unwrap_or_default();

    let results: Vec<SearchHit> = documents
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let meta = metadatas.get(i);
            SearchHit {
                rank: i + 1,
                id: ids.get(i).cloned(),
                text: text.clone(),
                source: meta
                    .and_then(|m| m.get("source"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                kb: meta
                    .and_then(|m| m.get("kb"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                chunk_index: meta.and_then(|m| m.get("chunk_index")).and_then(|v| v.as_i64()),
                distance: distances.get(i).copied(),
            }
        })
        .collect();

    let count = results.len();
    Ok(SearchResponse {
        success: true,
        kb: kb.to_string(),
        query: query.to_string(),
        model: model.to_string(),
        top_k,
        results,
        count,
        error: None,
    })
}
