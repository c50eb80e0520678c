//! Indexing orchestration.
//!
//! Wires the pipeline together for ingestion: each collected source is
//! chunked, embedded in one batch call, and appended to the vector
//! store under the target collection. A source that yields no chunks is
//! recorded as `"empty"` and skipped — that is not an error. An
//! embedding or store failure on any source aborts the whole call;
//! records already written for earlier sources stay durable (retry
//! policy belongs to the caller).

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::collector::SourceDocument;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{Metadata, VectorStore};

/// Per-source outcome inside an [`IndexReport`].
#[derive(Debug, Clone, Serialize)]
pub struct SourceDetail {
    pub source: String,
    pub chunks: usize,
    pub status: String,
}

/// Summary of one `index` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub kb: String,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub details: Vec<SourceDetail>,
    pub model: String,
    pub chunk_size: usize,
    pub overlap: usize,
}

/// Chunk, embed, and persist `sources` into the `kb` collection.
///
/// Ids are a shared random prefix per source plus the zero-based chunk
/// index; each record's metadata carries `source`, `kb`, and
/// `chunk_index`.
pub async fn index_sources(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    kb: &str,
    sources: &[SourceDocument],
    chunk_size: usize,
    overlap: usize,
    model: &str,
) -> Result<IndexReport> {
    let mut files_indexed = 0usize;
    let mut chunks_indexed = 0usize;
    let mut details = Vec::with_capacity(sources.len());

    for doc in sources {
        files_indexed += 1;
        let chunks = chunk_text(&doc.text, chunk_size, overlap);
        if chunks.is_empty() {
            debug!(source = %doc.source, "no chunks produced, skipping");
            details.push(SourceDetail {
                source: doc.source.clone(),
                chunks: 0,
                status: "empty".to_string(),
            });
            continue;
        }

        // One shared random prefix per source, suffixed with the chunk
        // index, keeps ids unique within the collection.
        let base = Uuid::new_v4().simple().to_string();
        let prefix = &base[..8];
        let ids: Vec<String> = (0..chunks.len())
            .map(|i| format!("{}-{}", prefix, i))
            .collect();
        let metadatas: Vec<Metadata> = (0..chunks.len())
            .map(|i| {
                serde_json::json!({
                    "source": doc.source,
                    "kb": kb,
                    "chunk_index": i as i64,
                })
                .as_object()
                .unwrap()
                .clone()
            })
            .collect();

        let embeddings = embedder.embed_batch(&chunks, model).await?;
        store
            .add(kb, &chunks, &ids, Some(&metadatas), Some(&embeddings))
            .await?;

        info!(source = %doc.source, chunks = chunks.len(), "indexed source");
        chunks_indexed += chunks.len();
        details.push(SourceDetail {
            source: doc.source.clone(),
            chunks: chunks.len(),
            status: "ok".to_string(),
        });
    }

    Ok(IndexReport {
        kb: kb.to_string(),
        files_indexed,
        chunks_indexed,
        details,
        model: model.to_string(),
        chunk_size,
        overlap,
    })
}
