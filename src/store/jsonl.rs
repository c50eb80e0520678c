//! Self-contained brute-force backend over append-only JSONL files.
//!
//! Each collection is a single newline-delimited UTF-8 file,
//! `<data_dir>/<collection>.jsonl`, with one self-describing record per
//! line: `{"id": …, "text": …, "metadata": {…}, "embedding": […]}`.
//! Writes append; nothing is ever rewritten. Every query re-reads the
//! whole file into memory and scans it linearly — O(N·d) per query
//! vector — which is the intended trade-off for small and medium
//! collections. Corrupted lines are skipped on read without aborting
//! the load.
//!
//! No in-process lock is held: the design assumes at most one writer
//! per collection at a time. Concurrent readers are safe with respect
//! to each other but see no snapshot guarantee against an in-flight
//! append.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::{check_add_lengths, rank_queries, LoadedCollection, Metadata, QueryResponse, VectorStore};

/// One persisted line of a collection file.
#[derive(Debug, Serialize, Deserialize)]
struct JsonlRecord {
    id: String,
    text: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    embedding: Vec<f32>,
}

/// File-backed [`VectorStore`] with linear-scan cosine search.
pub struct JsonlStore {
    data_dir: PathBuf,
}

impl JsonlStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", collection))
    }

    /// Reconstruct the full in-memory view of a collection. A missing
    /// file is an empty collection, not an error.
    fn load(&self, collection: &str) -> Result<LoadedCollection> {
        let path = self.collection_path(collection);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadedCollection::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut loaded = LoadedCollection::default();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonlRecord>(line) {
                Ok(record) => {
                    loaded.ids.push(record.id);
                    loaded.documents.push(record.text);
                    loaded.metadatas.push(record.metadata);
                    loaded.embeddings.push(record.embedding);
                }
                Err(e) => {
                    debug!(collection, error = %e, "skipping malformed record line");
                }
            }
        }
        Ok(loaded)
    }
}

#[async_trait]
impl VectorStore for JsonlStore {
    async fn add(
        &self,
        collection: &str,
        documents: &[String],
        ids: &[String],
        metadatas: Option<&[Metadata]>,
        embeddings: Option<&[Vec<f32>]>,
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        check_add_lengths(documents, ids)?;

        std::fs::create_dir_all(&self.data_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.collection_path(collection))?;
        let mut writer = BufWriter::new(file);

        for (i, text) in documents.iter().enumerate() {
            let record = JsonlRecord {
                id: ids[i].clone(),
                text: text.clone(),
                metadata: metadatas
                    .and_then(|m| m.get(i).cloned())
                    .unwrap_or_default(),
                embedding: embeddings
                    .and_then(|e| e.get(i).cloned())
                    .unwrap_or_default(),
            };
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<QueryResponse> {
        let loaded = self.load(collection)?;
        Ok(rank_queries(&loaded, query_embeddings, n_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(source: &str, kb: &str, chunk_index: i64) -> Metadata {
        serde_json::json!({"source": source, "kb": kb, "chunk_index": chunk_index})
            .as_object()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_empty_add_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        store.add("kb", &[], &[], None, None).await.unwrap();
        assert!(!store.collection_path("kb").exists());
    }

    #[tokio::test]
    async fn test_mismatched_ids_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        let err = store
            .add("kb", &["text".to_string()], &[], None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ids length"));
    }

    #[tokio::test]
    async fn test_roundtrip_exact_match() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        let embedding = vec![0.6f32, 0.8];
        store
            .add(
                "kb",
                &["some text".to_string()],
                &["r1-0".to_string()],
                Some(&[meta("notes.md", "kb", 0)]),
                Some(&[embedding.clone()]),
            )
            .await
            .unwrap();

        let response = store.query("kb", &[embedding], 1).await.unwrap();
        assert_eq!(response.ids[0], vec!["r1-0"]);
        assert_eq!(response.documents[0], vec!["some text"]);
        assert_eq!(
            response.metadatas[0][0].get("source").unwrap(),
            "notes.md"
        );
        assert!(response.distances[0][0].abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_missing_collection_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        let response = store
            .query("nope", &[vec![1.0, 0.0], vec![0.0, 1.0]], 5)
            .await
            .unwrap();
        assert_eq!(response.ids.len(), 2);
        assert!(response.ids[0].is_empty() && response.ids[1].is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        store
            .add(
                "kb",
                &["good".to_string()],
                &["a".to_string()],
                None,
                Some(&[vec![1.0, 0.0]]),
            )
            .await
            .unwrap();
        // Corrupt the file by hand, then append another valid record.
        let path = store.collection_path("kb");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json at all\n\n");
        std::fs::write(&path, content).unwrap();
        store
            .add(
                "kb",
                &["also good".to_string()],
                &["b".to_string()],
                None,
                Some(&[vec![0.0, 1.0]]),
            )
            .await
            .unwrap();

        let response = store.query("kb", &[vec![1.0, 0.0]], 10).await.unwrap();
        assert_eq!(response.ids[0], vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_append_preserves_insertion_order_on_ties() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        // Two separate adds, identical embeddings.
        for id in ["first", "second"] {
            store
                .add(
                    "kb",
                    &[format!("{} doc", id)],
                    &[id.to_string()],
                    None,
                    Some(&[vec![1.0, 1.0]]),
                )
                .await
                .unwrap();
        }
        let response = store.query("kb", &[vec![1.0, 1.0]], 2).await.unwrap();
        assert_eq!(response.ids[0], vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_missing_metadata_and_embedding_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        store
            .add(
                "kb",
                &["bare".to_string()],
                &["x".to_string()],
                None,
                None,
            )
            .await
            .unwrap();
        let response = store.query("kb", &[vec![1.0]], 1).await.unwrap();
        assert_eq!(response.ids[0], vec!["x"]);
        assert!(response.metadatas[0][0].is_empty());
        // Empty embedding ranks with similarity 0, distance 1.
        assert!((response.distances[0][0] - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = JsonlStore::new(tmp.path());
        store
            .add(
                "alpha",
                &["in alpha".to_string()],
                &["a".to_string()],
                None,
                Some(&[vec![1.0]]),
            )
            .await
            .unwrap();
        let response = store.query("beta", &[vec![1.0]], 5).await.unwrap();
        assert!(response.ids[0].is_empty());
    }
}
