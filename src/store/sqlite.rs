//! Managed backend delegating persistence to SQLite via `sqlx`.
//!
//! The store wraps one connection pool bound to a fixed database file.
//! The pool is constructed lazily on first use and shared for the life
//! of the store handle; `OnceCell` guarantees exactly one pool is built
//! even under concurrent first use. Collections live in a `collections`
//! table tagged with the kb name; records append into a `records` table
//! whose `seq` rowid preserves insertion order for deterministic
//! tie-breaking. Embeddings are stored as little-endian `f32` BLOBs.
//!
//! Ranking is computed in-process over the loaded rows with the same
//! kernel as the JSONL backend, so both backends report identical
//! ordering and the same `1 − cosine` distance convention.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tokio::sync::OnceCell;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::Result;

use super::{check_add_lengths, rank_queries, LoadedCollection, Metadata, QueryResponse, VectorStore};

/// SQLite-backed [`VectorStore`].
pub struct SqliteStore {
    db_path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            pool: OnceCell::new(),
        }
    }

    /// The shared pool, built on first call.
    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                if let Some(parent) = self.db_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let options =
                    SqliteConnectOptions::from_str(&format!("sqlite:{}", self.db_path.display()))?
                        .create_if_missing(true)
                        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS collections (
                        name TEXT PRIMARY KEY,
                        kb TEXT NOT NULL
                    )
                    "#,
                )
                .execute(&pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS records (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        collection TEXT NOT NULL,
                        id TEXT NOT NULL,
                        text TEXT NOT NULL,
                        metadata_json TEXT NOT NULL DEFAULT '{}',
                        embedding BLOB NOT NULL
                    )
                    "#,
                )
                .execute(&pool)
                .await?;

                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
                )
                .execute(&pool)
                .await?;

                Ok(pool)
            })
            .await
    }

    /// Idempotent lookup-or-create, tagging the collection with its kb
    /// name. Safe to race: the insert ignores an existing row.
    async fn ensure_collection(&self, pool: &SqlitePool, name: &str) -> Result<()> {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT name FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if existing.is_none() {
            sqlx::query("INSERT OR IGNORE INTO collections (name, kb) VALUES (?, ?)")
                .bind(name)
                .bind(name)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    async fn load(&self, pool: &SqlitePool, collection: &str) -> Result<LoadedCollection> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM records WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(pool)
        .await?;

        let mut loaded = LoadedCollection::default();
        for row in rows {
            loaded.ids.push(row.get("id"));
            loaded.documents.push(row.get("text"));
            let metadata_json: String = row.get("metadata_json");
            loaded
                .metadatas
                .push(serde_json::from_str(&metadata_json).unwrap_or_default());
            let blob: Vec<u8> = row.get("embedding");
            loaded.embeddings.push(blob_to_vec(&blob));
        }
        Ok(loaded)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
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

        let pool = self.pool().await?;
        self.ensure_collection(pool, collection).await?;

        let mut tx = pool.begin().await?;
        for (i, text) in documents.iter().enumerate() {
            let metadata = metadatas.and_then(|m| m.get(i).cloned()).unwrap_or_default();
            let embedding = embeddings.and_then(|e| e.get(i)).cloned().unwrap_or_default();
            sqlx::query(
                "INSERT INTO records (collection, id, text, metadata_json, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(collection)
            .bind(&ids[i])
            .bind(text)
            .bind(serde_json::to_string(&metadata)?)
            .bind(vec_to_blob(&embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
    ) -> Result<QueryResponse> {
        let pool = self.pool().await?;
        let loaded = self.load(pool, collection).await?;
        Ok(rank_queries(&loaded, query_embeddings, n_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> SqliteStore {
        SqliteStore::new(tmp.path().join("kb.sqlite"))
    }

    fn meta(source: &str, chunk_index: i64) -> Metadata {
        serde_json::json!({"source": source, "kb": "kb", "chunk_index": chunk_index})
            .as_object()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_empty_add_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.add("kb", &[], &[], None, None).await.unwrap();
        // Pool was never initialized, so not even the db file exists.
        assert!(!tmp.path().join("kb.sqlite").exists());
    }

    #[tokio::test]
    async fn test_mismatched_ids_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let err = store
            .add("kb", &["t".to_string()], &[], None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ids length"));
    }

    #[tokio::test]
    async fn test_roundtrip_exact_match() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let embedding = vec![0.6f32, 0.8];
        store
            .add(
                "kb",
                &["stored text".to_string()],
                &["abc-0".to_string()],
                Some(&[meta("doc.md", 0)]),
                Some(&[embedding.clone()]),
            )
            .await
            .unwrap();

        let response = store.query("kb", &[embedding], 1).await.unwrap();
        assert_eq!(response.ids[0], vec!["abc-0"]);
        assert_eq!(response.documents[0], vec!["stored text"]);
        assert_eq!(response.metadatas[0][0].get("source").unwrap(), "doc.md");
        assert!(response.distances[0][0].abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_collection_created_lazily_and_tagged() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store
            .add(
                "kb_docs",
                &["x".to_string()],
                &["i".to_string()],
                None,
                Some(&[vec![1.0]]),
            )
            .await
            .unwrap();

        let pool = store.pool().await.unwrap();
        let kb: String = sqlx::query_scalar("SELECT kb FROM collections WHERE name = ?")
            .bind("kb_docs")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(kb, "kb_docs");

        // Re-adding to the same collection stays idempotent.
        store
            .add(
                "kb_docs",
                &["y".to_string()],
                &["j".to_string()],
                None,
                Some(&[vec![0.5]]),
            )
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_query_missing_collection_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let response = store.query("ghost", &[vec![1.0, 0.0]], 3).await.unwrap();
        assert_eq!(response.ids.len(), 1);
        assert!(response.ids[0].is_empty());
    }

    #[tokio::test]
    async fn test_descending_order_and_truncation() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store
            .add(
                "kb",
                &["a".to_string(), "b".to_string(), "c".to_string()],
                &["a".to_string(), "b".to_string(), "c".to_string()],
                None,
                Some(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]]),
            )
            .await
            .unwrap();

        let response = store.query("kb", &[vec![1.0, 0.0]], 2).await.unwrap();
        assert_eq!(response.ids[0], vec!["a", "c"]);

        let all = store.query("kb", &[vec![1.0, 0.0]], 10).await.unwrap();
        assert_eq!(all.ids[0].len(), 3);
    }

    #[tokio::test]
    async fn test_tie_preserves_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store
            .add(
                "kb",
                &["first".to_string(), "second".to_string()],
                &["first".to_string(), "second".to_string()],
                None,
                Some(&[vec![1.0, 1.0], vec![1.0, 1.0]]),
            )
            .await
            .unwrap();
        let response = store.query("kb", &[vec![1.0, 1.0]], 2).await.unwrap();
        assert_eq!(response.ids[0], vec!["first", "second"]);
    }
}
