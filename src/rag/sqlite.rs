//! SQLite-backed chunk store.
//!
//! Chunks and their embeddings are written by the indexing pipeline; the agent
//! only reads. Search is brute-force cosine similarity.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, StoredChunk};
use crate::core::errors::{AgentError, AgentResult};

pub struct SqliteChunkStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteChunkStore {
    /// Open a store written by the indexing pipeline.
    ///
    /// The file must already exist; a missing path is a configuration error.
    pub async fn open(db_path: PathBuf) -> AgentResult<Self> {
        if !db_path.is_file() {
            return Err(AgentError::Config(format!(
                "chunk store not found at {} (check retrieval.store_path)",
                db_path.display()
            )));
        }
        let pool = Self::connect(&db_path, false).await?;
        Ok(Self { pool, db_path })
    }

    /// Create (or reuse) a store with the chunk schema; fixtures only.
    #[cfg(test)]
    pub async fn create(db_path: PathBuf) -> AgentResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let pool = Self::connect(&db_path, true).await?;
        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn connect(db_path: &Path, create: bool) -> AgentResult<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(AgentError::retrieval)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[cfg(test)]
    async fn init_schema(&self) -> AgentResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS doc_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                collection TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(AgentError::retrieval)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_collection ON doc_chunks(collection)")
            .execute(&self.pool)
            .await
            .map_err(AgentError::retrieval)?;

        Ok(())
    }

    #[cfg(test)]
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: Option<String> = row.get("metadata");
        let metadata = metadata_str.and_then(|s| serde_json::from_str::<Value>(&s).ok());

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            collection: row.get("collection"),
            metadata,
        }
    }

    #[cfg(test)]
    pub async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> AgentResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(AgentError::retrieval)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = chunk
                .metadata
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "{}".to_string());

            sqlx::query(
                "INSERT OR REPLACE INTO doc_chunks (chunk_id, content, source, collection, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(&chunk.collection)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(AgentError::retrieval)?;
        }

        tx.commit().await.map_err(AgentError::retrieval)?;
        Ok(())
    }

    pub async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        collection: &str,
    ) -> AgentResult<Vec<ChunkSearchResult>> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, collection, metadata, embedding
             FROM doc_chunks
             WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(AgentError::retrieval)?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Option<Vec<u8>> = row.get("embedding");
                let embedding_bytes = embedding_bytes.filter(|b| !b.is_empty())?;
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored_emb);

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    pub async fn count(&self, collection: &str) -> AgentResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM doc_chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(AgentError::retrieval)?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, SqliteChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteChunkStore::create(dir.path().join("docs.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn make_chunk(id: &str, content: &str, collection: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: format!("docs/{}.md", id),
            collection: collection.to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_and_truncates() {
        let (_dir, store) = test_store().await;
        store
            .insert_batch(vec![
                (make_chunk("near", "StateGraph basics", "docs"), vec![1.0, 0.1, 0.0]),
                (make_chunk("far", "Unrelated", "docs"), vec![0.0, 0.0, 1.0]),
                (make_chunk("mid", "Checkpointers", "docs"), vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 2, "docs").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "near");
        assert_eq!(results[1].chunk.chunk_id, "mid");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn search_is_scoped_to_collection() {
        let (_dir, store) = test_store().await;
        store
            .insert_batch(vec![
                (make_chunk("a", "in docs", "docs"), vec![1.0, 0.0]),
                (make_chunk("b", "elsewhere", "other"), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 1);
        let results = store.search(&[1.0, 0.0], 10, "docs").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "in docs");
    }

    #[tokio::test]
    async fn empty_store_returns_empty_list() {
        let (_dir, store) = test_store().await;
        let results = store.search(&[1.0, 0.0], 5, "docs").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn open_rejects_missing_file_without_creating_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo").join("docs.db");

        let err = SqliteChunkStore::open(path.clone()).await.err().unwrap();

        assert!(matches!(err, AgentError::Config(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn open_reads_an_existing_store() {
        let (dir, store) = test_store().await;
        store
            .insert_batch(vec![(make_chunk("a", "in docs", "docs"), vec![1.0, 0.0])])
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteChunkStore::open(dir.path().join("docs.db")).await.unwrap();

        assert_eq!(reopened.count("docs").await.unwrap(), 1);
        assert_eq!(reopened.db_path(), dir.path().join("docs.db"));
    }
}
