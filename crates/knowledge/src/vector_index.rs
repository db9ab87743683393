//! Query-side view of a knowledge base.
//!
//! The retrieval pipeline only sees [`VectorStore`]: "given a query string,
//! return up to `k` documents with similarity scores". Scores are
//! similarities, higher is better, ordered best first.

use crate::config;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index;
use async_trait::async_trait;
use rusqlite::Connection;
use sage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub text: String,
    pub score: f32,
    pub source: String,
}

/// Similarity search over stored passages.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` documents ordered by descending similarity.
    async fn similarity_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredDocument>>;
}

/// [`VectorStore`] backed by a base's SQLite index.
pub struct SqliteVectorStore {
    base_name: String,
    /// Shared with the blocking scan task.
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("base_name", &self.base_name)
            .field("embedder", &self.embedder)
            .finish()
    }
}

impl SqliteVectorStore {
    /// Open an existing knowledge base.
    pub fn open(workspace: &Path, base_name: &str) -> AppResult<Self> {
        let index_path = config::get_index_path(workspace, base_name);
        if !index_path.exists() {
            return Err(AppError::Knowledge(format!(
                "Knowledge base '{}' has no index. Run 'sage knowledge learn' first.",
                base_name
            )));
        }

        let kb_config = config::load_config(workspace, base_name)?;
        let embedder = create_provider(&kb_config)?;
        let conn = index::init_index(&index_path)?;

        Ok(Self::new(base_name, conn, embedder))
    }

    pub fn new(base_name: &str, conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            base_name: base_name.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            embedder,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Number of stored chunks.
    pub fn chunk_count(&self) -> AppResult<u32> {
        let conn = lock(&self.conn)?;
        Ok(index::get_stats(&conn)?.1)
    }
}

fn lock(conn: &Mutex<Connection>) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| AppError::Knowledge("Index connection lock poisoned".to_string()))
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredDocument>> {
        let query_embedding = self.embedder.embed(query).await?;

        // The full-table scan is synchronous; keep it off the async workers
        let conn = Arc::clone(&self.conn);
        let results = tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            index::query_chunks(&conn, &query_embedding, k)
        })
        .await
        .map_err(|e| AppError::Retrieval(format!("Similarity scan task failed: {}", e)))??;

        tracing::debug!(
            base = %self.base_name,
            "Similarity search returned {} chunks",
            results.len()
        );

        Ok(results
            .into_iter()
            .map(|(chunk, score)| ScoredDocument {
                text: chunk.text,
                score,
                source: chunk.source_name,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnowledgeChunk, KnowledgeSource};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_base() {
        let temp = TempDir::new().unwrap();
        let err = SqliteVectorStore::open(temp.path(), "missing").unwrap_err();
        assert!(err.to_string().contains("knowledge learn"));
    }

    #[tokio::test]
    async fn test_similarity_search_maps_chunks() {
        let temp = TempDir::new().unwrap();
        let conn = index::init_index(&temp.path().join("index.sqlite")).unwrap();
        let embedder = create_provider(&Default::default()).unwrap();

        let path = PathBuf::from("solar.txt");
        let source = KnowledgeSource {
            id: index::source_id(&path),
            name: "solar.txt".to_string(),
            path,
            learned_at: Utc::now(),
            size_bytes: 10,
        };
        index::insert_source(&conn, &source).unwrap();

        for (position, text) in ["solar panels produce electricity", "castles and stone walls"]
            .into_iter()
            .enumerate()
        {
            let embedding = embedder.embed(text).await.unwrap();
            index::insert_chunk(
                &conn,
                &KnowledgeChunk {
                    id: index::chunk_id(&source.id, position as u32, text),
                    source_id: source.id.clone(),
                    source_name: source.name.clone(),
                    position: position as u32,
                    text: text.to_string(),
                    embedding: Some(embedding),
                },
            )
            .unwrap();
        }

        let store = SqliteVectorStore::new("test", conn, embedder);
        assert_eq!(store.chunk_count().unwrap(), 2);

        let docs = store
            .similarity_search("solar panels produce electricity", 1)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "solar panels produce electricity");
        assert_eq!(docs[0].source, "solar.txt");
        assert!((docs[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_searches_share_one_store() {
        let temp = TempDir::new().unwrap();
        let conn = index::init_index(&temp.path().join("index.sqlite")).unwrap();
        let embedder = create_provider(&Default::default()).unwrap();
        let store = Arc::new(SqliteVectorStore::new("test", conn, embedder));
        assert_eq!(store.base_name(), "test");

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.similarity_search(&format!("query {}", i), 3).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_empty());
        }
    }
}
