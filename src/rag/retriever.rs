use std::sync::Arc;

use async_trait::async_trait;

use super::sqlite::SqliteChunkStore;
use super::store::{Passage, Retriever};
use crate::core::errors::{AgentError, AgentResult};
use crate::llm::Embedder;

/// Embeds the query and searches one collection of the chunk store.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    store: SqliteChunkStore,
    collection: String,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: SqliteChunkStore, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Retrieval("embedder returned no vector".to_string()))?;

        let results = self
            .store
            .search(&query_embedding, top_k, &self.collection)
            .await?;
        tracing::debug!(
            "Retrieved {} passages from '{}' for: {}",
            results.len(),
            self.collection,
            query
        );

        Ok(results.into_iter().map(Passage::from).collect())
    }
}
