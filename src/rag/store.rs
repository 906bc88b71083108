//! Retrieval boundary consumed by both controllers.
//!
//! The control logic only ever sees [`Passage`]s; how they are embedded and
//! stored is owned by the implementation (see `sqlite` and `retriever`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::AgentResult;

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Source identifier (document path, URL, ...).
    pub source_id: String,
    /// Relevance score (higher = better).
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            score,
        }
    }
}

/// Abstract retriever over the documentation corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Top `top_k` passages for `query`, best first.
    ///
    /// A query with no matches yields an empty list, never an error.
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>>;
}

/// A stored chunk with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub source: String,
    /// Collection the chunk belongs to.
    pub collection: String,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    pub score: f32,
}

impl From<ChunkSearchResult> for Passage {
    fn from(result: ChunkSearchResult) -> Self {
        Passage {
            text: result.chunk.content,
            source_id: result.chunk.source,
            score: result.score,
        }
    }
}
