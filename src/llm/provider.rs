use async_trait::async_trait;

use super::types::{ChatMessage, ToolAwareResponse, ToolSpec};
use crate::core::errors::AgentResult;

/// LLM completion boundary.
#[async_trait]
pub trait Generator: Send + Sync {
    /// return the provider name (e.g. "openai", "rate_limited")
    fn name(&self) -> &str;

    /// plain completion
    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String>;

    /// completion that may answer with tool calls instead of (or alongside) text
    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> AgentResult<ToolAwareResponse>;
}

/// Query embedding boundary used by the vector retriever.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> AgentResult<Vec<Vec<f32>>>;
}
