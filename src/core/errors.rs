use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("llm error: {0}")]
    Llm(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("web search error: {0}")]
    WebSearch(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn config<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Config(err.to_string())
    }

    pub fn llm<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Llm(err.to_string())
    }

    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        AgentError::Retrieval(err.to_string())
    }

    pub fn web_search<E: std::fmt::Display>(err: E) -> Self {
        AgentError::WebSearch(err.to_string())
    }

    /// Collaborator outages are worth another attempt; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentError::Llm(_) | AgentError::Retrieval(_) | AgentError::WebSearch(_)
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
