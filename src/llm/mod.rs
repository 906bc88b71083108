pub mod openai;
pub mod provider;
pub mod rate_limit;
pub mod types;

pub use openai::{OpenAiEmbedder, OpenAiProvider};
pub use provider::{Embedder, Generator};
pub use rate_limit::{RateBudget, RateLimitedGenerator};
pub use types::{ChatMessage, ChatRequest, ToolAwareResponse, ToolCall, ToolSpec};
