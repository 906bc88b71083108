pub mod service;
pub mod types;
pub mod validation;

pub use service::ConfigService;
pub use types::{
    AgentConfig, LlmConfig, ModelSettings, Purpose, RetrievalConfig, WebSearchConfig,
    DEFAULT_MAX_ITERATIONS, MAX_RETRIES,
};
