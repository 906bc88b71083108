use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reformulation budget of the self-correcting controller.
pub const MAX_RETRIES: u32 = 2;

/// Default ceiling on REASON -> ACT cycles of the tool-using controller.
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

/// What a generator instance is used for; selects per-purpose model overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Generate,
    Evaluate,
    Reformulate,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Generate => "generate",
            Purpose::Evaluate => "evaluate",
            Purpose::Reformulate => "reformulate",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub rate_limit: RateLimitConfig,
    pub retrieval: RetrievalConfig,
    pub web_search: WebSearchConfig,
    pub offline: OfflineConfig,
    pub online: OnlineConfig,
    pub agent: AgentSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API root; `/chat/completions` and `/embeddings` are appended.
    pub base_url: String,
    pub api_key: Option<String>,
    pub default: ModelSettings,
    pub generate: Option<ModelOverride>,
    pub evaluate: Option<ModelOverride>,
    pub reformulate: Option<ModelOverride>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key: None,
            default: ModelSettings::default(),
            generate: None,
            evaluate: None,
            reformulate: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Default settings with the purpose-specific override laid on top.
    pub fn settings_for(&self, purpose: Purpose) -> ModelSettings {
        let override_value = match purpose {
            Purpose::Generate => self.generate.as_ref(),
            Purpose::Evaluate => self.evaluate.as_ref(),
            Purpose::Reformulate => self.reformulate.as_ref(),
        };

        let mut settings = self.default.clone();
        if let Some(o) = override_value {
            if let Some(model) = &o.model {
                settings.model = model.clone();
            }
            settings.temperature = o.temperature.or(settings.temperature);
            settings.max_tokens = o.max_tokens.or(settings.max_tokens);
        }
        settings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(1024),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverride {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            tokens_per_minute: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub store_path: PathBuf,
    pub collection_name: String,
    pub embedding_model: String,
    pub embedding_dimension: Option<u32>,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/vectordb/docs.db"),
            collection_name: "langgraph_docs".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimension: Some(512),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// One of `tavily`, `brave`, `google`, `duckduckgo`.
    pub provider: String,
    pub api_key: Option<String>,
    pub google_engine_id: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: "tavily".to_string(),
            api_key: None,
            google_engine_id: None,
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub max_retries: u32,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineConfig {
    pub max_iterations: usize,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Attempts per collaborator call before the invocation fails.
    pub collaborator_attempts: u32,
    pub retry_backoff_ms: u64,
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            collaborator_attempts: 2,
            retry_backoff_ms: 250,
            prompts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}
