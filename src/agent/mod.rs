//! Query-answering controllers and the dispatch layer that picks between them.

pub mod attempts;
pub mod grader;
pub mod offline;
pub mod online;
pub mod parsing;
pub mod prompts;

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::config::{AgentConfig, Purpose};
use crate::core::errors::{AgentError, AgentResult};
use crate::llm::{Generator, OpenAiEmbedder, OpenAiProvider, RateBudget, RateLimitedGenerator};
use crate::rag::{Retriever, SqliteChunkStore, VectorRetriever};
use crate::tools::search::{HttpWebSearch, WebSearch};
use crate::tools::ToolRegistry;
use attempts::AttemptPolicy;
use grader::{Grader, LlmGrader};
use offline::{OfflineAgent, OfflineAnswer, OfflineCollaborators, OfflineOptions};
use online::{OnlineAgent, OnlineAnswer, OnlineOptions};
use prompts::PromptSet;

pub const MODE_ENV: &str = "AGENT_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Offline,
    Online,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Offline => "offline",
            Mode::Online => "online",
        }
    }

    /// Explicit choice first, then `AGENT_MODE`, then offline.
    pub fn resolve(explicit: Option<Mode>) -> Mode {
        if let Some(mode) = explicit {
            return mode;
        }
        match env::var(MODE_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("{}; falling back to offline", err);
                Mode::Offline
            }),
            Err(_) => Mode::Offline,
        }
    }
}

impl FromStr for Mode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Mode::Offline),
            "online" => Ok(Mode::Online),
            other => Err(AgentError::Config(format!(
                "unknown agent mode '{}' (expected offline or online)",
                other
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete collaborators shared by both controllers.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub reformulator: Arc<dyn Generator>,
    pub grader: Arc<dyn Grader>,
    pub web_search: Arc<dyn WebSearch>,
}

impl Collaborators {
    pub async fn from_config(config: &AgentConfig, prompts: Arc<PromptSet>) -> AgentResult<Self> {
        let llm = &config.llm;
        let timeout = Duration::from_secs(llm.timeout_secs);
        let budget = RateBudget::from_config(&config.rate_limit);

        let build = |purpose: Purpose| -> AgentResult<Arc<dyn Generator>> {
            let settings = llm.settings_for(purpose);
            tracing::debug!("{} model: {}", purpose.as_str(), settings.model);
            let provider: Arc<dyn Generator> = Arc::new(OpenAiProvider::new(
                &llm.base_url,
                llm.api_key.clone(),
                settings.clone(),
                timeout,
            )?);
            let Some(budget) = &budget else {
                return Ok(provider);
            };
            let limited: Arc<dyn Generator> =
                Arc::new(RateLimitedGenerator::new(provider, budget.clone(), settings));
            Ok(limited)
        };

        let generator = build(Purpose::Generate)?;
        let evaluator = build(Purpose::Evaluate)?;
        let reformulator = build(Purpose::Reformulate)?;

        let retrieval = &config.retrieval;
        let embedder = Arc::new(OpenAiEmbedder::new(
            &llm.base_url,
            llm.api_key.clone(),
            &retrieval.embedding_model,
            retrieval.embedding_dimension,
            timeout,
        )?);
        let store = SqliteChunkStore::open(retrieval.store_path.clone()).await?;
        let chunks = store.count(&retrieval.collection_name).await?;
        if chunks == 0 {
            tracing::warn!(
                "Collection '{}' in {} has no chunks; every retrieval will come back empty",
                retrieval.collection_name,
                store.db_path().display()
            );
        } else {
            tracing::info!(
                "Using {} chunks from '{}' in {}",
                chunks,
                retrieval.collection_name,
                store.db_path().display()
            );
        }
        let retriever = Arc::new(VectorRetriever::new(
            embedder,
            store,
            retrieval.collection_name.clone(),
        ));

        let web_search = Arc::new(HttpWebSearch::from_config(&config.web_search)?);

        Ok(Self {
            retriever,
            generator,
            reformulator,
            grader: Arc::new(LlmGrader::new(evaluator, prompts)),
            web_search,
        })
    }
}

/// Result of one dispatched question.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunReport {
    Offline(OfflineAnswer),
    Online(OnlineAnswer),
}

impl RunReport {
    pub fn answer(&self) -> &str {
        match self {
            RunReport::Offline(result) => &result.answer,
            RunReport::Online(result) => &result.answer,
        }
    }
}

/// Entry point for callers: holds both controllers, builds per-query state on each call.
pub struct HelperAgent {
    offline: OfflineAgent,
    online: OnlineAgent,
}

impl HelperAgent {
    pub async fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        let prompts = Arc::new(PromptSet::load(config.agent.prompts_dir.as_deref())?);
        let collaborators = Collaborators::from_config(config, prompts.clone()).await?;
        Self::new(collaborators, prompts, config)
    }

    pub fn new(
        collaborators: Collaborators,
        prompts: Arc<PromptSet>,
        config: &AgentConfig,
    ) -> AgentResult<Self> {
        let attempts = AttemptPolicy::from_settings(&config.agent);

        let offline = OfflineAgent::new(
            OfflineCollaborators {
                retriever: collaborators.retriever.clone(),
                generator: collaborators.generator.clone(),
                reformulator: collaborators.reformulator,
                grader: collaborators.grader,
            },
            prompts.clone(),
            OfflineOptions {
                max_retries: config.offline.max_retries,
                top_k: config.retrieval.top_k,
                attempts,
            },
        )?;

        let registry = Arc::new(ToolRegistry::new(
            collaborators.retriever,
            collaborators.web_search,
            config.retrieval.top_k,
            config.web_search.max_results,
        ));
        let online = OnlineAgent::new(
            collaborators.generator,
            registry,
            prompts.system.clone(),
            OnlineOptions {
                max_iterations: config.online.max_iterations,
                attempts,
            },
        )?;

        Ok(Self { offline, online })
    }

    pub async fn run_offline(&self, question: &str) -> AgentResult<OfflineAnswer> {
        self.offline.run(question).await
    }

    pub async fn run_online(&self, question: &str) -> AgentResult<OnlineAnswer> {
        self.online.run(question).await
    }

    pub async fn run(&self, mode: Mode, question: &str) -> AgentResult<RunReport> {
        match mode {
            Mode::Offline => self.run_offline(question).await.map(RunReport::Offline),
            Mode::Online => self.run_online(question).await.map(RunReport::Online),
        }
    }
}
