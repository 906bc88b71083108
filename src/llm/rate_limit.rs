//! Request and token budgets shared by every generator of one agent.
//!
//! Calls wait for capacity instead of failing, mirroring how the upstream
//! APIs are metered (requests per minute and tokens per minute).

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use super::provider::Generator;
use super::types::{ChatMessage, ChatRequest, ToolAwareResponse, ToolSpec};
use crate::core::config::types::RateLimitConfig;
use crate::core::config::ModelSettings;
use crate::core::errors::AgentResult;

pub struct RateBudget {
    requests: DefaultDirectRateLimiter,
    tokens: DefaultDirectRateLimiter,
    tokens_per_minute: NonZeroU32,
}

impl RateBudget {
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let tpm = NonZeroU32::new(tokens_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            requests: RateLimiter::direct(Quota::per_minute(rpm)),
            tokens: RateLimiter::direct(Quota::per_minute(tpm)),
            tokens_per_minute: tpm,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Option<Arc<Self>> {
        config
            .enabled
            .then(|| Arc::new(Self::new(config.requests_per_minute, config.tokens_per_minute)))
    }

    /// Wait until one request and `estimated_tokens` tokens fit in the budget.
    pub async fn acquire(&self, estimated_tokens: u32) {
        self.requests.until_ready().await;

        // A single request larger than the whole minute budget waits for a full bucket.
        let clamped = estimated_tokens.clamp(1, self.tokens_per_minute.get());
        let cost = NonZeroU32::new(clamped).unwrap_or(NonZeroU32::MIN);
        if self.tokens.until_n_ready(cost).await.is_err() {
            tracing::warn!("Token estimate {} exceeds the per-minute budget", estimated_tokens);
        }
    }
}

/// Generator decorator that waits on a shared [`RateBudget`] before each call.
pub struct RateLimitedGenerator {
    inner: Arc<dyn Generator>,
    budget: Arc<RateBudget>,
    settings: ModelSettings,
}

impl RateLimitedGenerator {
    pub fn new(inner: Arc<dyn Generator>, budget: Arc<RateBudget>, settings: ModelSettings) -> Self {
        Self {
            inner,
            budget,
            settings,
        }
    }

    async fn wait_for(&self, messages: &[ChatMessage]) {
        let estimate = ChatRequest::new(&self.settings, messages.to_vec()).estimated_tokens();
        tracing::debug!("Rate budget: waiting for ~{} tokens", estimate);
        self.budget.acquire(estimate).await;
    }
}

#[async_trait]
impl Generator for RateLimitedGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        self.wait_for(messages).await;
        self.inner.complete(messages).await
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> AgentResult<ToolAwareResponse> {
        self.wait_for(messages).await;
        self.inner.complete_with_tools(messages, tools).await
    }
}
