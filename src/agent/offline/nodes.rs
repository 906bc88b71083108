// Self-correcting retrieval steps
// Retrieve -> Generate -> Evaluate -> (Reformulate -> Retrieve)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::state::{Grounding, OfflineState};
use crate::agent::attempts::{step_failure, with_attempts, AttemptPolicy};
use crate::agent::grader::{Grader, Verdict};
use crate::agent::parsing::parse_json_from_text;
use crate::agent::prompts::{format_context, render, PromptSet};
use crate::graph::{GraphError, Node, NodeOutput};
use crate::llm::{ChatMessage, Generator};
use crate::rag::Retriever;

pub const RETRIEVE: &str = "retrieve";
pub const GENERATE: &str = "generate";
pub const EVALUATE: &str = "evaluate";
pub const REFORMULATE: &str = "reformulate";

pub struct RetrieveNode {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    attempts: AttemptPolicy,
}

impl RetrieveNode {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize, attempts: AttemptPolicy) -> Self {
        Self {
            retriever,
            top_k,
            attempts,
        }
    }
}

#[async_trait]
impl Node<OfflineState> for RetrieveNode {
    fn id(&self) -> &'static str {
        RETRIEVE
    }

    fn name(&self) -> &'static str {
        "Retrieve Documents"
    }

    async fn execute(&self, state: &mut OfflineState) -> Result<NodeOutput, GraphError> {
        let query = state.take_query();
        let passages = with_attempts(self.attempts, "retrieval", || {
            self.retriever.search(&query, self.top_k)
        })
        .await
        .map_err(|e| step_failure(self.id(), e))?;

        tracing::debug!("Retrieved {} passages for query: {}", passages.len(), query);
        state.set_context(passages);
        Ok(NodeOutput::Continue(None))
    }
}

pub struct GenerateNode {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptSet>,
    attempts: AttemptPolicy,
}

impl GenerateNode {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptSet>, attempts: AttemptPolicy) -> Self {
        Self {
            generator,
            prompts,
            attempts,
        }
    }
}

#[async_trait]
impl Node<OfflineState> for GenerateNode {
    fn id(&self) -> &'static str {
        GENERATE
    }

    fn name(&self) -> &'static str {
        "Generate Answer"
    }

    async fn execute(&self, state: &mut OfflineState) -> Result<NodeOutput, GraphError> {
        let context = format_context(state.retrieved_context());
        let messages = vec![
            ChatMessage::system(render(&self.prompts.generate, &[("context", context.as_str())])),
            ChatMessage::user(state.question()),
        ];

        let answer = with_attempts(self.attempts, "generation", || {
            self.generator.complete(&messages)
        })
        .await
        .map_err(|e| step_failure(self.id(), e))?;

        state.set_answer(answer.trim().to_string());
        Ok(NodeOutput::Continue(None))
    }
}

pub struct EvaluateNode {
    grader: Arc<dyn Grader>,
    max_retries: u32,
    attempts: AttemptPolicy,
}

impl EvaluateNode {
    pub fn new(grader: Arc<dyn Grader>, max_retries: u32, attempts: AttemptPolicy) -> Self {
        Self {
            grader,
            max_retries,
            attempts,
        }
    }
}

#[async_trait]
impl Node<OfflineState> for EvaluateNode {
    fn id(&self) -> &'static str {
        EVALUATE
    }

    fn name(&self) -> &'static str {
        "Evaluate Grounding"
    }

    async fn execute(&self, state: &mut OfflineState) -> Result<NodeOutput, GraphError> {
        let verdict = with_attempts(self.attempts, "grading", || {
            self.grader
                .judge(state.question(), state.answer(), state.retrieved_context())
        })
        .await
        .map_err(|e| step_failure(self.id(), e))?;

        let grounding = match verdict {
            Verdict::Grounded => Grounding::Grounded,
            Verdict::NotGrounded => Grounding::NotGrounded,
            Verdict::Unparseable => {
                tracing::warn!("Grader output was unparseable; treating answer as not grounded");
                Grounding::NotGrounded
            }
        };
        state.set_grounding(grounding);

        if grounding == Grounding::Grounded {
            tracing::debug!("Answer grounded after {} reformulations", state.retry_count());
            return Ok(NodeOutput::Final);
        }
        if state.retry_count() >= self.max_retries {
            tracing::debug!("Retry budget ({}) spent; keeping last answer", self.max_retries);
            return Ok(NodeOutput::Final);
        }
        Ok(NodeOutput::Branch(REFORMULATE.to_string()))
    }
}

pub struct ReformulateNode {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptSet>,
    attempts: AttemptPolicy,
}

impl ReformulateNode {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptSet>, attempts: AttemptPolicy) -> Self {
        Self {
            generator,
            prompts,
            attempts,
        }
    }
}

#[async_trait]
impl Node<OfflineState> for ReformulateNode {
    fn id(&self) -> &'static str {
        REFORMULATE
    }

    fn name(&self) -> &'static str {
        "Reformulate Query"
    }

    async fn execute(&self, state: &mut OfflineState) -> Result<NodeOutput, GraphError> {
        let context = format_context(state.retrieved_context());
        let prompt = render(
            &self.prompts.reformulate,
            &[
                ("question", state.question()),
                ("query", state.last_query()),
                ("answer", state.answer()),
                ("context", context.as_str()),
            ],
        );
        let messages = [ChatMessage::user(prompt)];

        let raw = with_attempts(self.attempts, "reformulation", || {
            self.generator.complete(&messages)
        })
        .await
        .map_err(|e| step_failure(self.id(), e))?;

        let query = parse_reformulation(&raw).unwrap_or_else(|| {
            tracing::warn!("Reformulation produced no query; reusing the previous one");
            state.last_query().to_string()
        });
        state.record_reformulation(query);
        tracing::debug!(
            "Reformulation {}: {}",
            state.retry_count(),
            state.reformulated_question().unwrap_or_default()
        );
        Ok(NodeOutput::Continue(None))
    }
}

/// Revised query from the reformulator's reply: the JSON `reformulated_query`
/// field when a JSON object is present, otherwise the trimmed text.
pub fn parse_reformulation(raw: &str) -> Option<String> {
    let query = match parse_json_from_text(raw) {
        Some(Value::Object(map)) => map
            .get("reformulated_query")
            .and_then(Value::as_str)
            .map(str::to_string)?,
        _ => raw.to_string(),
    };
    let query = query.trim().trim_matches('"').trim();
    (!query.is_empty()).then(|| query.to_string())
}
