//! Groundedness judge.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::parsing::parse_json_from_text;
use super::prompts::{format_context, render, PromptSet};
use crate::core::errors::AgentResult;
use crate::llm::{ChatMessage, Generator};
use crate::rag::Passage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Grounded,
    NotGrounded,
    /// The judge answered, but not in a form we can read.
    Unparseable,
}

#[async_trait]
pub trait Grader: Send + Sync {
    async fn judge(&self, question: &str, answer: &str, context: &[Passage])
        -> AgentResult<Verdict>;
}

/// Asks a model whether the answer is supported by the passages.
pub struct LlmGrader {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptSet>,
}

impl LlmGrader {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptSet>) -> Self {
        Self { generator, prompts }
    }
}

#[async_trait]
impl Grader for LlmGrader {
    async fn judge(
        &self,
        question: &str,
        answer: &str,
        context: &[Passage],
    ) -> AgentResult<Verdict> {
        let context = format_context(context);
        let prompt = render(
            &self.prompts.evaluate,
            &[("context", context.as_str()), ("question", question), ("answer", answer)],
        );
        let raw = self.generator.complete(&[ChatMessage::user(prompt)]).await?;
        let verdict = parse_verdict(&raw);
        tracing::debug!("Grader ({}) verdict: {:?}", self.generator.name(), verdict);
        Ok(verdict)
    }
}

pub fn parse_verdict(raw: &str) -> Verdict {
    if let Some(value) = parse_json_from_text(raw).filter(Value::is_object) {
        let flag = ["is_grounded", "is_confident"]
            .iter()
            .find_map(|key| value.get(*key).and_then(as_flag));
        return match flag {
            Some(true) => Verdict::Grounded,
            Some(false) => Verdict::NotGrounded,
            None => Verdict::Unparseable,
        };
    }

    match raw.trim().trim_matches(|c| c == '"' || c == '.').to_ascii_lowercase().as_str() {
        "grounded" | "true" | "yes" => Verdict::Grounded,
        "not_grounded" | "not grounded" | "false" | "no" => Verdict::NotGrounded,
        _ => Verdict::Unparseable,
    }
}

// Models sometimes quote booleans.
fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
