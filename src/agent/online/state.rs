use serde::Serialize;

use crate::llm::types::ROLE_ASSISTANT;
use crate::llm::{ChatMessage, ToolCall};

/// How a reasoning run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineOutcome {
    /// The model stopped requesting tools.
    Answered,
    /// The model still wanted tools when the iteration ceiling was reached.
    IterationLimit,
}

/// Per-query record threaded through the tool-using controller.
#[derive(Debug, Clone)]
pub struct OnlineState {
    question: String,
    message_history: Vec<ChatMessage>,
    pending_tool_calls: Vec<ToolCall>,
    reason_steps: usize,
    act_steps: usize,
    outcome: Option<OnlineOutcome>,
}

impl OnlineState {
    pub fn new(question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            message_history: vec![ChatMessage::user(question.clone())],
            question,
            pending_tool_calls: Vec::new(),
            reason_steps: 0,
            act_steps: 0,
            outcome: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn message_history(&self) -> &[ChatMessage] {
        &self.message_history
    }

    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        &self.pending_tool_calls
    }

    pub fn reason_steps(&self) -> usize {
        self.reason_steps
    }

    pub fn act_steps(&self) -> usize {
        self.act_steps
    }

    pub fn outcome(&self) -> Option<OnlineOutcome> {
        self.outcome
    }

    /// Record a model turn; its tool calls become the pending calls.
    pub fn push_reasoning(&mut self, text: String, tool_calls: Vec<ToolCall>) {
        self.reason_steps += 1;
        self.pending_tool_calls = tool_calls.clone();
        self.message_history.push(ChatMessage::assistant(text, tool_calls));
    }

    pub fn take_pending(&mut self) -> Vec<ToolCall> {
        self.act_steps += 1;
        std::mem::take(&mut self.pending_tool_calls)
    }

    pub fn push_tool_result(&mut self, call_id: String, content: String) {
        self.message_history.push(ChatMessage::tool_result(call_id, content));
    }

    pub fn finish(&mut self, outcome: OnlineOutcome) {
        self.outcome = Some(outcome);
    }

    /// Text of the closing assistant turn, if the transcript ends on one.
    pub fn final_text(&self) -> Option<&str> {
        self.message_history
            .last()
            .filter(|m| m.role == ROLE_ASSISTANT)
            .map(|m| m.content.trim())
    }

    /// Most recent non-empty assistant text.
    pub fn last_reasoning_text(&self) -> Option<&str> {
        self.message_history
            .iter()
            .rev()
            .filter(|m| m.role == ROLE_ASSISTANT)
            .map(|m| m.content.trim())
            .find(|text| !text.is_empty())
    }

    pub fn into_transcript(self) -> Vec<ChatMessage> {
        self.message_history
    }
}
