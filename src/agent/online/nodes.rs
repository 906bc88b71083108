// Tool-using reasoning steps
// Reason -> (Act -> Reason)

use std::sync::Arc;

use async_trait::async_trait;

use super::state::{OnlineOutcome, OnlineState};
use crate::agent::attempts::{step_failure, with_attempts, AttemptPolicy};
use crate::graph::{GraphError, Node, NodeOutput};
use crate::llm::{ChatMessage, Generator, ToolSpec};
use crate::tools::ToolRegistry;

pub const REASON: &str = "reason";
pub const ACT: &str = "act";

pub struct ReasonNode {
    generator: Arc<dyn Generator>,
    system_prompt: String,
    tools: Vec<ToolSpec>,
    max_iterations: usize,
    attempts: AttemptPolicy,
}

impl ReasonNode {
    pub fn new(
        generator: Arc<dyn Generator>,
        system_prompt: String,
        tools: Vec<ToolSpec>,
        max_iterations: usize,
        attempts: AttemptPolicy,
    ) -> Self {
        Self {
            generator,
            system_prompt,
            tools,
            max_iterations,
            attempts,
        }
    }
}

#[async_trait]
impl Node<OnlineState> for ReasonNode {
    fn id(&self) -> &'static str {
        REASON
    }

    fn name(&self) -> &'static str {
        "Reason"
    }

    async fn execute(&self, state: &mut OnlineState) -> Result<NodeOutput, GraphError> {
        let mut messages = Vec::with_capacity(state.message_history().len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(state.message_history());

        let response = with_attempts(self.attempts, "tool-aware completion", || {
            self.generator.complete_with_tools(&messages, &self.tools)
        })
        .await
        .map_err(|e| step_failure(self.id(), e))?;

        let requested = response.tool_calls.len();
        state.push_reasoning(response.text, response.tool_calls);

        if requested == 0 {
            tracing::debug!("No tool calls requested; answering");
            state.finish(OnlineOutcome::Answered);
            return Ok(NodeOutput::Final);
        }
        if state.act_steps() >= self.max_iterations {
            tracing::warn!(
                "Iteration ceiling ({}) reached with {} tool call(s) still requested",
                self.max_iterations,
                requested
            );
            state.finish(OnlineOutcome::IterationLimit);
            return Ok(NodeOutput::Final);
        }

        tracing::debug!("Model requested {} tool call(s)", requested);
        Ok(NodeOutput::Branch(ACT.to_string()))
    }
}

pub struct ActNode {
    registry: Arc<ToolRegistry>,
}

impl ActNode {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node<OnlineState> for ActNode {
    fn id(&self) -> &'static str {
        ACT
    }

    fn name(&self) -> &'static str {
        "Execute Tools"
    }

    async fn execute(&self, state: &mut OnlineState) -> Result<NodeOutput, GraphError> {
        // Calls run one at a time, in the order the model asked for them.
        for call in state.take_pending() {
            let execution = self.registry.execute(&call).await;
            tracing::debug!(
                "Tool `{}` finished (error: {})",
                execution.tool_name,
                execution.is_error
            );
            state.push_tool_result(execution.call_id, execution.output);
        }
        Ok(NodeOutput::Continue(None))
    }
}
