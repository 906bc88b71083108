//! Tool-using reasoning controller ("online" mode).
//!
//! The model reasons over the full transcript and may request tool calls;
//! results are appended as tool turns and the model reasons again. The loop
//! ends when the model stops asking for tools, or with an iteration-limit
//! outcome once the configured ceiling of tool rounds is spent.

pub mod nodes;
pub mod state;

use std::sync::Arc;

use serde::Serialize;

use super::attempts::AttemptPolicy;
use crate::core::config::DEFAULT_MAX_ITERATIONS;
use crate::core::errors::AgentResult;
use crate::graph::{GraphBuilder, GraphRuntime};
use crate::llm::{ChatMessage, Generator};
use crate::tools::ToolRegistry;
use nodes::{ActNode, ReasonNode, ACT, REASON};
pub use state::{OnlineOutcome, OnlineState};

const NO_ANSWER: &str = "No answer generated.";
const ITERATION_LIMIT_ANSWER: &str =
    "Agent reached the maximum number of iterations without a final answer.";

#[derive(Debug, Clone, Copy)]
pub struct OnlineOptions {
    /// Ceiling on tool rounds (ACT steps) per question.
    pub max_iterations: usize,
    pub attempts: AttemptPolicy,
}

impl Default for OnlineOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            attempts: AttemptPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OnlineAnswer {
    pub answer: String,
    pub transcript: Vec<ChatMessage>,
    pub outcome: OnlineOutcome,
    /// Tool rounds executed.
    pub iterations: usize,
}

pub struct OnlineAgent {
    graph: GraphRuntime<OnlineState>,
}

impl OnlineAgent {
    pub fn new(
        generator: Arc<dyn Generator>,
        registry: Arc<ToolRegistry>,
        system_prompt: String,
        options: OnlineOptions,
    ) -> AgentResult<Self> {
        let reason = ReasonNode::new(
            generator,
            system_prompt,
            registry.specs(),
            options.max_iterations,
            options.attempts,
        );

        let graph = GraphBuilder::<OnlineState>::new()
            .entry(REASON)
            .max_steps(2 * options.max_iterations + 2)
            .node(Box::new(reason))
            .node(Box::new(ActNode::new(registry)))
            .conditional_edge(REASON, ACT, ACT)
            .edge(ACT, REASON)
            .build()?;

        Ok(Self { graph })
    }

    pub async fn run(&self, question: &str) -> AgentResult<OnlineAnswer> {
        tracing::info!("Online run started: {}", question);
        let mut state = OnlineState::new(question);
        self.graph.run(&mut state).await?;

        let outcome = state.outcome().unwrap_or(OnlineOutcome::IterationLimit);
        let answer = match outcome {
            OnlineOutcome::Answered => state
                .final_text()
                .filter(|text| !text.is_empty())
                .unwrap_or(NO_ANSWER)
                .to_string(),
            OnlineOutcome::IterationLimit => state
                .last_reasoning_text()
                .unwrap_or(ITERATION_LIMIT_ANSWER)
                .to_string(),
        };
        let iterations = state.act_steps();
        tracing::info!(
            "Online run finished ({:?}; {} reasoning steps, {} tool rounds)",
            outcome,
            state.reason_steps(),
            iterations
        );

        Ok(OnlineAnswer {
            answer,
            transcript: state.into_transcript(),
            outcome,
            iterations,
        })
    }
}
