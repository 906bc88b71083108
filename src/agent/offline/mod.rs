//! Self-correcting retrieval controller ("offline" mode).
//!
//! Answers from the local corpus only. Each cycle retrieves, generates and
//! has the grader judge the answer; ungrounded answers trigger a query
//! reformulation until the retry budget runs out. The last answer is always
//! returned, with its grounding flag.

pub mod nodes;
pub mod state;

use std::sync::Arc;

use serde::Serialize;

use super::attempts::AttemptPolicy;
use super::grader::Grader;
use super::prompts::PromptSet;
use crate::core::config::MAX_RETRIES;
use crate::core::errors::AgentResult;
use crate::graph::{GraphBuilder, GraphRuntime};
use crate::llm::Generator;
use crate::rag::Retriever;
use nodes::{
    EvaluateNode, GenerateNode, ReformulateNode, RetrieveNode, EVALUATE, GENERATE, REFORMULATE,
    RETRIEVE,
};
pub use state::{Grounding, OfflineState};

/// Collaborators the controller calls.
#[derive(Clone)]
pub struct OfflineCollaborators {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub reformulator: Arc<dyn Generator>,
    pub grader: Arc<dyn Grader>,
}

#[derive(Debug, Clone, Copy)]
pub struct OfflineOptions {
    pub max_retries: u32,
    pub top_k: usize,
    pub attempts: AttemptPolicy,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            top_k: 5,
            attempts: AttemptPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OfflineAnswer {
    pub answer: String,
    pub is_grounded: bool,
    pub retries_used: u32,
    /// Steps executed, in order.
    pub trace: Vec<String>,
}

pub struct OfflineAgent {
    graph: GraphRuntime<OfflineState>,
}

impl OfflineAgent {
    pub fn new(
        collaborators: OfflineCollaborators,
        prompts: Arc<PromptSet>,
        options: OfflineOptions,
    ) -> AgentResult<Self> {
        // Worst case: max_retries + 1 full cycles plus max_retries reformulations.
        let max_steps = 4 * (options.max_retries as usize + 1);

        let graph = GraphBuilder::<OfflineState>::new()
            .entry(RETRIEVE)
            .max_steps(max_steps)
            .node(Box::new(RetrieveNode::new(
                collaborators.retriever,
                options.top_k,
                options.attempts,
            )))
            .node(Box::new(GenerateNode::new(
                collaborators.generator,
                prompts.clone(),
                options.attempts,
            )))
            .node(Box::new(EvaluateNode::new(
                collaborators.grader,
                options.max_retries,
                options.attempts,
            )))
            .node(Box::new(ReformulateNode::new(
                collaborators.reformulator,
                prompts,
                options.attempts,
            )))
            .edge(RETRIEVE, GENERATE)
            .edge(GENERATE, EVALUATE)
            .conditional_edge(EVALUATE, REFORMULATE, REFORMULATE)
            .edge(REFORMULATE, RETRIEVE)
            .build()?;

        Ok(Self { graph })
    }

    pub async fn run(&self, question: &str) -> AgentResult<OfflineAnswer> {
        tracing::info!("Offline run started: {}", question);
        let mut state = OfflineState::new(question);
        let trace = self.graph.run(&mut state).await?;

        let answer = OfflineAnswer {
            answer: state.answer().to_string(),
            is_grounded: state.is_grounded() == Grounding::Grounded,
            retries_used: state.retry_count(),
            trace,
        };
        tracing::info!(
            "Offline run finished (grounded: {}, reformulations: {})",
            answer.is_grounded,
            answer.retries_used
        );
        Ok(answer)
    }
}
