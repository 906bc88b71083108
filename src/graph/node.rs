// Controller steps
// A step mutates its controller's state record and names where to go next

use async_trait::async_trait;
use thiserror::Error;

/// Where the runtime goes after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutput {
    /// Follow the explicitly named node, or the `Always` edge when `None`.
    Continue(Option<String>),
    /// Follow the outgoing edge labelled with this condition.
    Branch(String),
    /// Stop; the state record holds the result.
    Final,
}

/// A failed step, or a wiring problem found by the runtime.
#[derive(Debug, Clone, Error)]
#[error("step `{node_id}` failed{}: {message}", render_trace(.execution_trace))]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    /// Steps completed before the failure, oldest first.
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.execution_trace = trace;
        self
    }
}

fn render_trace(trace: &[String]) -> String {
    if trace.is_empty() {
        String::new()
    } else {
        format!(" after {}", trace.join(" -> "))
    }
}

/// One step of a controller over state record `S`.
#[async_trait]
pub trait Node<S: Send>: Send + Sync {
    /// Edge label and trace entry for this step.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str {
        self.id()
    }

    async fn execute(&self, state: &mut S) -> Result<NodeOutput, GraphError>;
}
