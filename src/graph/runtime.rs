// Graph Runtime - petgraph based
// Type-safe StateGraph execution engine

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::node::{GraphError, Node, NodeOutput};

/// Edge condition for graph routing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeCondition {
    /// Always follow this edge (default edge)
    Always,
    /// Follow this edge when the node returns this condition
    OnCondition(String),
}

impl EdgeCondition {
    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }

    pub fn matches(&self, condition: Option<&str>) -> bool {
        match (self, condition) {
            (EdgeCondition::Always, None) => true,
            (EdgeCondition::OnCondition(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// petgraph-based StateGraph runtime over a state record `S`
pub struct GraphRuntime<S: Send> {
    graph: DiGraph<Box<dyn Node<S>>, EdgeCondition>,
    node_indices: HashMap<String, NodeIndex>,
    entry_node_id: String,
    /// Recursion limit; a run that reaches it fails instead of looping
    max_steps: usize,
}

impl<S: Send> GraphRuntime<S> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            entry_node_id: String::new(),
            max_steps: 50,
        }
    }

    pub fn add_node(&mut self, node: Box<dyn Node<S>>) -> NodeIndex {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        index
    }

    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        to: &str,
        condition: EdgeCondition,
    ) -> Result<(), GraphError> {
        let from_idx = self
            .node_indices
            .get(from)
            .ok_or_else(|| GraphError::new(from, format!("Source node not found: {}", from)))?;
        let to_idx = self
            .node_indices
            .get(to)
            .ok_or_else(|| GraphError::new(to, format!("Target node not found: {}", to)))?;

        self.graph.add_edge(*from_idx, *to_idx, condition);
        Ok(())
    }

    /// Execute the graph to completion.
    ///
    /// Returns the ids of the nodes executed, in order.
    pub async fn run(&self, state: &mut S) -> Result<Vec<String>, GraphError> {
        if self.entry_node_id.is_empty() {
            return Err(GraphError::new("runtime", "No entry node set"));
        }

        let mut current_idx = *self.node_indices.get(&self.entry_node_id).ok_or_else(|| {
            GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.entry_node_id),
            )
        })?;

        let mut trace: Vec<String> = Vec::new();

        loop {
            if trace.len() >= self.max_steps {
                return Err(GraphError::new(
                    "runtime",
                    format!("Maximum steps ({}) exceeded", self.max_steps),
                )
                .with_trace(trace));
            }

            let node = self
                .graph
                .node_weight(current_idx)
                .ok_or_else(|| GraphError::new("runtime", "Node not found in graph"))?;

            let node_id = node.id();
            tracing::debug!(
                "Executing node: {} [{}] (step {})",
                node.name(),
                node_id,
                trace.len()
            );

            let output = match node.execute(state).await {
                Ok(output) => output,
                Err(err) => return Err(err.with_trace(trace)),
            };
            trace.push(node_id.to_string());

            let next = match output {
                NodeOutput::Final => {
                    tracing::debug!("Graph execution complete at node: {}", node_id);
                    return Ok(trace);
                }
                NodeOutput::Continue(explicit_next) => {
                    self.resolve_next_node(current_idx, None, explicit_next.as_deref())
                }
                NodeOutput::Branch(condition) => {
                    self.resolve_next_node(current_idx, Some(&condition), None)
                }
            };
            current_idx = next.map_err(|err| err.with_trace(trace.clone()))?;
        }
    }

    fn resolve_next_node(
        &self,
        current_idx: NodeIndex,
        condition: Option<&str>,
        explicit: Option<&str>,
    ) -> Result<NodeIndex, GraphError> {
        let current_id = self
            .graph
            .node_weight(current_idx)
            .map(|n| n.id())
            .unwrap_or("unknown");

        if let Some(next_id) = explicit {
            return self.node_indices.get(next_id).copied().ok_or_else(|| {
                GraphError::new(current_id, format!("Explicit target node not found: {}", next_id))
            });
        }

        let edges: Vec<(NodeIndex, &EdgeCondition)> = self
            .graph
            .edges_directed(current_idx, Direction::Outgoing)
            .map(|edge_ref| (edge_ref.target(), edge_ref.weight()))
            .collect();

        if edges.is_empty() {
            return Err(GraphError::new(
                current_id,
                format!("No outgoing edges from node: {}", current_id),
            ));
        }

        if let Some((target_idx, _)) = edges.iter().find(|(_, weight)| weight.matches(condition)) {
            return Ok(*target_idx);
        }

        // Fall back to default (Always) edge
        if let Some((target_idx, _)) = edges
            .iter()
            .find(|(_, weight)| **weight == EdgeCondition::Always)
        {
            if let Some(cond) = condition {
                tracing::warn!(
                    "Condition '{}' not matched for node '{}', using default edge",
                    cond,
                    current_id
                );
            }
            return Ok(*target_idx);
        }

        Err(GraphError::new(
            current_id,
            format!(
                "No matching edge for condition: {:?}",
                condition.unwrap_or("(none)")
            ),
        ))
    }
}

impl<S: Send> Default for GraphRuntime<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing graphs fluently
pub struct GraphBuilder<S: Send> {
    runtime: GraphRuntime<S>,
    pending_edges: Vec<(String, String, EdgeCondition)>,
}

impl<S: Send> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            runtime: GraphRuntime::new(),
            pending_edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.runtime.entry_node_id = node_id.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.max_steps = max_steps;
        self
    }

    pub fn node(mut self, node: Box<dyn Node<S>>) -> Self {
        self.runtime.add_node(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::Always));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::on(condition)));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime<S>, GraphError> {
        for (from, to, condition) in self.pending_edges {
            self.runtime.add_conditional_edge(&from, &to, condition)?;
        }
        Ok(self.runtime)
    }
}

impl<S: Send> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Counter {
        value: usize,
    }

    struct Increment;

    #[async_trait]
    impl Node<Counter> for Increment {
        fn id(&self) -> &'static str {
            "increment"
        }

        async fn execute(&self, state: &mut Counter) -> Result<NodeOutput, GraphError> {
            state.value += 1;
            if state.value >= 3 {
                Ok(NodeOutput::Branch("done".to_string()))
            } else {
                Ok(NodeOutput::Continue(None))
            }
        }
    }

    struct Finish;

    #[async_trait]
    impl Node<Counter> for Finish {
        fn id(&self) -> &'static str {
            "finish"
        }

        async fn execute(&self, _state: &mut Counter) -> Result<NodeOutput, GraphError> {
            Ok(NodeOutput::Final)
        }
    }

    struct Loop;

    #[async_trait]
    impl Node<Counter> for Loop {
        fn id(&self) -> &'static str {
            "loop"
        }

        async fn execute(&self, state: &mut Counter) -> Result<NodeOutput, GraphError> {
            state.value += 1;
            Ok(NodeOutput::Continue(None))
        }
    }

    #[test]
    fn test_edge_condition_matching() {
        assert!(EdgeCondition::Always.matches(None));
        assert!(!EdgeCondition::Always.matches(Some("done")));

        assert!(EdgeCondition::on("done").matches(Some("done")));
        assert!(!EdgeCondition::on("done").matches(Some("again")));
        assert!(!EdgeCondition::on("done").matches(None));
    }

    #[tokio::test]
    async fn runs_self_loop_until_branch() {
        let graph = GraphBuilder::<Counter>::new()
            .entry("increment")
            .node(Box::new(Increment))
            .node(Box::new(Finish))
            .edge("increment", "increment")
            .conditional_edge("increment", "finish", "done")
            .build()
            .unwrap();

        let mut state = Counter::default();
        let trace = graph.run(&mut state).await.unwrap();

        assert_eq!(state.value, 3);
        assert_eq!(trace, vec!["increment", "increment", "increment", "finish"]);
    }

    #[tokio::test]
    async fn max_steps_stops_runaway_graph() {
        let graph = GraphBuilder::<Counter>::new()
            .entry("loop")
            .max_steps(5)
            .node(Box::new(Loop))
            .edge("loop", "loop")
            .build()
            .unwrap();

        let mut state = Counter::default();
        let err = graph.run(&mut state).await.unwrap_err();

        assert_eq!(state.value, 5);
        assert_eq!(err.node_id, "runtime");
        assert_eq!(err.execution_trace.len(), 5);
    }

    #[test]
    fn unknown_edge_target_fails_build() {
        let result = GraphBuilder::<Counter>::new()
            .entry("loop")
            .node(Box::new(Loop))
            .edge("loop", "missing")
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_entry_is_an_error() {
        let graph = GraphBuilder::<Counter>::new()
            .node(Box::new(Loop))
            .build()
            .unwrap();
        let mut state = Counter::default();
        assert!(graph.run(&mut state).await.is_err());
    }
}
