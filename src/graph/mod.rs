// Graph Module
// Minimal StateGraph runtime shared by both controllers

pub mod node;
pub mod runtime;

pub use node::{GraphError, Node, NodeOutput};
pub use runtime::{EdgeCondition, GraphBuilder, GraphRuntime};
