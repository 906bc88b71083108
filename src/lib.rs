pub mod agent;
pub mod core;
pub mod graph;
pub mod llm;
pub mod rag;
pub mod tools;

#[cfg(test)]
mod testing;
