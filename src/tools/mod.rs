//! Tool registry for the tool-using controller.
//!
//! Two fixed capabilities: `search_documentation` (local retriever) and
//! `web_search` (live web). Dispatch never fails: malformed requests, unknown
//! tools and collaborator errors all come back as an error result the model
//! can read and react to.

pub mod search;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::llm::{ToolCall, ToolSpec};
use crate::rag::{Passage, Retriever};
use search::{WebResult, WebSearch};

pub const SEARCH_DOCUMENTATION: &str = "search_documentation";
pub const WEB_SEARCH: &str = "web_search";

const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Arguments shared by both tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// Natural-language search query.
    pub query: String,
}

/// Outcome of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub call_id: String,
    pub tool_name: String,
    pub output: String,
    pub is_error: bool,
}

pub struct ToolRegistry {
    retriever: Arc<dyn Retriever>,
    web_search: Arc<dyn WebSearch>,
    retrieval_top_k: usize,
    web_top_k: usize,
}

impl ToolRegistry {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        web_search: Arc<dyn WebSearch>,
        retrieval_top_k: usize,
        web_top_k: usize,
    ) -> Self {
        Self {
            retriever,
            web_search,
            retrieval_top_k,
            web_top_k,
        }
    }

    pub fn tool_names(&self) -> [&'static str; 2] {
        [SEARCH_DOCUMENTATION, WEB_SEARCH]
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let parameters = query_args_schema();
        vec![
            ToolSpec {
                name: SEARCH_DOCUMENTATION.to_string(),
                description: "Search the local LangChain / LangGraph knowledge base for API details or implementation guidance.".to_string(),
                parameters: parameters.clone(),
            },
            ToolSpec {
                name: WEB_SEARCH.to_string(),
                description: "Search the web for fresh, real-world information beyond the local docs.".to_string(),
                parameters,
            },
        ]
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolExecution {
        match self.try_execute(call).await {
            Ok(output) => ToolExecution {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                output,
                is_error: false,
            },
            Err(reason) => {
                tracing::warn!("Tool `{}` failed: {}", call.name, reason);
                ToolExecution {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    output: format!("Tool `{}` failed: {}", call.name, reason),
                    is_error: true,
                }
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<String, String> {
        if !self.tool_names().contains(&call.name.as_str()) {
            return Err(format!(
                "unknown tool '{}'; available tools: {}",
                call.name,
                self.tool_names().join(", ")
            ));
        }

        let args = parse_query_args(&call.arguments)?;

        match call.name.as_str() {
            SEARCH_DOCUMENTATION => {
                tracing::debug!("Searching documentation for {}", args.query);
                let passages = self
                    .retriever
                    .search(&args.query, self.retrieval_top_k)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(render_passages(&passages))
            }
            _ => {
                let results = self
                    .web_search
                    .search(&args.query, self.web_top_k)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(render_web_results(&results))
            }
        }
    }
}

fn parse_query_args(arguments: &Value) -> Result<QueryArgs, String> {
    if let Value::String(raw) = arguments {
        return Err(format!("arguments are not valid JSON: {}", raw));
    }
    let args: QueryArgs = serde_json::from_value(arguments.clone())
        .map_err(|e| format!("invalid arguments: {}", e))?;
    if args.query.trim().is_empty() {
        return Err("invalid arguments: `query` must not be empty".to_string());
    }
    Ok(args)
}

fn query_args_schema() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(QueryArgs))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

fn render_passages(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return "No relevant documentation found.".to_string();
    }
    passages
        .iter()
        .map(|p| format!("[{}] ({:.3})\n{}", p.source_id, p.score, p.text))
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

fn render_web_results(results: &[WebResult]) -> String {
    if results.is_empty() {
        return "No web results found.".to_string();
    }
    results
        .iter()
        .map(|r| {
            if r.url.is_empty() {
                r.snippet.clone()
            } else {
                format!("{}\nSource: {}", r.snippet, r.url)
            }
        })
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingWebSearch, StaticRetriever, StaticWebSearch};
    use serde_json::json;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call-1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(
            Arc::new(StaticRetriever::new(vec![Passage::new(
                "Use StateGraph.add_node",
                "graphs.md",
                0.9,
            )])),
            Arc::new(StaticWebSearch::new(vec![WebResult {
                snippet: "**News**\nLangGraph release".to_string(),
                url: "https://example.com".to_string(),
                score: 1.0,
            }])),
            5,
            5,
        )
    }

    #[tokio::test]
    async fn search_documentation_renders_passages() {
        let out = registry()
            .execute(&call(SEARCH_DOCUMENTATION, json!({ "query": "add node" })))
            .await;

        assert!(!out.is_error);
        assert_eq!(out.call_id, "call-1");
        assert_eq!(out.output, "[graphs.md] (0.900)\nUse StateGraph.add_node");
    }

    #[tokio::test]
    async fn web_search_renders_sources() {
        let out = registry()
            .execute(&call(WEB_SEARCH, json!({ "query": "release" })))
            .await;

        assert!(!out.is_error);
        assert!(out.output.ends_with("Source: https://example.com"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let out = registry()
            .execute(&call("delete_everything", json!({ "query": "x" })))
            .await;

        assert!(out.is_error);
        assert!(out.output.starts_with("Tool `delete_everything` failed: unknown tool"));
        assert!(out.output.contains("search_documentation, web_search"));
    }

    #[tokio::test]
    async fn missing_or_malformed_arguments_become_error_results() {
        let reg = registry();

        let missing = reg.execute(&call(WEB_SEARCH, json!({}))).await;
        assert!(missing.is_error);
        assert!(missing.output.contains("invalid arguments"));

        let blank = reg.execute(&call(WEB_SEARCH, json!({ "query": "  " }))).await;
        assert!(blank.is_error);

        let raw = reg
            .execute(&call(SEARCH_DOCUMENTATION, Value::String("{query:".to_string())))
            .await;
        assert!(raw.is_error);
        assert!(raw.output.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn collaborator_failure_becomes_error_result() {
        let reg = ToolRegistry::new(
            Arc::new(StaticRetriever::new(Vec::new())),
            Arc::new(FailingWebSearch),
            5,
            5,
        );

        let out = reg.execute(&call(WEB_SEARCH, json!({ "query": "x" }))).await;
        assert!(out.is_error);
        assert!(out.output.contains("web search error"));

        let empty = reg
            .execute(&call(SEARCH_DOCUMENTATION, json!({ "query": "x" })))
            .await;
        assert!(!empty.is_error);
        assert_eq!(empty.output, "No relevant documentation found.");
    }

    #[test]
    fn specs_expose_query_schema() {
        let specs = registry().specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, SEARCH_DOCUMENTATION);
        assert_eq!(specs[1].parameters["type"], "object");
        assert!(specs[1].parameters["properties"]["query"].is_object());
        assert_eq!(specs[1].parameters["required"], json!(["query"]));
    }
}
