use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::provider::{Embedder, Generator};
use super::types::{ChatMessage, ChatRequest, ToolAwareResponse, ToolCall, ToolSpec};
use crate::core::config::ModelSettings;
use crate::core::errors::{AgentError, AgentResult};

/// Client for any OpenAI-compatible chat-completions endpoint
/// (Gemini's OpenAI surface, LM Studio, Ollama, vLLM, ...).
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    settings: ModelSettings,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        settings: ModelSettings,
        timeout: Duration,
    ) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgentError::llm)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            settings,
            client,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send_chat(&self, request: ChatRequest, tools: &[ToolSpec]) -> AgentResult<Value> {
        let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if !tools.is_empty() {
                let tools: Vec<Value> = tools.iter().map(wire_tool).collect();
                obj.insert("tools".to_string(), Value::Array(tools));
                obj.insert("tool_choice".to_string(), json!("auto"));
            }
        }

        let res = self
            .post("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(AgentError::llm)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AgentError::Llm(format!("chat completion failed ({}): {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(AgentError::llm)?;
        payload
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| AgentError::Llm("response carried no choices".to_string()))
    }
}

#[async_trait]
impl Generator for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        let request = ChatRequest::new(&self.settings, messages.to_vec());
        let message = self.send_chat(request, &[]).await?;
        Ok(message["content"].as_str().unwrap_or_default().to_string())
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> AgentResult<ToolAwareResponse> {
        let request = ChatRequest::new(&self.settings, messages.to_vec());
        let message = self.send_chat(request, tools).await?;
        Ok(parse_tool_aware_message(&message))
    }
}

/// Embedding client for the OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: Option<u32>,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        dimensions: Option<u32>,
        timeout: Duration,
    ) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgentError::retrieval)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.to_string(),
            dimensions,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> AgentResult<Vec<Vec<f32>>> {
        let mut body = json!({
            "model": self.model,
            "input": inputs,
        });
        if let (Some(dim), Some(obj)) = (self.dimensions, body.as_object_mut()) {
            obj.insert("dimensions".to_string(), json!(dim));
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(AgentError::retrieval)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AgentError::Retrieval(format!("embedding failed ({}): {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(AgentError::retrieval)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
                    embeddings.push(vec);
                }
            }
        }

        Ok(embeddings)
    }
}

fn wire_message(message: &ChatMessage) -> Value {
    let mut obj = json!({
        "role": message.role,
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                let arguments = match &call.arguments {
                    Value::String(raw) => raw.clone(),
                    other => other.to_string(),
                };
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": arguments },
                })
            })
            .collect();
        obj["tool_calls"] = Value::Array(calls);
    }
    if let Some(id) = &message.tool_call_id {
        obj["tool_call_id"] = json!(id);
    }
    obj
}

fn wire_tool(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

/// Decode an assistant message into text plus tool calls.
///
/// Arguments arrive as a JSON-encoded string; when that string does not decode
/// it is kept verbatim so the registry can report it as invalid.
pub fn parse_tool_aware_message(message: &Value) -> ToolAwareResponse {
    let text = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .map(|(index, call)| {
                    let id = call["id"]
                        .as_str()
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}_{}", index, uuid::Uuid::new_v4().simple()));
                    let name = call
                        .pointer("/function/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let arguments = match call.pointer("/function/arguments") {
                        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
                        Some(Value::String(raw)) => serde_json::from_str(raw)
                            .unwrap_or_else(|_| Value::String(raw.clone())),
                        Some(other) => other.clone(),
                        None => json!({}),
                    };
                    ToolCall { id, name, arguments }
                })
                .collect()
        })
        .unwrap_or_default();

    ToolAwareResponse { text, tool_calls }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_only_message() {
        let parsed = parse_tool_aware_message(&json!({ "role": "assistant", "content": "Done." }));
        assert_eq!(parsed.text, "Done.");
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn parses_tool_calls_in_order() {
        let parsed = parse_tool_aware_message(&json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                { "id": "a", "type": "function", "function": { "name": "search_documentation", "arguments": "{\"query\":\"StateGraph\"}" } },
                { "id": "b", "type": "function", "function": { "name": "web_search", "arguments": "{\"query\":\"langgraph release\"}" } }
            ]
        }));

        assert_eq!(parsed.text, "");
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].name, "search_documentation");
        assert_eq!(parsed.tool_calls[0].arguments, json!({ "query": "StateGraph" }));
        assert_eq!(parsed.tool_calls[1].id, "b");
    }

    #[test]
    fn keeps_undecodable_arguments_raw_and_fills_missing_id() {
        let parsed = parse_tool_aware_message(&json!({
            "tool_calls": [ { "function": { "name": "web_search", "arguments": "{query:" } } ]
        }));

        let call = &parsed.tool_calls[0];
        assert!(call.id.starts_with("call_0_"));
        assert_eq!(call.arguments, Value::String("{query:".to_string()));
    }

    #[test]
    fn wire_message_encodes_tool_calls_and_results() {
        let assistant = ChatMessage::assistant(
            "",
            vec![ToolCall {
                id: "c1".to_string(),
                name: "web_search".to_string(),
                arguments: json!({ "query": "x" }),
            }],
        );
        let wire = wire_message(&assistant);
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], "{\"query\":\"x\"}");

        let result = wire_message(&ChatMessage::tool_result("c1", "ok"));
        assert_eq!(result["role"], "tool");
        assert_eq!(result["tool_call_id"], "c1");
    }
}
