//! Deterministic stand-ins for the external collaborators, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::grader::{Grader, Verdict};
use crate::core::errors::{AgentError, AgentResult};
use crate::llm::{ChatMessage, Generator, ToolAwareResponse, ToolCall, ToolSpec};
use crate::rag::{Passage, Retriever};
use crate::tools::search::{WebResult, WebSearch};

#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Tools(ToolAwareResponse),
    Fail(String),
}

impl Scripted {
    pub fn tool_call(name: &str, query: &str) -> Self {
        Scripted::Tools(ToolAwareResponse {
            text: String::new(),
            tool_calls: vec![tool_call(name, query)],
        })
    }
}

pub fn tool_call(name: &str, query: &str) -> ToolCall {
    ToolCall {
        id: format!("{}:{}", name, query),
        name: name.to_string(),
        arguments: json!({ "query": query }),
    }
}

/// Replays a fixed script; once exhausted it repeats `fallback` or fails.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Scripted::Text(t.into())).collect())
    }

    pub fn repeating(item: Scripted) -> Self {
        Self {
            fallback: Some(item),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages received by each call, in call order.
    pub fn seen(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }

    fn next(&self, messages: &[ChatMessage]) -> AgentResult<Scripted> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        let item = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| AgentError::Llm("script exhausted".to_string()))?;
        match item {
            Scripted::Fail(message) => Err(AgentError::Llm(message)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String> {
        match self.next(messages)? {
            Scripted::Text(text) => Ok(text),
            Scripted::Tools(response) => Ok(response.text),
            Scripted::Fail(_) => unreachable!(),
        }
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> AgentResult<ToolAwareResponse> {
        match self.next(messages)? {
            Scripted::Text(text) => Ok(ToolAwareResponse {
                text,
                tool_calls: Vec::new(),
            }),
            Scripted::Tools(response) => Ok(response),
            Scripted::Fail(_) => unreachable!(),
        }
    }
}

/// Returns the same passages for every query and records the queries.
pub struct StaticRetriever {
    passages: Vec<Passage>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}

/// Fails the first `failures` searches, then behaves like [`StaticRetriever`].
pub struct FlakyRetriever {
    failures: AtomicUsize,
    inner: StaticRetriever,
}

impl FlakyRetriever {
    pub fn new(failures: usize, passages: Vec<Passage>) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            inner: StaticRetriever::new(passages),
        }
    }
}

#[async_trait]
impl Retriever for FlakyRetriever {
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AgentError::Retrieval("vector store unavailable".to_string()));
        }
        self.inner.search(query, top_k).await
    }
}

pub struct StaticWebSearch {
    results: Vec<WebResult>,
}

impl StaticWebSearch {
    pub fn new(results: Vec<WebResult>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl WebSearch for StaticWebSearch {
    async fn search(&self, _query: &str, top_k: usize) -> AgentResult<Vec<WebResult>> {
        Ok(self.results.iter().take(top_k).cloned().collect())
    }
}

pub struct FailingWebSearch;

#[async_trait]
impl WebSearch for FailingWebSearch {
    async fn search(&self, _query: &str, _top_k: usize) -> AgentResult<Vec<WebResult>> {
        Err(AgentError::WebSearch("timeout".to_string()))
    }
}

/// Replays verdicts; once exhausted it keeps returning the last one.
pub struct ScriptedGrader {
    verdicts: Mutex<VecDeque<Verdict>>,
    last: Mutex<Verdict>,
    calls: AtomicUsize,
}

impl ScriptedGrader {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            last: Mutex::new(Verdict::NotGrounded),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(verdict: Verdict) -> Self {
        Self {
            last: Mutex::new(verdict),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Grader for ScriptedGrader {
    async fn judge(
        &self,
        _question: &str,
        _answer: &str,
        _context: &[Passage],
    ) -> AgentResult<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.verdicts.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(*last)
    }
}

pub fn passage(text: &str) -> Passage {
    Passage::new(text, "docs/test.md", 0.8)
}
