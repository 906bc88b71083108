use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::config::WebSearchConfig;
use crate::core::errors::{AgentError, AgentResult};

/// One web hit, normalised across providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebResult {
    pub snippet: String,
    pub url: String,
    pub score: f32,
}

/// Live web search boundary.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<WebResult>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchProvider {
    Tavily { api_key: String },
    Brave { api_key: String },
    Google { api_key: String, engine_id: String },
    DuckDuckGo,
}

impl SearchProvider {
    /// Providers needing credentials fall back to DuckDuckGo when none are configured.
    pub fn from_config(config: &WebSearchConfig) -> Self {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let engine_id = config
            .google_engine_id
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        match (config.provider.as_str(), api_key, engine_id) {
            ("tavily", Some(api_key), _) => SearchProvider::Tavily { api_key },
            ("brave", Some(api_key), _) => SearchProvider::Brave { api_key },
            ("google", Some(api_key), Some(engine_id)) => {
                SearchProvider::Google { api_key, engine_id }
            }
            ("duckduckgo", _, _) => SearchProvider::DuckDuckGo,
            (name, api_key, _) => {
                tracing::warn!(
                    "Web search provider '{}' {}, falling back to DuckDuckGo",
                    name,
                    fallback_reason(name, api_key.is_some())
                );
                SearchProvider::DuckDuckGo
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchProvider::Tavily { .. } => "tavily",
            SearchProvider::Brave { .. } => "brave",
            SearchProvider::Google { .. } => "google",
            SearchProvider::DuckDuckGo => "duckduckgo",
        }
    }
}

fn fallback_reason(provider: &str, has_api_key: bool) -> &'static str {
    match provider {
        "tavily" | "brave" => "has no web_search.api_key",
        "google" if has_api_key => "has no web_search.google_engine_id",
        "google" => "has no web_search.api_key",
        _ => "is not supported",
    }
}

pub struct HttpWebSearch {
    provider: SearchProvider,
    client: Client,
}

impl HttpWebSearch {
    pub fn new(provider: SearchProvider, timeout: Duration) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgentError::web_search)?;
        Ok(Self { provider, client })
    }

    pub fn from_config(config: &WebSearchConfig) -> AgentResult<Self> {
        Self::new(
            SearchProvider::from_config(config),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> AgentResult<Value> {
        let response = request.send().await.map_err(AgentError::web_search)?;
        if !response.status().is_success() {
            return Err(AgentError::WebSearch(format!(
                "{} search failed: {}",
                self.provider.as_str(),
                response.status()
            )));
        }
        response.json().await.map_err(AgentError::web_search)
    }
}

#[async_trait]
impl WebSearch for HttpWebSearch {
    async fn search(&self, query: &str, top_k: usize) -> AgentResult<Vec<WebResult>> {
        tracing::debug!("Web searching ({}) for {}", self.provider.as_str(), query);
        let results = match &self.provider {
            SearchProvider::Tavily { api_key } => {
                let request = self
                    .client
                    .post("https://api.tavily.com/search")
                    .bearer_auth(api_key)
                    .json(&json!({
                        "query": query,
                        "max_results": top_k,
                        "include_answer": true,
                    }));
                parse_tavily(&self.get_json(request).await?, top_k)
            }
            SearchProvider::Brave { api_key } => {
                let url = format!(
                    "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
                    urlencoding::encode(query),
                    top_k
                );
                let request = self
                    .client
                    .get(url)
                    .header("X-Subscription-Token", api_key)
                    .header("Accept", "application/json");
                parse_brave(&self.get_json(request).await?, top_k)
            }
            SearchProvider::Google { api_key, engine_id } => {
                let url = format!(
                    "https://www.googleapis.com/customsearch/v1?key={}&cx={}&q={}&num={}",
                    api_key,
                    engine_id,
                    urlencoding::encode(query),
                    top_k.min(10)
                );
                parse_google(&self.get_json(self.client.get(url)).await?, top_k)
            }
            SearchProvider::DuckDuckGo => {
                let url = format!(
                    "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
                    urlencoding::encode(query)
                );
                parse_duckduckgo(&self.get_json(self.client.get(url)).await?, top_k)
            }
        };
        Ok(results)
    }
}

struct Hit<'a> {
    title: &'a str,
    url: &'a str,
    content: &'a str,
    score: Option<f32>,
}

/// Fold title into the snippet; providers without scores get rank-derived ones.
fn normalise(hits: Vec<Hit<'_>>, top_k: usize) -> Vec<WebResult> {
    hits.into_iter()
        .filter(|hit| !hit.url.is_empty())
        .take(top_k)
        .enumerate()
        .map(|(rank, hit)| {
            let title = if hit.title.is_empty() {
                "Untitled result"
            } else {
                hit.title
            };
            WebResult {
                snippet: format!("**{}**\n{}", title, hit.content.trim()).trim().to_string(),
                url: hit.url.to_string(),
                score: hit.score.unwrap_or(1.0 / (rank as f32 + 1.0)),
            }
        })
        .collect()
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn parse_tavily(payload: &Value, top_k: usize) -> Vec<WebResult> {
    let hits = payload
        .get("results")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| Hit {
                    title: str_field(item, "title"),
                    url: str_field(item, "url"),
                    content: str_field(item, "content"),
                    score: item.get("score").and_then(|v| v.as_f64()).map(|s| s as f32),
                })
                .collect()
        })
        .unwrap_or_default();

    // The summary takes one of the top_k slots.
    let mut results = Vec::new();
    if let Some(summary) = payload.get("answer").and_then(|v| v.as_str()) {
        if top_k > 0 && !summary.trim().is_empty() {
            results.push(WebResult {
                snippet: format!("Summary: {}", summary.trim()),
                url: String::new(),
                score: 1.0,
            });
        }
    }
    results.extend(normalise(hits, top_k - results.len()));
    results
}

fn parse_brave(payload: &Value, top_k: usize) -> Vec<WebResult> {
    let hits = payload
        .pointer("/web/results")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| Hit {
                    title: str_field(item, "title"),
                    url: str_field(item, "url"),
                    content: str_field(item, "description"),
                    score: None,
                })
                .collect()
        })
        .unwrap_or_default();
    normalise(hits, top_k)
}

fn parse_google(payload: &Value, top_k: usize) -> Vec<WebResult> {
    let hits = payload
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| Hit {
                    title: str_field(item, "title"),
                    url: str_field(item, "link"),
                    content: str_field(item, "snippet"),
                    score: None,
                })
                .collect()
        })
        .unwrap_or_default();
    normalise(hits, top_k)
}

fn parse_duckduckgo(payload: &Value, top_k: usize) -> Vec<WebResult> {
    let mut hits = Vec::new();

    let abstract_text = str_field(payload, "AbstractText");
    let abstract_url = str_field(payload, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        hits.push(Hit {
            title: str_field(payload, "Heading"),
            url: abstract_url,
            content: abstract_text,
            score: None,
        });
    }

    for key in ["Results", "RelatedTopics"] {
        if let Some(items) = payload.get(key).and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut hits);
        }
    }

    normalise(hits, top_k)
}

fn extract_ddg_topics<'a>(items: &'a [Value], hits: &mut Vec<Hit<'a>>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, hits);
            continue;
        }
        let text = str_field(item, "Text");
        let url = str_field(item, "FirstURL");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        hits.push(Hit {
            title: text.split(" - ").next().unwrap_or(text),
            url,
            content: text,
            score: None,
        });
    }
}
