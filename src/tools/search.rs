//! Web search capabilities
//!
//! Two backends share the `web_search` name and result shape:
//! [`WebSearch`] uses DuckDuckGo through the daedra crate and needs no key,
//! [`TavilySearch`] calls the Tavily search API.
//!
//! Both return `{"query", "results": [{"title", "url", "snippet"}], "count"}`.

use crate::tools::error::CapabilityError;
use crate::tools::registry::Capability;
use crate::tools::WEB_SEARCH;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

fn search_schema(default_results: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            },
            "num_results": {
                "type": "integer",
                "description": "Maximum number of results to return",
                "default": default_results
            }
        },
        "required": ["query"]
    })
}

/// Pull `query` and `num_results` out of the call arguments.
fn parse_args(args: &Value, default_results: usize) -> Result<(String, usize), CapabilityError> {
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| CapabilityError::permanent(WEB_SEARCH, "missing or empty 'query' parameter"))?;

    let num_results = args
        .get("num_results")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default_results);

    Ok((query.to_string(), num_results))
}

fn results_payload(query: &str, results: Vec<Value>) -> Value {
    json!({
        "query": query,
        "count": results.len(),
        "results": results,
    })
}

/// Web search powered by daedra (DuckDuckGo backend).
pub struct WebSearch {
    max_results: usize,
}

impl WebSearch {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl Capability for WebSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for information using DuckDuckGo"
    }

    fn parameters_schema(&self) -> Value {
        search_schema(self.max_results)
    }

    async fn call(&self, args: Value) -> Result<Value, CapabilityError> {
        let (query, num_results) = parse_args(&args, self.max_results)?;

        let search_args = daedra::SearchArgs {
            query: query.clone(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        // daedra failures are network-side, so they are all retryable
        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| CapabilityError::transient(WEB_SEARCH, format!("Search failed: {}", e)))?;

        let results = response
            .data
            .iter()
            .take(num_results)
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "snippet": r.description
                })
            })
            .collect();

        Ok(results_payload(&query, results))
    }
}

pub const TAVILY_API_BASE: &str = "https://api.tavily.com";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Web search through the Tavily API.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Self {
        Self::with_base_url(api_key, TAVILY_API_BASE, max_results)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results,
        }
    }
}

#[async_trait]
impl Capability for TavilySearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information using Tavily"
    }

    fn parameters_schema(&self) -> Value {
        search_schema(self.max_results)
    }

    async fn call(&self, args: Value) -> Result<Value, CapabilityError> {
        let (query, num_results) = parse_args(&args, self.max_results)?;

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": num_results,
                "search_depth": "basic",
                "include_answer": false
            }))
            .send()
            .await
            .map_err(|e| CapabilityError::from_reqwest(WEB_SEARCH, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(WEB_SEARCH, status, &body));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::from_reqwest(WEB_SEARCH, &e))?;

        let results = parsed
            .results
            .into_iter()
            .take(num_results)
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "snippet": r.content
                })
            })
            .collect();

        Ok(results_payload(&query, results))
    }
}
