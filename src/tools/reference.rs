//! Encyclopedia lookup against the Wikipedia REST summary endpoint.

use crate::tools::error::CapabilityError;
use crate::tools::registry::Capability;
use crate::tools::LOOKUP_REFERENCE;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

pub const WIKIPEDIA_BASE: &str = "https://en.wikipedia.org";

/// Longest term forwarded to the encyclopedia.
const MAX_TERM_CHARS: usize = 300;
const TRUNCATION_MARKER: &str = "... [content truncated]";

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

/// `lookup_reference(term) -> text | NotFound`.
///
/// A missing article is a successful `{"found": false}` result rather than an
/// error, so the searcher can record an empty hit without a retry.
pub struct ReferenceLookup {
    client: reqwest::Client,
    base_url: String,
    max_chars: usize,
}

impl ReferenceLookup {
    pub fn new(max_chars: usize) -> Self {
        Self::with_base_url(WIKIPEDIA_BASE, max_chars)
    }

    pub fn with_base_url(base_url: impl Into<String>, max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deep-research/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_chars,
        }
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, CapabilityError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CapabilityError::permanent(LOOKUP_REFERENCE, format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CapabilityError::permanent(LOOKUP_REFERENCE, "base url cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Canonical article link for a term, spaces replaced by underscores.
    pub fn article_url(&self, term: &str) -> Result<Url, CapabilityError> {
        self.url_for(&["wiki", &term.replace(' ', "_")])
    }
}

impl Default for ReferenceLookup {
    fn default() -> Self {
        Self::new(3000)
    }
}

/// Trim a term and cap it at [`MAX_TERM_CHARS`].
pub fn normalize_term(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TERM_CHARS).collect())
}

/// Cut `text` at `max_chars` characters, marking the cut.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[async_trait]
impl Capability for ReferenceLookup {
    fn name(&self) -> &str {
        LOOKUP_REFERENCE
    }

    fn description(&self) -> &str {
        "Look up a term in Wikipedia for background knowledge, definitions and historical context"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "term": {
                    "type": "string",
                    "description": "Term or article title to look up"
                }
            },
            "required": ["term"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, CapabilityError> {
        let term = args
            .get("term")
            .and_then(|v| v.as_str())
            .and_then(normalize_term)
            .ok_or_else(|| {
                CapabilityError::permanent(
                    LOOKUP_REFERENCE,
                    "Invalid query. Please provide a valid search term.",
                )
            })?;

        let url = self.url_for(&["api", "rest_v1", "page", "summary", &term.replace(' ', "_")])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CapabilityError::from_reqwest(LOOKUP_REFERENCE, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(json!({ "found": false, "term": term }));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(LOOKUP_REFERENCE, status, &body));
        }

        let summary: PageSummary = response
            .json()
            .await
            .map_err(|e| CapabilityError::from_reqwest(LOOKUP_REFERENCE, &e))?;

        if summary.extract.trim().is_empty() {
            return Ok(json!({ "found": false, "term": term }));
        }

        let source_url = match summary.content_urls.and_then(|c| c.desktop) {
            Some(desktop) => desktop.page,
            None => self.article_url(&term)?.to_string(),
        };
        let extract = truncate_content(&summary.extract, self.max_chars);
        let title = if summary.title.is_empty() {
            term.clone()
        } else {
            summary.title
        };

        Ok(json!({
            "found": true,
            "term": term,
            "title": title,
            "url": source_url,
            "extract": extract,
            "text": format!("{}\n\nSource: {}", extract, source_url),
        }))
    }
}
