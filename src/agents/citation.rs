use crate::agents::prompts::CITATION_PROMPT;
use crate::agents::{AgentError, ResearchAgent, StageOutput};
use crate::llm::LLMClient;
use crate::state::{CitationVerdict, ResearchState, RunWarning, SearchResult, StateDelta};
use crate::types::{Message, Phase};
use crate::utils::toml_config::WorkflowConfig;
use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of the automatic checks on one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Accept,
    Reject(String),
    /// Passed the hard checks but the snippet is too thin to judge.
    Ambiguous,
}

/// Rules on every source of the newest unchecked batch.
pub struct CitationAgent {
    llm: Arc<dyn LLMClient>,
    min_snippet_chars: usize,
    review_ambiguous: bool,
}

impl CitationAgent {
    pub fn new(llm: Arc<dyn LLMClient>, config: &WorkflowConfig) -> Self {
        Self {
            llm,
            min_snippet_chars: config.min_snippet_chars,
            review_ambiguous: config.review_ambiguous_citations,
        }
    }

    /// Hard checks. `seen` maps normalized URLs of accepted sources to their ids.
    pub fn screen(&self, result: &SearchResult, seen: &HashMap<String, String>) -> Screening {
        let Some(raw) = result.url.as_deref() else {
            return Screening::Reject("missing URL".to_string());
        };
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => return Screening::Reject(format!("unparseable URL: {}", e)),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Screening::Reject(format!("unsupported URL scheme '{}'", url.scheme()));
        }
        if let Some(original) = seen.get(&normalize_url(&url)) {
            return Screening::Reject(format!("duplicate of {}", original));
        }

        let snippet = result.snippet.trim();
        if snippet.is_empty() {
            return Screening::Reject("empty snippet".to_string());
        }
        if snippet.chars().count() < self.min_snippet_chars {
            return Screening::Ambiguous;
        }
        Screening::Accept
    }

    async fn review(&self, query: &str, result: &SearchResult) -> Result<CitationVerdict, String> {
        let task = format!(
            "Research question: {}\n\nSource {}\nTitle: {}\nURL: {}\nSnippet: {}\n\nIs this a credible, relevant source for the question?",
            query,
            result.source_id,
            result.title,
            result.url.as_deref().unwrap_or("-"),
            result.snippet.trim()
        );
        let answer = self
            .llm
            .generate_with_system(CITATION_PROMPT, &task)
            .await
            .map_err(|e| e.to_string())?;
        Ok(parse_review(&answer, result.batch))
    }
}

fn normalize_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_lowercase()
}

/// Read an `ACCEPT` / `REJECT: reason` answer. Anything else is a rejection.
pub fn parse_review(answer: &str, batch: u32) -> CitationVerdict {
    let first = answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let upper = first.to_uppercase();

    if upper.starts_with("ACCEPT") {
        CitationVerdict::accepted(batch)
    } else if upper.starts_with("REJECT") {
        let reason = first
            .split_once(':')
            .map(|(_, reason)| reason.trim())
            .filter(|reason| !reason.is_empty())
            .unwrap_or("rejected on review");
        CitationVerdict::rejected(batch, reason)
    } else {
        CitationVerdict::rejected(batch, "no clear review verdict")
    }
}

#[async_trait]
impl ResearchAgent for CitationAgent {
    fn phase(&self) -> Phase {
        Phase::CitationChecker
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        let mut seen: HashMap<String, String> = snapshot
            .accepted_sources()
            .into_iter()
            .filter_map(|r| {
                let url = Url::parse(r.url.as_deref()?).ok()?;
                Some((normalize_url(&url), r.source_id.clone()))
            })
            .collect();

        let mut delta = StateDelta::new();
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for result in snapshot.unchecked_results() {
            let verdict = match self.screen(result, &seen) {
                Screening::Accept => CitationVerdict::accepted(result.batch),
                Screening::Reject(reason) => CitationVerdict::rejected(result.batch, reason),
                Screening::Ambiguous if !self.review_ambiguous => {
                    CitationVerdict::rejected(result.batch, "snippet too short to verify")
                }
                Screening::Ambiguous => match self.review(snapshot.query(), result).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(source_id = %result.source_id, error = %e, "citation review failed");
                        delta.warnings.push(RunWarning::CapabilityDegraded {
                            capability: "reasoning".to_string(),
                            detail: format!("citation review of {}: {}", result.source_id, e),
                        });
                        CitationVerdict::rejected(result.batch, "could not be reviewed")
                    }
                },
            };

            if verdict.accepted {
                accepted += 1;
                if let Some(url) = result.url.as_deref().and_then(|u| Url::parse(u).ok()) {
                    seen.insert(normalize_url(&url), result.source_id.clone());
                }
            } else {
                rejected += 1;
                debug!(
                    source_id = %result.source_id,
                    reason = verdict.reason.as_deref().unwrap_or_default(),
                    "source rejected"
                );
            }
            delta.citations.push((result.source_id.clone(), verdict));
        }

        delta.checked_batch = Some(snapshot.search_batch());
        delta.push_message(Message::assistant(
            Phase::CitationChecker,
            format!(
                "Citation check of batch {}: {} accepted, {} rejected.",
                snapshot.search_batch(),
                accepted,
                rejected
            ),
        ));

        Ok(StageOutput::new(delta, Some(Phase::Reflector)))
    }
}
