use crate::agents::{AgentError, ResearchAgent, StageOutput};
use crate::state::{Coverage, ResearchState, RunWarning, SearchResult, StateDelta};
use crate::tools::clock::parse_timestamp;
use crate::tools::{
    CallBudget, CapabilityCall, CapabilityGateway, CURRENT_DATETIME, LOOKUP_REFERENCE, WEB_SEARCH,
};
use crate::types::{Message, Phase};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Fans out one task per pending sub-question and merges what comes back.
///
/// Individual capability failures never fail the stage: they are recorded as
/// coverage errors and `CapabilityDegraded` warnings.
pub struct SearcherAgent {
    gateway: CapabilityGateway,
    budget: CallBudget,
}

/// Everything one sub-question task produced.
struct QuestionOutcome {
    index: usize,
    question: String,
    calls: Vec<CapabilityCall>,
}

impl SearcherAgent {
    pub fn new(gateway: CapabilityGateway) -> Self {
        let budget = gateway.default_budget();
        Self { gateway, budget }
    }

    pub fn with_budget(mut self, budget: CallBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Timestamp for the batch, from the clock capability when registered.
    async fn batch_timestamp(&self, delta: &mut StateDelta) -> DateTime<Utc> {
        if !self.gateway.has_capability(CURRENT_DATETIME) {
            return Utc::now();
        }
        let call = self
            .gateway
            .call(CURRENT_DATETIME, json!({}), &self.budget)
            .await;
        delta.push_message(call.to_message(Phase::Searcher));
        call.result
            .ok()
            .and_then(|value| parse_timestamp(&value))
            .unwrap_or_else(Utc::now)
    }

    async fn search_question(
        gateway: CapabilityGateway,
        budget: CallBudget,
        index: usize,
        question: String,
    ) -> QuestionOutcome {
        let mut calls = vec![
            gateway
                .call(WEB_SEARCH, json!({ "query": question }), &budget)
                .await,
        ];
        if gateway.has_capability(LOOKUP_REFERENCE) {
            calls.push(
                gateway
                    .call(LOOKUP_REFERENCE, json!({ "term": question }), &budget)
                    .await,
            );
        }
        QuestionOutcome {
            index,
            question,
            calls,
        }
    }
}

/// A retrieved item before it is given a source id.
struct Hit {
    title: String,
    url: Option<String>,
    snippet: String,
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Items contained in a successful capability payload.
fn extract_hits(capability: &str, value: &Value) -> Vec<Hit> {
    match capability {
        LOOKUP_REFERENCE => {
            if !value.get("found").and_then(Value::as_bool).unwrap_or(false) {
                return Vec::new();
            }
            vec![Hit {
                title: non_blank(value.get("title")).unwrap_or_else(|| "Reference".to_string()),
                url: non_blank(value.get("url")),
                snippet: non_blank(value.get("extract")).unwrap_or_default(),
            }]
        }
        _ => value
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| Hit {
                        title: non_blank(item.get("title")).unwrap_or_else(|| "Untitled".to_string()),
                        url: non_blank(item.get("url")),
                        snippet: non_blank(item.get("snippet")).unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

#[async_trait]
impl ResearchAgent for SearcherAgent {
    fn phase(&self) -> Phase {
        Phase::Searcher
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        let pending: Vec<String> = snapshot
            .pending_sub_questions()
            .into_iter()
            .map(str::to_string)
            .collect();
        let batch = snapshot.search_batch() + 1;
        let revision = snapshot.plan_revision();

        let mut delta = StateDelta::new();
        let retrieved_at = self.batch_timestamp(&mut delta).await;

        info!(batch, sub_questions = pending.len(), "Searching sub-questions");

        let mut tasks = JoinSet::new();
        for (index, question) in pending.iter().cloned().enumerate() {
            tasks.spawn(Self::search_question(
                self.gateway.clone(),
                self.budget,
                index,
                question,
            ));
        }

        let mut seq = 0u32;
        let mut total_hits = 0usize;
        let mut finished = HashSet::new();

        // merge in completion order
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "search task did not complete");
                    continue;
                }
            };
            finished.insert(outcome.index);

            let mut hits = 0usize;
            let mut errors = Vec::new();
            for call in &outcome.calls {
                delta.push_message(call.to_message(Phase::Searcher));
                match &call.result {
                    Ok(value) => {
                        for hit in extract_hits(&call.capability, value) {
                            seq += 1;
                            hits += 1;
                            delta.search_results.push(SearchResult {
                                source_id: format!("S{}-{}", batch, seq),
                                sub_question: outcome.question.clone(),
                                title: hit.title,
                                url: hit.url,
                                snippet: hit.snippet,
                                retrieved_at,
                                retrieval_tool: call.capability.clone(),
                                batch,
                            });
                        }
                    }
                    Err(e) => {
                        errors.push(e.to_string());
                        delta.warnings.push(RunWarning::CapabilityDegraded {
                            capability: call.capability.clone(),
                            detail: format!("'{}': {}", outcome.question, e.message),
                        });
                    }
                }
            }

            debug!(question = %outcome.question, hits, "sub-question searched");
            total_hits += hits;
            delta.coverage.push(Coverage {
                plan_revision: revision,
                sub_question: outcome.question,
                batch,
                hits,
                error: (!errors.is_empty()).then(|| errors.join("; ")),
            });
        }

        for (index, question) in pending.iter().enumerate() {
            if !finished.contains(&index) {
                delta.coverage.push(Coverage {
                    plan_revision: revision,
                    sub_question: question.clone(),
                    batch,
                    hits: 0,
                    error: Some("search task aborted".to_string()),
                });
                delta.warnings.push(RunWarning::CapabilityDegraded {
                    capability: WEB_SEARCH.to_string(),
                    detail: format!("'{}': search task aborted", question),
                });
            }
        }

        delta.push_message(Message::assistant(
            Phase::Searcher,
            format!(
                "Search batch {}: {} result(s) for {} sub-question(s).",
                batch,
                total_hits,
                pending.len()
            ),
        ));

        Ok(StageOutput::new(delta, Some(Phase::CitationChecker)))
    }
}
