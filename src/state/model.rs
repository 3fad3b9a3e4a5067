use crate::types::{Message, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single retrieved item, as appended by the searcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub source_id: String,
    pub sub_question: String,
    pub title: String,
    pub url: Option<String>,
    pub snippet: String,
    pub retrieved_at: DateTime<Utc>,
    pub retrieval_tool: String,
    /// Search batch that produced this result.
    pub batch: u32,
}

/// Marks a sub-question of a plan revision as searched, even when nothing came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub plan_revision: u32,
    pub sub_question: String,
    pub batch: u32,
    pub hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationVerdict {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub batch: u32,
}

impl CitationVerdict {
    pub fn accepted(batch: u32) -> Self {
        Self {
            accepted: true,
            reason: None,
            batch,
        }
    }

    pub fn rejected(batch: u32, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            batch,
        }
    }
}

/// What the reflector proposes. The iteration counter is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    pub sufficient: bool,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
}

/// The committed quality-gate verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub sufficient: bool,
    pub missing_aspects: Vec<String>,
    /// Re-plans taken so far; only the executor advances it.
    pub iteration_count: u32,
    /// Citation check this verdict was based on.
    pub based_on_check: u32,
}

/// Non-fatal conditions surfaced alongside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    PartialResult { reason: String },
    SourcesRejected { count: usize },
    CapabilityDegraded { capability: String, detail: String },
}

impl RunWarning {
    pub fn partial(reason: impl Into<String>) -> Self {
        RunWarning::PartialResult {
            reason: reason.into(),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, RunWarning::PartialResult { .. })
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::PartialResult { reason } => write!(f, "partial result: {}", reason),
            RunWarning::SourcesRejected { count } => {
                write!(f, "{} source(s) rejected by citation check", count)
            }
            RunWarning::CapabilityDegraded { capability, detail } => {
                write!(f, "capability '{}' degraded: {}", capability, detail)
            }
        }
    }
}

/// The record threaded through a research run.
///
/// Fields are only reachable through getters; all mutation goes through
/// [`StateStore::commit`](super::StateStore::commit) or executor control
/// operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub(crate) run_id: String,
    pub(crate) query: String,
    pub(crate) plan: Vec<String>,
    pub(crate) plan_revision: u32,
    pub(crate) messages: Vec<Message>,
    pub(crate) search_results: Vec<SearchResult>,
    pub(crate) coverage: Vec<Coverage>,
    pub(crate) search_batch: u32,
    pub(crate) citations: BTreeMap<String, CitationVerdict>,
    pub(crate) checked_batch: u32,
    pub(crate) reflection: Option<Reflection>,
    pub(crate) report: Option<String>,
    pub(crate) warnings: Vec<RunWarning>,
    pub(crate) degraded: Option<String>,
    pub(crate) phase: Phase,
}

impl ResearchState {
    /// Fresh state holding only the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_run_id(new_run_id(), query)
    }

    pub fn with_run_id(run_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            query: query.into(),
            plan: Vec::new(),
            plan_revision: 0,
            messages: Vec::new(),
            search_results: Vec::new(),
            coverage: Vec::new(),
            search_batch: 0,
            citations: BTreeMap::new(),
            checked_batch: 0,
            reflection: None,
            report: None,
            warnings: Vec::new(),
            degraded: None,
            phase: Phase::Start,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn plan(&self) -> &[String] {
        &self.plan
    }

    pub fn plan_revision(&self) -> u32 {
        self.plan_revision
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    pub fn coverage(&self) -> &[Coverage] {
        &self.coverage
    }

    pub fn search_batch(&self) -> u32 {
        self.search_batch
    }

    pub fn citations(&self) -> &BTreeMap<String, CitationVerdict> {
        &self.citations
    }

    pub fn checked_batch(&self) -> u32 {
        self.checked_batch
    }

    pub fn reflection(&self) -> Option<&Reflection> {
        self.reflection.as_ref()
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    /// Reason the run was steered straight to synthesis, if any.
    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration_count(&self) -> u32 {
        self.reflection.as_ref().map_or(0, |r| r.iteration_count)
    }

    /// Sub-questions of the current plan revision that have not been searched yet.
    pub fn pending_sub_questions(&self) -> Vec<&str> {
        self.plan
            .iter()
            .filter(|question| {
                !self.coverage.iter().any(|c| {
                    c.plan_revision == self.plan_revision && &c.sub_question == *question
                })
            })
            .map(String::as_str)
            .collect()
    }

    pub fn has_unchecked_batch(&self) -> bool {
        self.search_batch > self.checked_batch
    }

    /// Results the citation checker has not ruled on yet.
    pub fn unchecked_results(&self) -> Vec<&SearchResult> {
        self.search_results
            .iter()
            .filter(|r| r.batch > self.checked_batch && !self.citations.contains_key(&r.source_id))
            .collect()
    }

    /// True when there is no verdict, or it predates the latest citation check.
    pub fn reflection_is_stale(&self) -> bool {
        match &self.reflection {
            None => true,
            Some(r) => r.based_on_check < self.checked_batch,
        }
    }

    /// Results with an accepted citation verdict, in retrieval order.
    pub fn accepted_sources(&self) -> Vec<&SearchResult> {
        self.search_results
            .iter()
            .filter(|r| {
                self.citations
                    .get(&r.source_id)
                    .is_some_and(|verdict| verdict.accepted)
            })
            .collect()
    }

    pub fn rejected_count(&self) -> usize {
        self.citations.values().filter(|v| !v.accepted).count()
    }

    pub fn has_source(&self, source_id: &str) -> bool {
        self.search_results.iter().any(|r| r.source_id == source_id)
    }
}

/// Run identifiers look like `research_1a2b3c4d`.
pub fn new_run_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("research_{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, batch: u32) -> SearchResult {
        SearchResult {
            source_id: id.to_string(),
            sub_question: "q".to_string(),
            title: "t".to_string(),
            url: Some("https://example.com".to_string()),
            snippet: "s".to_string(),
            retrieved_at: Utc::now(),
            retrieval_tool: "web_search".to_string(),
            batch,
        }
    }

    #[test]
    fn test_run_id_format() {
        let id = new_run_id();
        assert!(id.starts_with("research_"));
        assert_eq!(id.len(), "research_".len() + 8);
    }

    #[test]
    fn test_new_state_holds_only_query() {
        let state = ResearchState::new("why is the sky blue");
        assert_eq!(state.query(), "why is the sky blue");
        assert!(state.plan().is_empty());
        assert!(state.messages().is_empty());
        assert!(state.report().is_none());
        assert_eq!(state.phase(), Phase::Start);
        assert!(state.reflection_is_stale());
        assert_eq!(state.iteration_count(), 0);
    }

    #[test]
    fn test_pending_sub_questions_respects_revision() {
        let mut state = ResearchState::new("q");
        state.plan = vec!["a".to_string(), "b".to_string()];
        state.plan_revision = 2;
        state.coverage.push(Coverage {
            plan_revision: 1,
            sub_question: "a".to_string(),
            batch: 1,
            hits: 0,
            error: None,
        });
        state.coverage.push(Coverage {
            plan_revision: 2,
            sub_question: "b".to_string(),
            batch: 2,
            hits: 1,
            error: None,
        });
        assert_eq!(state.pending_sub_questions(), vec!["a"]);
    }

    #[test]
    fn test_accepted_sources_excludes_rejected() {
        let mut state = ResearchState::new("q");
        state.search_results = vec![result("S1-1", 1), result("S1-2", 1)];
        state
            .citations
            .insert("S1-1".to_string(), CitationVerdict::accepted(1));
        state
            .citations
            .insert("S1-2".to_string(), CitationVerdict::rejected(1, "no url"));

        let accepted: Vec<_> = state.accepted_sources().iter().map(|r| r.source_id.clone()).collect();
        assert_eq!(accepted, vec!["S1-1".to_string()]);
        assert_eq!(state.rejected_count(), 1);
    }

    #[test]
    fn test_warning_display() {
        let warning = RunWarning::SourcesRejected { count: 3 };
        assert_eq!(warning.to_string(), "3 source(s) rejected by citation check");
        assert!(RunWarning::partial("cap").is_partial());
    }
}
