use super::model::{CitationVerdict, Coverage, ReflectionVerdict, RunWarning, SearchResult};
use crate::types::Message;

/// A partial update proposed by a stage.
///
/// Everything here is additive except `plan` (replaced as a new revision) and
/// `report` (written once). Deltas are validated as a whole by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub messages: Vec<Message>,
    pub plan: Option<Vec<String>>,
    pub search_results: Vec<SearchResult>,
    pub coverage: Vec<Coverage>,
    pub citations: Vec<(String, CitationVerdict)>,
    pub checked_batch: Option<u32>,
    pub reflection: Option<ReflectionVerdict>,
    pub report: Option<String>,
    pub warnings: Vec<RunWarning>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_plan(mut self, plan: Vec<String>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_reflection(mut self, verdict: ReflectionVerdict) -> Self {
        self.reflection = Some(verdict);
        self
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }

    pub fn with_warning(mut self, warning: RunWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Whether this delta opens a new search batch.
    pub fn opens_batch(&self) -> bool {
        !self.coverage.is_empty() || !self.search_results.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
