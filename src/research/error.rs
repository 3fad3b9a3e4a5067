use crate::state::{ResearchState, RunWarning};
use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// Cancellation was observed at a step boundary.
    Cancelled,
    /// The step ceiling was hit, or the iteration cap was hit in strict mode.
    MaxIterationsPartial,
    Failed,
    InvalidQuery,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunErrorKind::Cancelled => "cancelled",
            RunErrorKind::MaxIterationsPartial => "max iterations (partial)",
            RunErrorKind::Failed => "failed",
            RunErrorKind::InvalidQuery => "invalid query",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a research run.
///
/// Carries whatever the run had produced so far; the message log is never
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("research run {kind}: {message}")]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub run_id: Option<String>,
    pub messages: Vec<Message>,
    pub partial_report: Option<String>,
    pub warnings: Vec<RunWarning>,
    /// Node executions completed before the run ended.
    pub steps: usize,
}

impl RunError {
    pub fn from_state(
        kind: RunErrorKind,
        message: impl Into<String>,
        state: &ResearchState,
        steps: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            run_id: Some(state.run_id().to_string()),
            messages: state.messages().to_vec(),
            partial_report: state.report().map(str::to_string),
            warnings: state.warnings().to_vec(),
            steps,
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self {
            kind: RunErrorKind::InvalidQuery,
            message: message.into(),
            run_id: None,
            messages: Vec::new(),
            partial_report: None,
            warnings: Vec::new(),
            steps: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == RunErrorKind::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keeps_messages() {
        let mut state = ResearchState::new("q");
        state.messages.push(Message::user("q"));

        let err = RunError::from_state(RunErrorKind::Cancelled, "stopped", &state, 2);
        assert!(err.is_cancelled());
        assert_eq!(err.messages.len(), 1);
        assert_eq!(err.run_id.as_deref(), Some(state.run_id()));
        assert_eq!(err.to_string(), "research run cancelled: stopped");
    }
}
