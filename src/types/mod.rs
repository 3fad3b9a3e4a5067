use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============= Workflow Types =============

/// A node of the research graph.
///
/// `Start`, `End` and `Failed` are control nodes owned by the executor; the
/// other six are stages that do work. Every message in the log records the
/// phase that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Supervisor,
    Planner,
    Searcher,
    CitationChecker,
    Reflector,
    Synthesizer,
    End,
    Failed,
}

impl Phase {
    /// Stage name as it appears in logs and serialized state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Supervisor => "supervisor",
            Phase::Planner => "planner",
            Phase::Searcher => "searcher",
            Phase::CitationChecker => "citation_checker",
            Phase::Reflector => "reflector",
            Phase::Synthesizer => "synthesizer",
            Phase::End => "end",
            Phase::Failed => "failed",
        }
    }

    /// Terminal nodes stop the executor.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::End | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Message Types =============

/// One entry of the run's append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub source: Phase,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, source: Phase, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, Phase::Start, content)
    }

    pub fn assistant(source: Phase, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, source, content)
    }

    pub fn system(source: Phase, content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, source, content)
    }

    /// Record of a capability invocation.
    pub fn tool(source: Phase, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, source, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

// ============= Report Types =============

/// A validated source as cited in the final report.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Source {
    pub source_id: String,
    pub title: String,
    pub url: Option<String>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::CitationChecker).unwrap();
        assert_eq!(json, "\"citation_checker\"");
        assert_eq!(Phase::CitationChecker.to_string(), "citation_checker");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::End.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Synthesizer.is_terminal());
    }

    #[test]
    fn test_tool_message_constructor() {
        let msg = Message::tool(Phase::Searcher, "web_search ok");
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.source, Phase::Searcher);
        assert_eq!(msg.content, "web_search ok");
    }
}
