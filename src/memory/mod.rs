//! Context window management for reasoning calls.
//!
//! The run's message log grows with every step. Before a stage asks the model
//! anything, the log is cut down to a token budget so the most recent steps
//! survive and the oldest are dropped first.

use crate::types::Message;

/// Builds the `(role, content)` sequence passed to the reasoning model.
pub mod context_manager;

pub use context_manager::ContextManager;

/// Estimates token count for a piece of text.
///
/// Uses a simple heuristic of ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Truncates history to fit within a token budget.
///
/// Removes oldest messages until the total estimated tokens is under the budget.
pub fn truncate_history_to_tokens(history: &[Message], token_budget: usize) -> Vec<Message> {
    let mut result: Vec<Message> = Vec::new();
    let mut total_tokens = 0;

    // Work backwards from most recent messages
    for msg in history.iter().rev() {
        let msg_tokens = estimate_tokens(&msg.content);
        if total_tokens + msg_tokens > token_budget {
            break;
        }
        result.push(msg.clone());
        total_tokens += msg_tokens;
    }

    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("this is a longer test string"), 7);
    }

    #[test]
    fn test_truncate_keeps_most_recent() {
        let history: Vec<Message> = (0..10)
            .map(|i| Message::assistant(Phase::Planner, format!("Message {:02}", i)))
            .collect();

        // each message is 10 chars, i.e. 3 tokens
        let truncated = truncate_history_to_tokens(&history, 9);
        assert_eq!(truncated.len(), 3);
        assert_eq!(truncated[0].content, "Message 07");
        assert_eq!(truncated[2].content, "Message 09");
    }
}
