use crate::memory::{estimate_tokens, truncate_history_to_tokens};
use crate::types::Message;

pub struct ContextManager {
    max_tokens: usize,
}

impl ContextManager {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    /// Instructions first, then as much recent history as fits, then the task.
    ///
    /// Instructions and task are never trimmed; history gets what is left of
    /// the budget.
    pub fn build(
        &self,
        instructions: &str,
        history: &[Message],
        task: &str,
    ) -> Vec<(String, String)> {
        let reserved = estimate_tokens(instructions) + estimate_tokens(task);
        let budget = self.max_tokens.saturating_sub(reserved);

        let mut context = Vec::with_capacity(history.len() + 2);
        context.push(("system".to_string(), instructions.to_string()));
        context.extend(
            truncate_history_to_tokens(history, budget)
                .into_iter()
                .map(|m| (m.role.as_str().to_string(), m.content)),
        );
        context.push(("user".to_string(), task.to_string()));
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    #[test]
    fn test_build_orders_context() {
        let history = vec![
            Message::user("what is rust"),
            Message::tool(Phase::Searcher, "web_search ok"),
        ];
        let context = ContextManager::new(1000).build("You are a planner.", &history, "Plan it.");

        assert_eq!(context.len(), 4);
        assert_eq!(context[0], ("system".to_string(), "You are a planner.".to_string()));
        assert_eq!(context[1].0, "user");
        assert_eq!(context[2].0, "tool");
        assert_eq!(context[3], ("user".to_string(), "Plan it.".to_string()));
    }

    #[test]
    fn test_build_drops_history_when_budget_is_spent() {
        let history = vec![Message::user("x".repeat(400))];
        let context = ContextManager::new(10).build("sys", &history, "task");
        assert_eq!(context.len(), 2);
    }
}
