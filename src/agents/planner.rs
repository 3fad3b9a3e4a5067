use crate::agents::prompts::PLANNER_PROMPT;
use crate::agents::{preview, AgentError, ResearchAgent, StageOutput};
use crate::llm::LLMClient;
use crate::memory::ContextManager;
use crate::state::{ResearchState, StateDelta};
use crate::types::{Message, Phase};
use crate::utils::toml_config::WorkflowConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Turns the query, or the reflector's gaps, into search sub-questions.
pub struct PlannerAgent {
    llm: Arc<dyn LLMClient>,
    context: ContextManager,
    max_sub_questions: usize,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn LLMClient>, config: &WorkflowConfig) -> Self {
        Self {
            llm,
            context: ContextManager::new(config.context_tokens),
            max_sub_questions: config.max_sub_questions.max(1),
        }
    }

    fn task(&self, state: &ResearchState) -> String {
        let mut task = format!(
            "Research question: {}\n\nWrite a plan with at most {} sub-questions.",
            state.query(),
            self.max_sub_questions
        );

        if let Some(reflection) = state.reflection() {
            if !reflection.missing_aspects.is_empty() {
                task.push_str("\n\nThe previous round of research was judged insufficient. Focus the new sub-questions on these gaps:\n");
                for aspect in &reflection.missing_aspects {
                    task.push_str(&format!("- {}\n", aspect));
                }
            }
            if !state.plan().is_empty() {
                task.push_str("\nAlready searched:\n");
                for question in state.plan() {
                    task.push_str(&format!("- {}\n", question));
                }
            }
        }
        task
    }

    fn fallback_plan(&self, state: &ResearchState) -> Vec<String> {
        let query = state.query().trim();
        let gaps: Vec<String> = state
            .reflection()
            .map(|r| {
                r.missing_aspects
                    .iter()
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                    .take(self.max_sub_questions)
                    .map(|a| {
                        if a.to_lowercase().contains(&query.to_lowercase()) {
                            a.to_string()
                        } else {
                            format!("{} {}", query, a)
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        if gaps.is_empty() {
            vec![query.to_string()]
        } else {
            gaps
        }
    }
}

#[async_trait]
impl ResearchAgent for PlannerAgent {
    fn phase(&self) -> Phase {
        Phase::Planner
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        let context = self
            .context
            .build(PLANNER_PROMPT, snapshot.messages(), &self.task(snapshot));
        let response = self.llm.generate_with_history(&context).await?;
        debug!(response = %preview(&response, 200), "planner response");

        let mut plan = parse_sub_questions(&response, self.max_sub_questions);
        if plan.is_empty() {
            plan = self.fallback_plan(snapshot);
        }

        let mut summary = format!("Research plan ({} sub-questions):", plan.len());
        for (i, question) in plan.iter().enumerate() {
            summary.push_str(&format!("\n{}. {}", i + 1, question));
        }

        let delta = StateDelta::new()
            .with_message(Message::assistant(Phase::Planner, response.trim()))
            .with_message(Message::assistant(Phase::Planner, summary))
            .with_plan(plan);

        Ok(StageOutput::new(delta, Some(Phase::Searcher)))
    }
}

/// Extract sub-questions from planner output.
///
/// List items after a `SUB-QUESTIONS` header are taken; without the header,
/// only numbered lines count. Duplicates are dropped and at most `max` kept.
pub fn parse_sub_questions(text: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.trim().to_uppercase().starts_with("SUB-QUESTIONS"));

    let candidates: Vec<String> = match header {
        Some(index) => lines[index + 1..]
            .iter()
            .filter_map(|line| strip_list_marker(line, true))
            .collect(),
        None => lines
            .iter()
            .filter_map(|line| strip_list_marker(line, false))
            .collect(),
    };

    let mut questions: Vec<String> = Vec::new();
    for candidate in candidates {
        if questions.len() >= max {
            break;
        }
        if !questions
            .iter()
            .any(|q| q.eq_ignore_ascii_case(&candidate))
        {
            questions.push(candidate);
        }
    }
    questions
}

fn strip_list_marker(line: &str, allow_bullets: bool) -> Option<String> {
    let trimmed = line.trim();
    let numbered = trimmed.starts_with(|c: char| c.is_ascii_digit());
    let bulleted = trimmed.starts_with(['-', '*', '•']);
    if !numbered && !(allow_bullets && bulleted) {
        return None;
    }

    let text = trimmed
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')', '-', '*', '•', ':'])
        .trim()
        .trim_matches('"');

    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ReflectionVerdict, StateStore};
    use crate::types::Result;

    struct FixedLLM(String);

    #[async_trait]
    impl LLMClient for FixedLLM {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_parse_after_header() {
        let text = "RESEARCH PLAN\n- Query: rust\n- Objectives: learn\n\nSUB-QUESTIONS:\n1. What is Rust?\n2) Who created Rust?\n- Why use Rust?";
        assert_eq!(
            parse_sub_questions(text, 5),
            vec!["What is Rust?", "Who created Rust?", "Why use Rust?"]
        );
    }

    #[test]
    fn test_parse_numbered_without_header() {
        let text = "- Query: ignored bullet\n1. first\n2. second\n3. first";
        assert_eq!(parse_sub_questions(text, 5), vec!["first", "second"]);
    }

    #[test]
    fn test_parse_respects_max() {
        let text = "SUB-QUESTIONS\n1. a\n2. b\n3. c\n4. d";
        assert_eq!(parse_sub_questions(text, 2).len(), 2);
        assert!(parse_sub_questions("no list here", 3).is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_back_to_query() {
        let planner = PlannerAgent::new(
            Arc::new(FixedLLM("I cannot help".to_string())),
            &WorkflowConfig::default(),
        );
        let state = ResearchState::new("what is rust");

        let output = planner.run(&state).await.unwrap();
        assert_eq!(output.delta.plan, Some(vec!["what is rust".to_string()]));
        assert_eq!(output.hint, Some(Phase::Searcher));
    }

    #[tokio::test]
    async fn test_replan_falls_back_to_gaps() {
        let planner = PlannerAgent::new(
            Arc::new(FixedLLM(String::new())),
            &WorkflowConfig::default(),
        );
        let mut store = StateStore::new(ResearchState::new("rust"));
        store
            .commit(StateDelta::new().with_reflection(ReflectionVerdict {
                sufficient: false,
                missing_aspects: vec!["history".to_string()],
            }))
            .unwrap();

        let output = planner.run(store.state()).await.unwrap();
        assert_eq!(output.delta.plan, Some(vec!["rust history".to_string()]));
    }
}
