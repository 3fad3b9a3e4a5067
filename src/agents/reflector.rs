use crate::agents::prompts::REFLECTOR_PROMPT;
use crate::agents::{preview, AgentError, ResearchAgent, StageOutput};
use crate::llm::LLMClient;
use crate::memory::ContextManager;
use crate::state::{ReflectionVerdict, ResearchState, StateDelta};
use crate::types::{Message, Phase};
use crate::utils::toml_config::WorkflowConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const EVIDENCE_SNIPPET_CHARS: usize = 300;

/// Quality gate between checked evidence and synthesis.
pub struct ReflectorAgent {
    llm: Arc<dyn LLMClient>,
    context: ContextManager,
}

impl ReflectorAgent {
    pub fn new(llm: Arc<dyn LLMClient>, config: &WorkflowConfig) -> Self {
        Self {
            llm,
            context: ContextManager::new(config.context_tokens),
        }
    }

    fn task(&self, state: &ResearchState) -> String {
        let mut task = format!("Research question: {}\n\nPlan:\n", state.query());
        for question in state.plan() {
            task.push_str(&format!("- {}\n", question));
        }

        task.push_str("\nValidated evidence:\n");
        for source in state.accepted_sources() {
            let snippet: String = source.snippet.chars().take(EVIDENCE_SNIPPET_CHARS).collect();
            task.push_str(&format!(
                "[{}] {} ({}): {}\n",
                source.source_id,
                source.title,
                source.url.as_deref().unwrap_or("-"),
                snippet.trim()
            ));
        }

        let rejected = state.rejected_count();
        if rejected > 0 {
            task.push_str(&format!("\n{} source(s) were rejected by the citation check.\n", rejected));
        }

        let empty = unanswered(state);
        if !empty.is_empty() {
            task.push_str("\nSub-questions with no results:\n");
            for question in empty {
                task.push_str(&format!("- {}\n", question));
            }
        }

        task.push_str("\nIs this enough to answer the question well?");
        task
    }
}

/// Sub-questions of the current plan whose searches came back empty.
fn unanswered(state: &ResearchState) -> Vec<String> {
    state
        .coverage()
        .iter()
        .filter(|c| c.plan_revision == state.plan_revision() && c.hits == 0)
        .map(|c| c.sub_question.clone())
        .collect()
}

#[derive(Deserialize)]
struct RawVerdict {
    verdict: String,
    #[serde(default)]
    missing_aspects: Vec<String>,
}

/// Read the reflector's answer.
///
/// A JSON object is preferred. Plain text falls back to keyword matching where
/// `MORE RESEARCH` wins over `APPROVE`; an unreadable answer counts as insufficient.
pub fn parse_verdict(text: &str) -> ReflectionVerdict {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(raw) = serde_json::from_str::<RawVerdict>(&text[start..=end]) {
                let verdict = raw.verdict.to_uppercase();
                let missing_aspects: Vec<String> = raw
                    .missing_aspects
                    .into_iter()
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                let sufficient = verdict.contains("APPROVE") && !verdict.contains("MORE");
                return ReflectionVerdict {
                    sufficient,
                    missing_aspects: if sufficient { Vec::new() } else { missing_aspects },
                };
            }
        }
    }

    let upper = text.to_uppercase();
    if upper.contains("MORE RESEARCH") {
        let missing_aspects = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with(['-', '*', '•']))
            .map(|line| line.trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        return ReflectionVerdict {
            sufficient: false,
            missing_aspects,
        };
    }

    ReflectionVerdict {
        sufficient: upper.contains("APPROVE"),
        missing_aspects: Vec::new(),
    }
}

#[async_trait]
impl ResearchAgent for ReflectorAgent {
    fn phase(&self) -> Phase {
        Phase::Reflector
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        // nothing validated: no point asking
        let verdict = if snapshot.accepted_sources().is_empty() {
            let mut missing_aspects = unanswered(snapshot);
            if missing_aspects.is_empty() {
                missing_aspects = snapshot.plan().to_vec();
            }
            ReflectionVerdict {
                sufficient: false,
                missing_aspects,
            }
        } else {
            let context = self
                .context
                .build(REFLECTOR_PROMPT, snapshot.messages(), &self.task(snapshot));
            let response = self.llm.generate_with_history(&context).await?;
            debug!(response = %preview(&response, 200), "reflector response");
            parse_verdict(&response)
        };

        let summary = if verdict.sufficient {
            "APPROVE: evidence is sufficient for synthesis.".to_string()
        } else if verdict.missing_aspects.is_empty() {
            "MORE RESEARCH needed.".to_string()
        } else {
            format!("MORE RESEARCH needed: {}", verdict.missing_aspects.join("; "))
        };
        let hint = if verdict.sufficient {
            Phase::Synthesizer
        } else {
            Phase::Planner
        };

        let delta = StateDelta::new()
            .with_message(Message::assistant(Phase::Reflector, summary))
            .with_reflection(verdict);
        Ok(StageOutput::new(delta, Some(hint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CitationVerdict, Coverage, SearchResult, StateStore};
    use crate::types::Result;
    use chrono::Utc;

    struct Panel(&'static str);

    #[async_trait]
    impl LLMClient for Panel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "panel"
        }
    }

    fn checked_state(accept: bool) -> ResearchState {
        let mut store = StateStore::new(ResearchState::new("rust"));
        store
            .commit(StateDelta::new().with_plan(vec!["q1".to_string(), "q2".to_string()]))
            .unwrap();
        let delta = StateDelta {
            search_results: vec![SearchResult {
                source_id: "S1-1".to_string(),
                sub_question: "q1".to_string(),
                title: "Rust".to_string(),
                url: Some("https://rust-lang.org".to_string()),
                snippet: "Rust is a language.".to_string(),
                retrieved_at: Utc::now(),
                retrieval_tool: "web_search".to_string(),
                batch: 1,
            }],
            coverage: vec![
                Coverage {
                    plan_revision: 1,
                    sub_question: "q1".to_string(),
                    batch: 1,
                    hits: 1,
                    error: None,
                },
                Coverage {
                    plan_revision: 1,
                    sub_question: "q2".to_string(),
                    batch: 1,
                    hits: 0,
                    error: None,
                },
            ],
            ..StateDelta::default()
        };
        store.commit(delta).unwrap();
        let verdict = if accept {
            CitationVerdict::accepted(1)
        } else {
            CitationVerdict::rejected(1, "bad")
        };
        store
            .commit(StateDelta {
                citations: vec![("S1-1".to_string(), verdict)],
                checked_batch: Some(1),
                ..StateDelta::default()
            })
            .unwrap();
        store.into_state()
    }

    #[test]
    fn test_parse_json_verdict() {
        let verdict = parse_verdict(
            "Here you go: {\"verdict\": \"MORE RESEARCH\", \"missing_aspects\": [\"history\", \" \"]}",
        );
        assert!(!verdict.sufficient);
        assert_eq!(verdict.missing_aspects, vec!["history"]);

        let verdict = parse_verdict("{\"verdict\": \"APPROVE\"}");
        assert!(verdict.sufficient);
    }

    #[test]
    fn test_parse_text_verdict() {
        let verdict = parse_verdict("MORE RESEARCH\n- adoption numbers\n- criticism");
        assert!(!verdict.sufficient);
        assert_eq!(verdict.missing_aspects, vec!["adoption numbers", "criticism"]);

        assert!(parse_verdict("APPROVE for synthesis").sufficient);
        assert!(!parse_verdict("hmm").sufficient);
    }

    #[tokio::test]
    async fn test_approval_hints_synthesis() {
        let reflector = ReflectorAgent::new(
            Arc::new(Panel("{\"verdict\": \"APPROVE\", \"missing_aspects\": []}")),
            &WorkflowConfig::default(),
        );
        let output = reflector.run(&checked_state(true)).await.unwrap();
        assert!(output.delta.reflection.unwrap().sufficient);
        assert_eq!(output.hint, Some(Phase::Synthesizer));
    }

    #[tokio::test]
    async fn test_no_validated_evidence_is_insufficient() {
        let reflector = ReflectorAgent::new(Arc::new(Panel("APPROVE")), &WorkflowConfig::default());
        let output = reflector.run(&checked_state(false)).await.unwrap();
        let verdict = output.delta.reflection.unwrap();
        assert!(!verdict.sufficient);
        assert_eq!(verdict.missing_aspects, vec!["q2"]);
        assert_eq!(output.hint, Some(Phase::Planner));
    }
}
