use crate::agents::prompts::{NO_RESULTS_FALLBACK, NO_SOURCES_NOTE, SYNTHESIZER_PROMPT};
use crate::agents::{AgentError, ResearchAgent, StageOutput};
use crate::llm::LLMClient;
use crate::memory::ContextManager;
use crate::state::{ResearchState, RunWarning, SearchResult, StateDelta};
use crate::types::{Message, Phase};
use crate::utils::toml_config::WorkflowConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Writes the final report from accepted sources only.
pub struct SynthesizerAgent {
    llm: Arc<dyn LLMClient>,
    context: ContextManager,
}

impl SynthesizerAgent {
    pub fn new(llm: Arc<dyn LLMClient>, config: &WorkflowConfig) -> Self {
        Self {
            llm,
            context: ContextManager::new(config.context_tokens),
        }
    }

    fn task(&self, state: &ResearchState, sources: &[&SearchResult]) -> String {
        let mut task = format!("Research question: {}\n\n", state.query());

        if sources.is_empty() {
            task.push_str(
                "No validated sources are available. Answer as far as possible and say clearly that the findings are unverified.\n",
            );
        } else {
            task.push_str("Validated sources:\n");
            for (i, source) in sources.iter().enumerate() {
                task.push_str(&format!(
                    "[{}] {} ({})\n{}\n\n",
                    i + 1,
                    source.title,
                    source.url.as_deref().unwrap_or("-"),
                    source.snippet.trim()
                ));
            }
        }

        if let Some(reason) = state.degraded() {
            task.push_str(&format!("\nResearch stopped early: {}\n", reason));
        }
        task.push_str("\nWrite the research report.");
        task
    }
}

/// Numbered source list appended to every report.
pub fn sources_section(sources: &[&SearchResult]) -> String {
    let mut section = String::from("## Validated Sources\n");
    if sources.is_empty() {
        section.push_str(NO_SOURCES_NOTE);
        section.push('\n');
        return section;
    }
    for (i, source) in sources.iter().enumerate() {
        match source.url.as_deref() {
            Some(url) => section.push_str(&format!("[{}] {} - {}\n", i + 1, source.title, url)),
            None => section.push_str(&format!("[{}] {}\n", i + 1, source.title)),
        }
    }
    section
}

#[async_trait]
impl ResearchAgent for SynthesizerAgent {
    fn phase(&self) -> Phase {
        Phase::Synthesizer
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        let sources = snapshot.accepted_sources();
        let context = self.context.build(
            SYNTHESIZER_PROMPT,
            snapshot.messages(),
            &self.task(snapshot, &sources),
        );
        let body = self.llm.generate_with_history(&context).await?;
        let body = match body.trim() {
            "" => NO_RESULTS_FALLBACK,
            text => text,
        };

        let report = format!("{}\n\n{}", body, sources_section(&sources));

        let mut delta = StateDelta::new()
            .with_message(Message::assistant(
                Phase::Synthesizer,
                format!("Report written from {} validated source(s).", sources.len()),
            ))
            .with_report(report);

        let rejected = snapshot.rejected_count();
        if rejected > 0 {
            delta = delta.with_warning(RunWarning::SourcesRejected { count: rejected });
        }

        Ok(StageOutput::new(delta, Some(Phase::End)))
    }
}
