//! Research stages.
//!
//! The workflow has a fixed, closed set of six stages. Each one reads a
//! snapshot of [`ResearchState`], may call the reasoning model and/or the
//! capability gateway, and returns a [`StageOutput`]: a state delta for the
//! executor to commit plus an optional routing hint. Stages never set the
//! phase and never touch the state directly.
//!
//! | Stage | Calls | Produces |
//! |---|---|---|
//! | [`SupervisorAgent`] | nothing | routing decision |
//! | [`PlannerAgent`] | reasoning | plan |
//! | [`SearcherAgent`] | gateway | search results |
//! | [`CitationAgent`] | reasoning, for ambiguous sources | citation verdicts |
//! | [`ReflectorAgent`] | reasoning | reflection verdict |
//! | [`SynthesizerAgent`] | reasoning | report |

pub mod citation;
pub mod planner;
pub mod prompts;
pub mod reflector;
pub mod searcher;
pub mod supervisor;
pub mod synthesizer;

pub use citation::CitationAgent;
pub use planner::PlannerAgent;
pub use reflector::ReflectorAgent;
pub use searcher::SearcherAgent;
pub use supervisor::SupervisorAgent;
pub use synthesizer::SynthesizerAgent;

use crate::llm::LLMClient;
use crate::state::{ResearchState, StateDelta};
use crate::tools::{CallLog, CapabilityError, CapabilityGateway};
use crate::types::{AppError, Phase};
use crate::utils::toml_config::WorkflowConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// What a stage hands back to the executor.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub delta: StateDelta,
    /// Suggested next node. Logged, never binding.
    pub hint: Option<Phase>,
}

impl StageOutput {
    pub fn new(delta: StateDelta, hint: Option<Phase>) -> Self {
        Self { delta, hint }
    }
}

/// A stage failure the executor may degrade around.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("reasoning capability failed: {0}")]
    Reasoning(#[from] AppError),

    #[error("{stage} did not finish within {after_ms}ms")]
    Timeout { stage: Phase, after_ms: u64 },
}

impl AgentError {
    /// Name of the capability that failed, for warnings.
    pub fn capability(&self) -> String {
        match self {
            AgentError::Capability(e) => e.capability.clone(),
            AgentError::Reasoning(_) => "reasoning".to_string(),
            AgentError::Timeout { stage, .. } => format!("{} step", stage),
        }
    }
}

/// Common stage contract: `run(snapshot) -> (delta, hint)`.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    fn phase(&self) -> Phase;

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError>;
}

/// Closed dispatch over the six stages.
#[derive(Clone, Copy)]
pub enum AgentNode<'a> {
    Supervisor(&'a SupervisorAgent),
    Planner(&'a PlannerAgent),
    Searcher(&'a SearcherAgent),
    CitationChecker(&'a CitationAgent),
    Reflector(&'a ReflectorAgent),
    Synthesizer(&'a SynthesizerAgent),
}

impl AgentNode<'_> {
    pub fn phase(&self) -> Phase {
        match self {
            AgentNode::Supervisor(_) => Phase::Supervisor,
            AgentNode::Planner(_) => Phase::Planner,
            AgentNode::Searcher(_) => Phase::Searcher,
            AgentNode::CitationChecker(_) => Phase::CitationChecker,
            AgentNode::Reflector(_) => Phase::Reflector,
            AgentNode::Synthesizer(_) => Phase::Synthesizer,
        }
    }

    pub async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        match self {
            AgentNode::Supervisor(agent) => agent.run(snapshot).await,
            AgentNode::Planner(agent) => agent.run(snapshot).await,
            AgentNode::Searcher(agent) => agent.run(snapshot).await,
            AgentNode::CitationChecker(agent) => agent.run(snapshot).await,
            AgentNode::Reflector(agent) => agent.run(snapshot).await,
            AgentNode::Synthesizer(agent) => agent.run(snapshot).await,
        }
    }
}

/// The full set of stages for one workflow.
pub struct ResearchAgents {
    pub supervisor: SupervisorAgent,
    pub planner: PlannerAgent,
    pub searcher: SearcherAgent,
    pub citation_checker: CitationAgent,
    pub reflector: ReflectorAgent,
    pub synthesizer: SynthesizerAgent,
    /// Calls made by the stages of this workflow.
    pub call_log: CallLog,
}

impl ResearchAgents {
    pub fn new(llm: Arc<dyn LLMClient>, gateway: CapabilityGateway, config: &WorkflowConfig) -> Self {
        let call_log = CallLog::new();
        Self {
            supervisor: SupervisorAgent::new(config.max_iterations),
            planner: PlannerAgent::new(llm.clone(), config),
            searcher: SearcherAgent::new(gateway.with_call_log(call_log.clone())),
            citation_checker: CitationAgent::new(llm.clone(), config),
            reflector: ReflectorAgent::new(llm.clone(), config),
            synthesizer: SynthesizerAgent::new(llm, config),
            call_log,
        }
    }

    /// Node for a stage phase; `None` for control phases.
    pub fn node(&self, phase: Phase) -> Option<AgentNode<'_>> {
        match phase {
            Phase::Supervisor => Some(AgentNode::Supervisor(&self.supervisor)),
            Phase::Planner => Some(AgentNode::Planner(&self.planner)),
            Phase::Searcher => Some(AgentNode::Searcher(&self.searcher)),
            Phase::CitationChecker => Some(AgentNode::CitationChecker(&self.citation_checker)),
            Phase::Reflector => Some(AgentNode::Reflector(&self.reflector)),
            Phase::Synthesizer => Some(AgentNode::Synthesizer(&self.synthesizer)),
            Phase::Start | Phase::End | Phase::Failed => None,
        }
    }
}

/// Collapse whitespace in `text` and cut it to `max_chars` for debug logs.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    } else {
        flat
    }
}
