use crate::agents::ResearchAgents;
use crate::llm::{LLMClient, Provider};
use crate::research::error::{RunError, RunErrorKind};
use crate::state::{ResearchState, RunWarning};
use crate::tools::{gateway_from_config, CapabilityGateway};
use crate::types::{Result, Source};
use crate::utils::toml_config::{ResearchConfig, WorkflowConfig};
use crate::workflows::{EdgeCondition, ExecutionLimits, WorkflowEngine, WorkflowStep};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Shown when a run is started without a question.
pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a research question.";

/// Per-run knobs; defaults come from `[workflow]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub max_iterations: u32,
    pub step_timeout: Duration,
    pub run_timeout: Duration,
    /// Treat reaching the iteration cap as a failure.
    pub strict: bool,
}

impl RunOptions {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            step_timeout: config.step_timeout(),
            run_timeout: config.run_timeout(),
            strict: config.strict,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

/// A finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub run_id: String,
    pub report: String,
    pub warnings: Vec<RunWarning>,
    /// Accepted sources in report order.
    pub sources: Vec<Source>,
    pub steps: Vec<WorkflowStep>,
    pub state: ResearchState,
    pub duration_ms: u64,
}

impl ResearchOutcome {
    pub fn is_partial(&self) -> bool {
        self.warnings.iter().any(RunWarning::is_partial)
    }
}

/// Entry point for research runs.
///
/// Cheap to clone. Runs started from the same coordinator share the reasoning
/// client and the capability gateway (and with it the rate limiter), nothing else.
#[derive(Clone)]
pub struct ResearchCoordinator {
    llm: Arc<dyn LLMClient>,
    gateway: CapabilityGateway,
    workflow: WorkflowConfig,
}

impl ResearchCoordinator {
    pub fn new(llm: Arc<dyn LLMClient>, gateway: CapabilityGateway, workflow: WorkflowConfig) -> Self {
        Self {
            llm,
            gateway,
            workflow,
        }
    }

    /// Build the reasoning client and gateway described by `config`.
    pub async fn from_config(config: &ResearchConfig) -> Result<Self> {
        let provider = Provider::from_config(&config.llm)?;
        info!(provider = provider.name(), model = provider.model(), "using reasoning provider");
        let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client().await?);
        Ok(Self::new(
            llm,
            gateway_from_config(config),
            config.workflow.clone(),
        ))
    }

    pub fn gateway(&self) -> &CapabilityGateway {
        &self.gateway
    }

    pub fn default_options(&self) -> RunOptions {
        RunOptions::from_config(&self.workflow)
    }

    /// Run a query to completion.
    pub async fn start(
        &self,
        query: &str,
        options: RunOptions,
    ) -> std::result::Result<ResearchOutcome, RunError> {
        self.start_with_cancel(query, options, CancellationToken::new())
            .await
    }

    /// Run a query, stopping at the next step boundary once `cancel` fires.
    pub async fn start_with_cancel(
        &self,
        query: &str,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> std::result::Result<ResearchOutcome, RunError> {
        let state = prepare(query)?;
        self.execute(state, options, cancel).await
    }

    /// Start a run in the background.
    pub fn spawn(
        &self,
        query: &str,
        options: RunOptions,
    ) -> std::result::Result<RunHandle, RunError> {
        let state = prepare(query)?;
        let run_id = state.run_id().to_string();
        let cancel = CancellationToken::new();

        let coordinator = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { coordinator.execute(state, options, token).await });

        Ok(RunHandle {
            run_id,
            cancel,
            handle,
        })
    }

    async fn execute(
        &self,
        state: ResearchState,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> std::result::Result<ResearchOutcome, RunError> {
        let span = info_span!("research_run", run_id = %state.run_id());
        self.execute_inner(state, options, cancel)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        state: ResearchState,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> std::result::Result<ResearchOutcome, RunError> {
        let started = Instant::now();
        info!(query = %state.query(), max_iterations = options.max_iterations, "Starting research");

        let workflow = WorkflowConfig {
            max_iterations: options.max_iterations,
            ..self.workflow.clone()
        };
        let agents = ResearchAgents::new(self.llm.clone(), self.gateway.clone(), &workflow);
        let engine = WorkflowEngine::new(
            agents,
            ExecutionLimits {
                step_timeout: options.step_timeout,
                run_timeout: options.run_timeout,
            },
        );

        let output = engine.execute(state, &cancel).await?;
        let state = output.state;
        let steps = output.steps;

        let Some(report) = state.report().map(str::to_string) else {
            return Err(RunError::from_state(
                RunErrorKind::Failed,
                "run ended without a report",
                &state,
                steps.len(),
            ));
        };

        let capped = steps
            .iter()
            .any(|step| step.condition == EdgeCondition::IterationCapReached);
        if options.strict && capped {
            warn!("strict mode: iteration cap reached, treating the result as a failure");
            return Err(RunError::from_state(
                RunErrorKind::MaxIterationsPartial,
                format!(
                    "iteration limit of {} reached without sufficient evidence",
                    options.max_iterations
                ),
                &state,
                steps.len(),
            ));
        }

        let sources = state
            .accepted_sources()
            .into_iter()
            .map(|r| Source {
                source_id: r.source_id.clone(),
                title: r.title.clone(),
                url: r.url.clone(),
            })
            .collect();
        let duration_ms = started.elapsed().as_millis() as u64;

        info!(
            steps = steps.len(),
            warnings = state.warnings().len(),
            duration_ms,
            "Research complete"
        );

        Ok(ResearchOutcome {
            run_id: state.run_id().to_string(),
            report,
            warnings: state.warnings().to_vec(),
            sources,
            steps,
            state,
            duration_ms,
        })
    }
}

fn prepare(query: &str) -> std::result::Result<ResearchState, RunError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RunError::invalid_query(EMPTY_QUERY_MESSAGE));
    }
    Ok(ResearchState::new(query))
}

/// Handle to a run started with [`ResearchCoordinator::spawn`].
pub struct RunHandle {
    run_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<std::result::Result<ResearchOutcome, RunError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Request cancellation. Takes effect at the next step boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> std::result::Result<ResearchOutcome, RunError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(RunError {
                kind: RunErrorKind::Failed,
                message: format!(
                    "run task ended abnormally: {}; the message log was lost with the task",
                    e
                ),
                run_id: Some(self.run_id),
                messages: Vec::new(),
                partial_report: None,
                warnings: Vec::new(),
                steps: 0,
            }),
        }
    }
}
