//! Graph executor
//!
//! Drives one research run through the [`ResearchGraph`]: asks the supervisor
//! for the next node, runs that node against a snapshot under a step timeout,
//! commits its delta and repeats until the synthesizer has written the report.

use crate::agents::{AgentError, AgentNode, ResearchAgents, StageOutput};
use crate::research::error::{RunError, RunErrorKind};
use crate::state::{ResearchState, RunWarning, StateDelta, StateIntegrityError, StateStore};
use crate::tools::CapabilityCall;
use crate::types::{Message, Phase};
use crate::workflows::graph::{EdgeCondition, RouteDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Timing limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub step_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
        }
    }
}

/// Output from a workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub state: ResearchState,
    /// Detailed path showing each node execution
    pub steps: Vec<WorkflowStep>,
}

/// A single node execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step: usize,
    pub phase: Phase,
    /// Edge the supervisor took to get here
    pub condition: EdgeCondition,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub messages_appended: usize,
    pub hint: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a node execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepOutcome {
    Committed,
    /// The stage failed; the run was degraded.
    StageFailed(String),
    /// The delta was rejected by the store.
    Corrupted(String),
}

/// Upper bound on node executions: every allowed cycle round plus synthesis.
pub fn step_ceiling(max_iterations: u32) -> usize {
    (max_iterations as usize + 1) * 4 + 2
}

pub struct WorkflowEngine {
    agents: ResearchAgents,
    limits: ExecutionLimits,
}

impl WorkflowEngine {
    pub fn new(agents: ResearchAgents, limits: ExecutionLimits) -> Self {
        Self { agents, limits }
    }

    pub fn agents(&self) -> &ResearchAgents {
        &self.agents
    }

    /// Run `state` to completion.
    ///
    /// Cancellation and the run deadline are checked before every node
    /// execution, never in the middle of one.
    pub async fn execute(
        &self,
        state: ResearchState,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutput, RunError> {
        let supervisor = &self.agents.supervisor;
        let max_iterations = supervisor.max_iterations();
        let ceiling = step_ceiling(max_iterations);
        let deadline = Instant::now() + self.limits.run_timeout;

        let mut store = StateStore::new(state);
        let mut steps: Vec<WorkflowStep> = Vec::new();

        let query = store.state().query().to_string();
        if let Err(e) = commit(&mut store, StateDelta::new().with_message(Message::user(query))) {
            return Err(self.abort(RunErrorKind::Failed, e.to_string(), &mut store, &steps));
        }
        self.transition(&mut store, Phase::Start, Phase::Supervisor, &steps)?;

        loop {
            if cancel.is_cancelled() {
                info!(steps = steps.len(), "run cancelled");
                return Err(self.abort(
                    RunErrorKind::Cancelled,
                    "run cancelled by caller",
                    &mut store,
                    &steps,
                ));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                error!(steps = steps.len(), "run timed out");
                return Err(self.abort(
                    RunErrorKind::Failed,
                    format!("run timed out after {}s", self.limits.run_timeout.as_secs()),
                    &mut store,
                    &steps,
                ));
            }

            let decision = supervisor.decide(store.state());
            debug!(next = %decision.next, condition = %decision.condition, "supervisor routed");

            if steps.len() >= ceiling {
                error!(ceiling, "step ceiling exceeded");
                return Err(self.abort(
                    RunErrorKind::MaxIterationsPartial,
                    format!("exceeded {} steps without finishing", ceiling),
                    &mut store,
                    &steps,
                ));
            }

            match decision.condition {
                EdgeCondition::NeedsMoreResearch => {
                    let iteration = store.begin_iteration();
                    info!("Research iteration {}/{}", iteration, max_iterations);
                }
                EdgeCondition::IterationCapReached => {
                    warn!(max_iterations, "iteration cap reached with insufficient evidence");
                    let delta = StateDelta::new()
                        .with_message(Message::system(
                            Phase::Supervisor,
                            format!(
                                "Iteration limit of {} reached; synthesizing from the evidence gathered so far.",
                                max_iterations
                            ),
                        ))
                        .with_warning(RunWarning::partial(format!(
                            "research stopped after {} iteration(s) without a sufficient verdict",
                            max_iterations
                        )));
                    if let Err(e) = commit(&mut store, delta) {
                        return Err(self.abort(
                            RunErrorKind::Failed,
                            e.to_string(),
                            &mut store,
                            &steps,
                        ));
                    }
                }
                _ => {}
            }

            self.transition(&mut store, Phase::Supervisor, decision.next, &steps)?;
            let Some(node) = self.agents.node(decision.next) else {
                return Err(self.abort(
                    RunErrorKind::Failed,
                    format!("no stage for phase {}", decision.next),
                    &mut store,
                    &steps,
                ));
            };

            let (step, outcome) = self
                .run_step(node, decision, &mut store, remaining, steps.len() + 1)
                .await;
            let phase = step.phase;
            steps.push(step);

            if let Some((kind, message)) = terminal_error(phase, &outcome) {
                error!(phase = %phase, error = %message, "run failed");
                return Err(self.abort(kind, message, &mut store, &steps));
            }
            if phase == Phase::Synthesizer {
                self.transition(&mut store, Phase::Synthesizer, Phase::End, &steps)?;
                break;
            }
            self.transition(&mut store, phase, Phase::Supervisor, &steps)?;
        }

        info!(steps = steps.len(), "run finished");
        Ok(WorkflowOutput {
            state: store.into_state(),
            steps,
        })
    }

    /// Run one node and fold its outcome into the store.
    ///
    /// A failed stage other than the synthesizer degrades the run.
    async fn run_step(
        &self,
        node: AgentNode<'_>,
        decision: RouteDecision,
        store: &mut StateStore,
        remaining: Duration,
        number: usize,
    ) -> (WorkflowStep, StepOutcome) {
        let phase = node.phase();
        let span = info_span!("stage", step = number, phase = %phase);
        let before = store.state().messages().len();
        let started_at = Utc::now();
        let started = Instant::now();
        let limit = self.limits.step_timeout.min(remaining);

        info!(step = number, phase = %phase, "running stage");
        let snapshot = store.snapshot();
        // calls left over from an earlier stage were already logged by it
        self.agents.call_log.drain();
        let outcome = match tokio::time::timeout(limit, node.run(&snapshot))
            .instrument(span.clone())
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::Timeout {
                stage: phase,
                after_ms: limit.as_millis() as u64,
            }),
        };
        let finished_calls = self.agents.call_log.drain();
        let (hint, outcome) = fold_outcome(store, phase, outcome, finished_calls);

        let error = match &outcome {
            StepOutcome::Committed => None,
            StepOutcome::StageFailed(reason) | StepOutcome::Corrupted(reason) => {
                Some(reason.clone())
            }
        };
        let step = WorkflowStep {
            step: number,
            phase,
            condition: decision.condition,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            messages_appended: store.state().messages().len() - before,
            hint,
            error,
        };
        (step, outcome)
    }

    fn transition(
        &self,
        store: &mut StateStore,
        from: Phase,
        to: Phase,
        steps: &[WorkflowStep],
    ) -> Result<(), RunError> {
        if !self.agents.supervisor.graph().allows(from, to) {
            return Err(self.abort(
                RunErrorKind::Failed,
                format!("illegal transition {} -> {}", from, to),
                store,
                steps,
            ));
        }
        store.set_phase(to);
        Ok(())
    }

    fn abort(
        &self,
        kind: RunErrorKind,
        message: impl Into<String>,
        store: &mut StateStore,
        steps: &[WorkflowStep],
    ) -> RunError {
        store.set_phase(Phase::Failed);
        RunError::from_state(kind, message, store.state(), steps.len())
    }
}

fn commit(store: &mut StateStore, delta: StateDelta) -> Result<(), StateIntegrityError> {
    store.commit(delta).map(|_| ())
}

/// Fold a stage's result into the store.
///
/// A successful output is committed as one delta; the stage has already
/// logged its own capability calls, so `finished_calls` is dropped. A failed
/// stage other than the synthesizer degrades the run, and the calls it
/// finished before failing are logged as tool messages.
fn fold_outcome(
    store: &mut StateStore,
    phase: Phase,
    outcome: Result<StageOutput, AgentError>,
    finished_calls: Vec<CapabilityCall>,
) -> (Option<Phase>, StepOutcome) {
    match outcome {
        Ok(output) => {
            debug!(phase = %phase, hint = ?output.hint, "stage finished");
            match commit(store, output.delta) {
                Ok(()) => (output.hint, StepOutcome::Committed),
                Err(e) => {
                    error!(phase = %phase, error = %e, "stage produced an invalid delta");
                    (output.hint, StepOutcome::Corrupted(e.to_string()))
                }
            }
        }
        Err(e) => {
            warn!(phase = %phase, error = %e, calls = finished_calls.len(), "stage failed");
            if phase != Phase::Synthesizer {
                degrade(store, phase, &e, finished_calls);
            }
            (None, StepOutcome::StageFailed(e.to_string()))
        }
    }
}

/// Record a stage failure and steer the run to synthesis.
fn degrade(
    store: &mut StateStore,
    phase: Phase,
    err: &AgentError,
    finished_calls: Vec<CapabilityCall>,
) {
    let reason = format!("{} failed: {}", phase, err);
    let mut delta = StateDelta::new();
    for call in &finished_calls {
        delta.push_message(call.to_message(phase));
    }
    let delta = delta
        .with_message(Message::system(
            phase,
            format!("{}; continuing to synthesis with the evidence gathered so far.", reason),
        ))
        .with_warning(RunWarning::CapabilityDegraded {
            capability: err.capability(),
            detail: err.to_string(),
        })
        .with_warning(RunWarning::partial(reason.clone()));
    if let Err(e) = commit(store, delta) {
        error!(error = %e, "could not record stage failure");
    }
    store.mark_degraded(reason);
}

/// How a step outcome ends the run, if it does.
fn terminal_error(phase: Phase, outcome: &StepOutcome) -> Option<(RunErrorKind, String)> {
    match (phase, outcome) {
        (_, StepOutcome::Corrupted(reason)) => Some((
            RunErrorKind::Failed,
            format!("{} produced an invalid update: {}", phase, reason),
        )),
        (Phase::Synthesizer, StepOutcome::StageFailed(reason)) => {
            Some((RunErrorKind::Failed, format!("synthesis failed: {}", reason)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CitationVerdict;
    use crate::tools::{CapabilityError, WEB_SEARCH};
    use crate::types::MessageRole;
    use serde_json::json;

    fn planned_store() -> StateStore {
        let mut store = StateStore::new(ResearchState::new("query"));
        store
            .commit(StateDelta::new().with_plan(vec!["q1".to_string()]))
            .unwrap();
        store
    }

    #[test]
    fn test_invalid_delta_is_corrupted_and_fatal() {
        let mut store = planned_store();
        let before = store.state().clone();

        let forged = StateDelta {
            citations: vec![("S9-9".to_string(), CitationVerdict::accepted(1))],
            ..StateDelta::default()
        }
        .with_message(Message::assistant(Phase::CitationChecker, "checked"));
        let output = StageOutput::new(forged, Some(Phase::Reflector));

        let (hint, outcome) = fold_outcome(&mut store, Phase::CitationChecker, Ok(output), vec![]);

        assert_eq!(hint, Some(Phase::Reflector));
        assert!(matches!(outcome, StepOutcome::Corrupted(ref reason) if reason.contains("S9-9")));
        assert_eq!(store.state(), &before);

        let (kind, message) = terminal_error(Phase::CitationChecker, &outcome).unwrap();
        assert_eq!(kind, RunErrorKind::Failed);
        assert!(message.contains("invalid update"));
    }

    #[test]
    fn test_failed_stage_keeps_finished_calls() {
        let mut store = planned_store();
        let finished = CapabilityCall {
            id: "call-1".to_string(),
            capability: WEB_SEARCH.to_string(),
            arguments: json!({ "query": "q1" }),
            attempts: 3,
            duration_ms: 12,
            result: Err(CapabilityError::transient(WEB_SEARCH, "connection reset")),
        };
        let err = AgentError::Timeout {
            stage: Phase::Searcher,
            after_ms: 1000,
        };

        let (hint, outcome) = fold_outcome(&mut store, Phase::Searcher, Err(err), vec![finished]);

        assert_eq!(hint, None);
        assert!(matches!(outcome, StepOutcome::StageFailed(_)));
        assert!(terminal_error(Phase::Searcher, &outcome).is_none());
        assert!(store.state().degraded().is_some());

        let roles: Vec<_> = store.state().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::Tool, MessageRole::System]);
        assert!(store.state().messages()[0].content.contains("connection reset"));
    }

    #[test]
    fn test_failed_synthesis_is_fatal_without_degrading() {
        let mut store = planned_store();
        let err = AgentError::Reasoning(crate::types::AppError::LLM("offline".to_string()));

        let (_, outcome) = fold_outcome(&mut store, Phase::Synthesizer, Err(err), vec![]);

        assert!(store.state().degraded().is_none());
        let (kind, message) = terminal_error(Phase::Synthesizer, &outcome).unwrap();
        assert_eq!(kind, RunErrorKind::Failed);
        assert!(message.starts_with("synthesis failed"));
    }
}
