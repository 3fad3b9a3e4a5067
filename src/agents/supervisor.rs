use crate::agents::{AgentError, ResearchAgent, StageOutput};
use crate::state::{ResearchState, StateDelta};
use crate::types::Phase;
use crate::workflows::graph::{EdgeCondition, ResearchGraph, RouteDecision};
use async_trait::async_trait;

/// Pure routing over committed state. Never calls a capability.
pub struct SupervisorAgent {
    graph: ResearchGraph,
    max_iterations: u32,
}

impl SupervisorAgent {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            graph: ResearchGraph::standard(),
            max_iterations,
        }
    }

    pub fn with_graph(graph: ResearchGraph, max_iterations: u32) -> Self {
        Self {
            graph,
            max_iterations,
        }
    }

    pub fn graph(&self) -> &ResearchGraph {
        &self.graph
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Same state, same decision.
    pub fn decide(&self, state: &ResearchState) -> RouteDecision {
        self.graph
            .route(Phase::Supervisor, state, self.max_iterations)
            .unwrap_or(RouteDecision {
                next: Phase::Synthesizer,
                condition: EdgeCondition::Ready,
            })
    }
}

#[async_trait]
impl ResearchAgent for SupervisorAgent {
    fn phase(&self) -> Phase {
        Phase::Supervisor
    }

    async fn run(&self, snapshot: &ResearchState) -> Result<StageOutput, AgentError> {
        let decision = self.decide(snapshot);
        Ok(StageOutput::new(StateDelta::new(), Some(decision.next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateStore;

    #[tokio::test]
    async fn test_fresh_state_routes_to_planner() {
        let supervisor = SupervisorAgent::new(3);
        let state = ResearchState::new("what is rust");

        let output = supervisor.run(&state).await.unwrap();
        assert!(output.delta.is_empty());
        assert_eq!(output.hint, Some(Phase::Planner));
    }

    #[test]
    fn test_degraded_state_routes_to_synthesizer() {
        let supervisor = SupervisorAgent::new(3);
        let mut store = StateStore::new(ResearchState::new("q"));
        store.mark_degraded("planner failed");

        let decision = supervisor.decide(store.state());
        assert_eq!(decision.next, Phase::Synthesizer);
        assert_eq!(decision.condition, EdgeCondition::Degraded);
    }
}
