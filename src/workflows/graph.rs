use crate::state::ResearchState;
use crate::types::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guard on a graph edge, evaluated against committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    Always,
    /// A stage failed and the run is heading straight to synthesis.
    Degraded,
    PlanEmpty,
    PendingSubQuestions,
    UncheckedBatch,
    StaleReflection,
    /// Insufficient and below the iteration cap; taking this edge starts a new iteration.
    NeedsMoreResearch,
    /// Insufficient at the iteration cap; synthesis proceeds with a partial-result warning.
    IterationCapReached,
    Ready,
}

impl EdgeCondition {
    pub fn holds(&self, state: &ResearchState, max_iterations: u32) -> bool {
        let insufficient = state.reflection().is_some_and(|r| !r.sufficient);
        match self {
            EdgeCondition::Always | EdgeCondition::Ready => true,
            EdgeCondition::Degraded => state.degraded().is_some() && state.report().is_none(),
            EdgeCondition::PlanEmpty => state.plan().is_empty(),
            EdgeCondition::PendingSubQuestions => !state.pending_sub_questions().is_empty(),
            EdgeCondition::UncheckedBatch => state.has_unchecked_batch(),
            EdgeCondition::StaleReflection => state.reflection_is_stale(),
            EdgeCondition::NeedsMoreResearch => {
                insufficient && state.iteration_count() < max_iterations
            }
            EdgeCondition::IterationCapReached => {
                insufficient && state.iteration_count() >= max_iterations
            }
        }
    }
}

impl fmt::Display for EdgeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeCondition::Always => "always",
            EdgeCondition::Degraded => "degraded",
            EdgeCondition::PlanEmpty => "plan_empty",
            EdgeCondition::PendingSubQuestions => "pending_sub_questions",
            EdgeCondition::UncheckedBatch => "unchecked_batch",
            EdgeCondition::StaleReflection => "stale_reflection",
            EdgeCondition::NeedsMoreResearch => "needs_more_research",
            EdgeCondition::IterationCapReached => "iteration_cap_reached",
            EdgeCondition::Ready => "ready",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Phase,
    pub to: Phase,
    pub condition: EdgeCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub next: Phase,
    pub condition: EdgeCondition,
}

/// Directed graph of research nodes with conditional edges.
///
/// Outgoing edges of a node are kept in priority order; the first edge whose
/// condition holds is taken. Any node may additionally move to `Failed`.
#[derive(Debug, Clone)]
pub struct ResearchGraph {
    edges: Vec<Edge>,
}

impl ResearchGraph {
    /// `Start -> Supervisor <-> {stages} -> Synthesizer -> End`.
    pub fn standard() -> Self {
        use EdgeCondition::*;
        use Phase::*;

        let edge = |from, to, condition| Edge {
            from,
            to,
            condition,
        };

        Self {
            edges: vec![
                edge(Start, Supervisor, Always),
                // supervisor routing, highest priority first
                edge(Supervisor, Synthesizer, Degraded),
                edge(Supervisor, Planner, PlanEmpty),
                edge(Supervisor, Searcher, PendingSubQuestions),
                edge(Supervisor, CitationChecker, UncheckedBatch),
                edge(Supervisor, Reflector, StaleReflection),
                edge(Supervisor, Planner, NeedsMoreResearch),
                edge(Supervisor, Synthesizer, IterationCapReached),
                edge(Supervisor, Synthesizer, Ready),
                // every working stage hands control back
                edge(Planner, Supervisor, Always),
                edge(Searcher, Supervisor, Always),
                edge(CitationChecker, Supervisor, Always),
                edge(Reflector, Supervisor, Always),
                edge(Synthesizer, End, Always),
            ],
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// First outgoing edge of `from` whose condition holds.
    pub fn route(
        &self,
        from: Phase,
        state: &ResearchState,
        max_iterations: u32,
    ) -> Option<RouteDecision> {
        self.edges
            .iter()
            .filter(|e| e.from == from)
            .find(|e| e.condition.holds(state, max_iterations))
            .map(|e| RouteDecision {
                next: e.to,
                condition: e.condition,
            })
    }

    pub fn allows(&self, from: Phase, to: Phase) -> bool {
        to == Phase::Failed || self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    pub fn successors(&self, from: Phase) -> Vec<Phase> {
        let mut next: Vec<Phase> = self
            .edges
            .iter()
            .filter(|e| e.from == from)
            .map(|e| e.to)
            .collect();
        next.sort();
        next.dedup();
        next
    }
}

impl Default for ResearchGraph {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CitationVerdict, Coverage, ReflectionVerdict, SearchResult, StateDelta, StateStore};
    use chrono::Utc;
    use rstest::rstest;

    /// Which milestones a fixture state has passed.
    #[derive(Clone, Copy)]
    enum Milestone {
        Fresh,
        Planned,
        Searched,
        Checked,
        Reflected { sufficient: bool, iterations: u32 },
    }

    fn state_at(milestone: Milestone) -> ResearchState {
        let mut store = StateStore::new(ResearchState::new("query"));
        if matches!(milestone, Milestone::Fresh) {
            return store.into_state();
        }
        store
            .commit(StateDelta::new().with_plan(vec!["q1".to_string()]))
            .unwrap();
        if matches!(milestone, Milestone::Planned) {
            return store.into_state();
        }

        let mut delta = StateDelta::new();
        delta.search_results.push(SearchResult {
            source_id: "S1-1".to_string(),
            sub_question: "q1".to_string(),
            title: "t".to_string(),
            url: Some("https://example.com".to_string()),
            snippet: "a reasonably long snippet".to_string(),
            retrieved_at: Utc::now(),
            retrieval_tool: "web_search".to_string(),
            batch: 1,
        });
        delta.coverage.push(Coverage {
            plan_revision: 1,
            sub_question: "q1".to_string(),
            batch: 1,
            hits: 1,
            error: None,
        });
        store.commit(delta).unwrap();
        if matches!(milestone, Milestone::Searched) {
            return store.into_state();
        }

        let delta = StateDelta {
            citations: vec![("S1-1".to_string(), CitationVerdict::accepted(1))],
            checked_batch: Some(1),
            ..StateDelta::default()
        };
        store.commit(delta).unwrap();
        if matches!(milestone, Milestone::Checked) {
            return store.into_state();
        }

        if let Milestone::Reflected {
            sufficient,
            iterations,
        } = milestone
        {
            store
                .commit(StateDelta::new().with_reflection(ReflectionVerdict {
                    sufficient,
                    missing_aspects: vec![],
                }))
                .unwrap();
            for _ in 0..iterations {
                store.begin_iteration();
            }
        }
        store.into_state()
    }

    #[rstest]
    #[case::fresh(Milestone::Fresh, Phase::Planner, EdgeCondition::PlanEmpty)]
    #[case::planned(Milestone::Planned, Phase::Searcher, EdgeCondition::PendingSubQuestions)]
    #[case::searched(Milestone::Searched, Phase::CitationChecker, EdgeCondition::UncheckedBatch)]
    #[case::checked(Milestone::Checked, Phase::Reflector, EdgeCondition::StaleReflection)]
    #[case::insufficient(
        Milestone::Reflected { sufficient: false, iterations: 0 },
        Phase::Planner,
        EdgeCondition::NeedsMoreResearch
    )]
    #[case::capped(
        Milestone::Reflected { sufficient: false, iterations: 3 },
        Phase::Synthesizer,
        EdgeCondition::IterationCapReached
    )]
    #[case::sufficient(
        Milestone::Reflected { sufficient: true, iterations: 1 },
        Phase::Synthesizer,
        EdgeCondition::Ready
    )]
    fn test_supervisor_routing(
        #[case] milestone: Milestone,
        #[case] next: Phase,
        #[case] condition: EdgeCondition,
    ) {
        let graph = ResearchGraph::standard();
        let state = state_at(milestone);
        let decision = graph.route(Phase::Supervisor, &state, 3).unwrap();
        assert_eq!(decision, RouteDecision { next, condition });
    }

    #[test]
    fn test_degraded_run_goes_to_synthesis() {
        let graph = ResearchGraph::standard();
        let mut store = StateStore::new(state_at(Milestone::Planned));
        store.mark_degraded("searcher timed out");
        let decision = graph.route(Phase::Supervisor, store.state(), 3).unwrap();
        assert_eq!(decision.next, Phase::Synthesizer);
        assert_eq!(decision.condition, EdgeCondition::Degraded);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let graph = ResearchGraph::standard();
        let state = state_at(Milestone::Searched);
        let first = graph.route(Phase::Supervisor, &state, 3);
        for _ in 0..10 {
            assert_eq!(graph.route(Phase::Supervisor, &state.clone(), 3), first);
        }
    }

    #[test]
    fn test_allowed_transitions() {
        let graph = ResearchGraph::standard();
        assert!(graph.allows(Phase::Start, Phase::Supervisor));
        assert!(graph.allows(Phase::Synthesizer, Phase::End));
        assert!(graph.allows(Phase::Reflector, Phase::Failed));
        assert!(!graph.allows(Phase::Planner, Phase::Searcher));
        assert!(!graph.allows(Phase::Supervisor, Phase::End));
        assert_eq!(
            graph.successors(Phase::Supervisor),
            vec![
                Phase::Planner,
                Phase::Searcher,
                Phase::CitationChecker,
                Phase::Reflector,
                Phase::Synthesizer
            ]
        );
    }
}
