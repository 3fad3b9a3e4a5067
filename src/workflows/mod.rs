//! Research graph and its executor
//!
//! [`graph::ResearchGraph`] declares the nodes and the ordered, conditional
//! edges between them; [`engine::WorkflowEngine`] walks that graph for one
//! run, committing each stage's delta before routing again.
//!
//! ```text
//! Start -> Supervisor <-> {Planner, Searcher, CitationChecker, Reflector}
//!          Supervisor  -> Synthesizer -> End
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngine::new(agents, ExecutionLimits::default());
//! let output = engine.execute(ResearchState::new(query), &cancel).await?;
//! println!("{}", output.state.report().unwrap_or_default());
//! println!("Steps: {}", output.steps.len());
//! ```

/// Executor for one research run.
pub mod engine;
/// Nodes, edges and the routing policy.
pub mod graph;

pub use engine::{step_ceiling, ExecutionLimits, WorkflowEngine, WorkflowOutput, WorkflowStep};
pub use graph::{Edge, EdgeCondition, ResearchGraph, RouteDecision};
