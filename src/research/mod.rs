//! Research run controller
//!
//! The public entry point of the crate. A [`coordinator::ResearchCoordinator`]
//! owns the reasoning client and the capability gateway; each call to
//! `start` builds a fresh set of stages and walks the research graph for one
//! query.
//!
//! # Usage
//!
//! ```ignore
//! use deep_research::research::{ResearchCoordinator, RunOptions};
//!
//! let coordinator = ResearchCoordinator::from_config(&config).await?;
//! let outcome = coordinator
//!     .start("What is the capital of France?", RunOptions::default())
//!     .await?;
//!
//! println!("{}", outcome.report);
//! for warning in &outcome.warnings {
//!     println!("warning: {}", warning);
//! }
//! ```
//!
//! Background runs go through [`coordinator::ResearchCoordinator::spawn`],
//! whose handle can `cancel()` the run and `wait()` for its result.

/// Run lifecycle: start, spawn, cancel, wait.
pub mod coordinator;
/// Terminal run failures.
pub mod error;

pub use coordinator::{
    ResearchCoordinator, ResearchOutcome, RunHandle, RunOptions, EMPTY_QUERY_MESSAGE,
};
pub use error::{RunError, RunErrorKind};
