//! Shared research state and its transactional store.
//!
//! A run owns exactly one [`ResearchState`], held by a [`StateStore`]. Stages
//! read a snapshot and propose a [`StateDelta`]; the store validates the delta
//! against the state invariants and applies it atomically, or rejects it with a
//! [`StateIntegrityError`] and leaves the state unchanged.
//!
//! # Invariants
//!
//! - the message log only grows
//! - every citation verdict references a known source id
//! - the report is written at most once and is never blank
//! - search batches are numbered consecutively

mod delta;
mod model;
mod store;

pub use delta::StateDelta;
pub use model::{
    new_run_id, CitationVerdict, Coverage, Reflection, ReflectionVerdict, ResearchState,
    RunWarning, SearchResult,
};
pub use store::{StateIntegrityError, StateStore};
