//! # deep-research
//!
//! A multi-stage research agent. A query is planned into sub-questions,
//! searched through rate-limited capabilities, citation-checked, reflected on
//! until the evidence is sufficient (or an iteration cap is reached) and
//! synthesized into a report that cites only validated sources.
//!
//! ## Overview
//!
//! deep-research can be used in two ways:
//!
//! 1. **As a CLI** - Run the `deep-research` binary
//! 2. **As a library** - Start runs from your own async code
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use deep_research::{ResearchConfig, ResearchCoordinator, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ResearchConfig::load_or_default("research.toml")?;
//!     let coordinator = ResearchCoordinator::from_config(&config).await?;
//!
//!     let outcome = coordinator
//!         .start("What is the capital of France?", RunOptions::default())
//!         .await?;
//!     println!("{}", outcome.report);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Background runs and cancellation
//!
//! ```rust,ignore
//! let handle = coordinator.spawn("history of the Rust language", RunOptions::default())?;
//! // ... later
//! handle.cancel();
//! match handle.wait().await {
//!     Err(e) if e.is_cancelled() => println!("stopped after {} messages", e.messages.len()),
//!     other => println!("{:?}", other.map(|o| o.report)),
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API and compatible endpoints |
//!
//! ## Modules
//!
//! - [`research`] - Run controller: start, spawn, cancel
//! - [`workflows`] - Research graph and executor
//! - [`agents`] - The six research stages
//! - [`state`] - Run state and its transactional store
//! - [`tools`] - Capability gateway and capabilities (search, reference, clock)
//! - [`llm`] - Reasoning clients
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// The research stages and their shared contract.
pub mod agents;
/// Command-line parsing and terminal output.
pub mod cli;
/// Reasoning provider clients and abstractions.
pub mod llm;
/// Context window management for reasoning calls.
pub mod memory;
/// Run controller.
pub mod research;
/// Research state, deltas and the state store.
pub mod state;
/// Capability gateway and built-in capabilities.
pub mod tools;
/// Core types (phases, messages, errors).
pub mod types;
/// Configuration and logging setup.
pub mod utils;
/// Research graph and executor.
pub mod workflows;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use research::{ResearchCoordinator, ResearchOutcome, RunError, RunErrorKind, RunHandle, RunOptions};
pub use state::{ResearchState, RunWarning, StateDelta, StateStore};
pub use tools::{Capability, CapabilityError, CapabilityGateway, CapabilityRegistry};
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, ResearchConfig};
pub use workflows::{WorkflowEngine, WorkflowOutput, WorkflowStep};
