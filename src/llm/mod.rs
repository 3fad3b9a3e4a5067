//! LLM Provider Clients and Abstractions
//!
//! This module provides the reasoning capability used inside each research
//! stage. It abstracts provider-specific implementations behind the
//! [`LLMClient`] trait, so the workflow runs unchanged against any backend,
//! including scripted clients in tests.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use deep_research::llm::Provider;
//!
//! let provider = Provider::from_config(&config.llm)?;
//! let client = provider.create_client().await?;
//! let answer = client.generate_with_system("Be brief.", "What is 2+2?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider};
