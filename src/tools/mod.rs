//! External capabilities and the gateway that calls them.
//!
//! Stages never talk to a search engine or an encyclopedia directly. They go
//! through a [`CapabilityGateway`], which owns a [`CapabilityRegistry`] of named
//! [`Capability`] implementations plus the timeout, retry and throttling policy.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - the `Capability` trait and registration
//! - [`gateway`](crate::tools::gateway) - `invoke` with timeout, retry and backoff
//! - [`rate_limit`](crate::tools::rate_limit) - outbound throttle shared across runs
//! - [`search`](crate::tools::search) - web search (DuckDuckGo via daedra, Tavily)
//! - [`reference`](crate::tools::reference) - Wikipedia summaries
//! - [`clock`](crate::tools::clock) - current time
//!
//! # Error Classification
//!
//! Capabilities report failures as [`CapabilityError`]s that are either
//! transient (retried with exponential backoff) or permanent (returned at
//! once). A transient error that survives every retry comes back as
//! [`CapabilityErrorKind::Exhausted`]; the calling stage decides whether to
//! degrade.
//!
//! ```ignore
//! let gateway = tools::gateway_from_config(&config);
//! let budget = gateway.default_budget();
//! let hits = gateway.invoke(tools::WEB_SEARCH, json!({"query": "rust"}), &budget).await?;
//! ```

/// Current date and time.
pub mod clock;
/// Capability error classification.
pub mod error;
/// Capability gateway with retry policy.
pub mod gateway;
/// Shared outbound rate limiter.
pub mod rate_limit;
/// Encyclopedia lookup.
pub mod reference;
/// Capability registration and discovery.
pub mod registry;
/// Web search backends.
pub mod search;

pub use error::{CapabilityError, CapabilityErrorKind};
pub use gateway::{CallBudget, CallLog, CapabilityCall, CapabilityGateway};
pub use rate_limit::RateLimiter;
pub use registry::{Capability, CapabilityDefinition, CapabilityRegistry};

use crate::utils::toml_config::{ResearchConfig, SearchProvider};
use std::sync::Arc;
use tracing::warn;

pub const WEB_SEARCH: &str = "web_search";
pub const LOOKUP_REFERENCE: &str = "lookup_reference";
pub const CURRENT_DATETIME: &str = "current_datetime";

/// Registry with the capabilities selected by `config`.
pub fn registry_from_config(config: &ResearchConfig) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    let tavily_key = match config.search.provider {
        SearchProvider::Tavily => {
            let key = config.resolve_env(&config.search.api_key_env);
            if key.is_none() {
                warn!(
                    "{} not set, search is limited to DuckDuckGo",
                    config.search.api_key_env
                );
            }
            key
        }
        SearchProvider::DuckDuckGo => None,
    };

    match tavily_key {
        Some(key) => {
            let base = config
                .search
                .base_url
                .clone()
                .unwrap_or_else(|| search::TAVILY_API_BASE.to_string());
            registry.register(Arc::new(search::TavilySearch::with_base_url(
                key,
                base,
                config.search.max_results,
            )));
        }
        None => registry.register(Arc::new(search::WebSearch::new(config.search.max_results))),
    }

    if config.reference.enabled {
        registry.register(Arc::new(reference::ReferenceLookup::with_base_url(
            config.reference.base_url.clone(),
            config.reference.max_chars,
        )));
    }

    registry.register(Arc::new(clock::ClockCapability::new()));
    registry
}

/// Gateway over [`registry_from_config`] with the configured budget and limiter.
pub fn gateway_from_config(config: &ResearchConfig) -> CapabilityGateway {
    let limiter = RateLimiter::new(
        config.gateway.max_concurrent_calls,
        config.gateway.min_call_interval(),
    );
    CapabilityGateway::with_limiter(
        registry_from_config(config),
        Arc::new(limiter),
        config.gateway.budget(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_registry() {
        let registry = registry_from_config(&ResearchConfig::default());
        assert_eq!(
            registry.names(),
            vec![
                CURRENT_DATETIME.to_string(),
                LOOKUP_REFERENCE.to_string(),
                WEB_SEARCH.to_string()
            ]
        );
    }

    #[test]
    fn test_reference_can_be_disabled() {
        let mut config = ResearchConfig::default();
        config.reference.enabled = false;
        let gateway = gateway_from_config(&config);
        assert!(!gateway.has_capability(LOOKUP_REFERENCE));
        assert!(gateway.has_capability(WEB_SEARCH));
        assert_eq!(gateway.limiter().available_permits(), 4);
    }
}
