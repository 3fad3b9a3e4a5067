//! TOML-based configuration for the research orchestrator
//!
//! This module provides declarative configuration for the reasoning provider,
//! the capability gateway, search backends and the research workflow via a
//! TOML file (`research.toml`). Every field has a default, so an empty file (or
//! no file at all) yields a runnable local setup.
//!
//! Secrets never live in the file: sections name the environment variable
//! that holds a key (`api_key_env`), which may come from a `.env` file.
//!
//! # Reloading
//!
//! Use [`ConfigManager`] for lockless shared access to the current
//! configuration. [`ConfigManager::reload`] swaps in a freshly parsed file;
//! runs already in flight keep the snapshot they started with.

use crate::tools::CallBudget;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reasoning provider
    #[serde(default)]
    pub llm: ProviderConfig,

    /// Timeout, retry and throttling policy for capability calls
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Encyclopedia lookup
    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        #[serde(default = "default_openai_model")]
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Ollama { model, .. } | ProviderConfig::OpenAI { model, .. } => model,
        }
    }
}

// ============= Gateway Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per-attempt timeout for a capability call
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt, for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// In-flight calls allowed across all runs sharing the gateway
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Minimum spacing between call starts
    #[serde(default)]
    pub min_call_interval_ms: u64,
}

fn default_call_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    8000
}

fn default_max_concurrent_calls() -> usize {
    4
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_call_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_concurrent_calls: default_max_concurrent_calls(),
            min_call_interval_ms: 0,
        }
    }
}

impl GatewayConfig {
    pub fn budget(&self) -> CallBudget {
        CallBudget {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// DuckDuckGo through daedra; no key needed
    #[default]
    DuckDuckGo,
    Tavily,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProvider,

    /// Environment variable holding the Tavily key
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    /// Override for the Tavily endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Results requested per sub-question
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::default(),
            api_key_env: default_tavily_key_env(),
            base_url: None,
            max_results: default_max_results(),
        }
    }
}

// ============= Reference Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reference_url")]
    pub base_url: String,

    /// Article text beyond this many characters is cut
    #[serde(default = "default_reference_chars")]
    pub max_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_reference_url() -> String {
    crate::tools::reference::WIKIPEDIA_BASE.to_string()
}

fn default_reference_chars() -> usize {
    3000
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_reference_url(),
            max_chars: default_reference_chars(),
        }
    }
}

// ============= Workflow Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Reflection-driven re-plans allowed before synthesis is forced
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    #[serde(default = "default_max_sub_questions")]
    pub max_sub_questions: usize,

    /// Snippets shorter than this are ambiguous for citation checking
    #[serde(default = "default_min_snippet_chars")]
    pub min_snippet_chars: usize,

    /// Ask the reasoning model about ambiguous sources instead of rejecting them
    #[serde(default = "default_true")]
    pub review_ambiguous_citations: bool,

    /// Token budget for message history passed to the reasoning model
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,

    /// Fail with a partial result instead of warning when the iteration cap is hit
    #[serde(default)]
    pub strict: bool,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_step_timeout() -> u64 {
    120
}

fn default_run_timeout() -> u64 {
    600
}

fn default_max_sub_questions() -> usize {
    3
}

fn default_min_snippet_chars() -> usize {
    20
}

fn default_context_tokens() -> usize {
    6000
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            step_timeout_secs: default_step_timeout(),
            run_timeout_secs: default_run_timeout(),
            max_sub_questions: default_max_sub_questions(),
            min_snippet_chars: default_min_snippet_chars(),
            review_ambiguous_citations: true,
            context_tokens: default_context_tokens(),
            strict: false,
        }
    }
}

impl WorkflowConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    MissingSearchKey,
    ReferenceDisabled,
    HighIterationLimit,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl ResearchConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ResearchConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(path)) => {
                info!("No configuration at {:?}, using defaults", path);
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ProviderConfig::OpenAI { api_key_env, .. } = &self.llm {
            self.validate_env_var(api_key_env)?;
        }

        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.gateway.initial_backoff_ms > self.gateway.max_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "gateway.initial_backoff_ms ({}) exceeds gateway.max_backoff_ms ({})",
                self.gateway.initial_backoff_ms, self.gateway.max_backoff_ms
            )));
        }
        if self.gateway.max_concurrent_calls == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_concurrent_calls must be at least 1".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be at least 1".to_string(),
            ));
        }

        let workflow = &self.workflow;
        if workflow.step_timeout_secs == 0 || workflow.run_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "workflow timeouts must be greater than zero".to_string(),
            ));
        }
        if workflow.max_sub_questions == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.max_sub_questions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and collect non-fatal warnings
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();

        if self.search.provider == SearchProvider::Tavily
            && self.resolve_env(&self.search.api_key_env).is_none()
        {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::MissingSearchKey,
                message: format!(
                    "{} is not set; falling back to DuckDuckGo search",
                    self.search.api_key_env
                ),
            });
        }

        if !self.reference.enabled {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::ReferenceDisabled,
                message: "reference lookup is disabled; research relies on web search only"
                    .to_string(),
            });
        }

        if self.workflow.max_iterations > 10 {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::HighIterationLimit,
                message: format!(
                    "workflow.max_iterations = {} may lead to very long runs",
                    self.workflow.max_iterations
                ),
            });
        }

        Ok(warnings)
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }
}

// ============= Configuration Manager =============

/// Shared, swappable configuration
pub struct ConfigManager {
    config: Arc<ArcSwap<ResearchConfig>>,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ResearchConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: Some(path),
        })
    }

    /// Wrap an in-memory configuration that has no backing file
    pub fn from_config(config: ResearchConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: None,
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ResearchConfig> {
        self.config.load_full()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Re-read the backing file. A broken file leaves the current config in place.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        info!("Reloading configuration from {:?}", path);

        let new_config = ResearchConfig::load(path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[logging]
level = "debug"

[llm]
type = "ollama"
base_url = "http://localhost:11434"
model = "granite4:tiny-h"

[gateway]
timeout_secs = 10
max_retries = 1
initial_backoff_ms = 200
max_backoff_ms = 400

[search]
provider = "duckduckgo"
max_results = 5

[workflow]
max_iterations = 2
max_sub_questions = 4
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config: ResearchConfig = toml::from_str(&create_test_config()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.llm.model(), "granite4:tiny-h");
        assert_eq!(config.gateway.max_retries, 1);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.workflow.max_iterations, 2);
        // untouched fields keep their defaults
        assert_eq!(config.workflow.step_timeout_secs, 120);
        assert!(config.reference.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ResearchConfig = toml::from_str("").unwrap();
        assert_eq!(config, ResearchConfig::default());
        assert_eq!(config.workflow.max_iterations, 3);
        assert_eq!(config.gateway.budget(), CallBudget::default());
    }

    #[test]
    fn test_backoff_order_is_validated() {
        let config: ResearchConfig = toml::from_str(
            r#"
[gateway]
initial_backoff_ms = 9000
max_backoff_ms = 8000
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_openai_requires_key_env() {
        let config: ResearchConfig = toml::from_str(
            r#"
[llm]
type = "openai"
api_key_env = "DEEP_RESEARCH_TEST_UNSET_OPENAI_KEY"
"#,
        )
        .unwrap();
        match config.validate() {
            Err(ConfigError::MissingEnvVar(name)) => {
                assert_eq!(name, "DEEP_RESEARCH_TEST_UNSET_OPENAI_KEY")
            }
            other => panic!("expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_warnings() {
        let config: ResearchConfig = toml::from_str(
            r#"
[search]
provider = "tavily"
api_key_env = "DEEP_RESEARCH_TEST_UNSET_TAVILY_KEY"

[reference]
enabled = false

[workflow]
max_iterations = 12
"#,
        )
        .unwrap();
        let warnings = config.validate_with_warnings().unwrap();
        let kinds: Vec<_> = warnings.iter().map(|w| w.kind.clone()).collect();
        assert!(kinds.contains(&ConfigWarningKind::MissingSearchKey));
        assert!(kinds.contains(&ConfigWarningKind::ReferenceDisabled));
        assert!(kinds.contains(&ConfigWarningKind::HighIterationLimit));
    }

    #[test]
    fn test_manager_without_file_reload_is_noop() {
        let manager = ConfigManager::from_config(ResearchConfig::default());
        assert!(manager.config_path().is_none());
        assert!(manager.reload().is_ok());
        assert_eq!(manager.config().workflow.max_iterations, 3);
    }
}
