//! Test doubles shared by the integration tests.
//!
//! - [`ScriptedLLM`] answers each stage from a script, keyed by the stage's
//!   role prompt, and records how often each stage asked.
//! - [`StaticSearch`], [`FlakySearch`] and [`SlowCapability`] stand in for
//!   the network-backed capabilities.

#![allow(dead_code)]

use async_trait::async_trait;
use deep_research::agents::prompts::{
    CITATION_PROMPT, PLANNER_PROMPT, REFLECTOR_PROMPT, SYNTHESIZER_PROMPT,
};
use deep_research::tools::{Capability, CapabilityError, WEB_SEARCH};
use deep_research::types::{AppError, Result};
use deep_research::LLMClient;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which stage a reasoning call came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Citation,
    Reflector,
    Synthesizer,
    Unknown,
}

impl Role {
    fn of(system: &str) -> Self {
        match system {
            s if s == PLANNER_PROMPT => Role::Planner,
            s if s == CITATION_PROMPT => Role::Citation,
            s if s == REFLECTOR_PROMPT => Role::Reflector,
            s if s == SYNTHESIZER_PROMPT => Role::Synthesizer,
            _ => Role::Unknown,
        }
    }
}

/// Reasoning stub with one script per stage.
///
/// Each script is a list of answers used in order; the last answer repeats.
#[derive(Default)]
pub struct ScriptedLLM {
    scripts: Mutex<HashMap<Role, Vec<String>>>,
    failing: Mutex<Vec<Role>>,
    calls: Mutex<HashMap<Role, usize>>,
    cancel_on: Mutex<Option<(Role, usize, CancellationToken)>>,
}

impl ScriptedLLM {
    pub fn new() -> Self {
        Self::default()
    }

    /// A script where the reflector approves on the first look.
    pub fn approving() -> Self {
        Self::new()
            .answer(
                Role::Planner,
                "RESEARCH PLAN\n- Query: capital\n\nSUB-QUESTIONS:\n1. capital of France",
            )
            .answer(Role::Reflector, r#"{"verdict": "APPROVE", "missing_aspects": []}"#)
            .answer(
                Role::Synthesizer,
                "RESEARCH REPORT\n\nSummary: Paris is the capital of France [1].",
            )
            .answer(Role::Citation, "ACCEPT")
    }

    /// A script where the reflector never approves.
    pub fn never_satisfied() -> Self {
        Self::approving().answer(
            Role::Reflector,
            r#"{"verdict": "MORE RESEARCH", "missing_aspects": ["population figures"]}"#,
        )
    }

    pub fn answer(self, role: Role, text: &str) -> Self {
        self.scripts.lock().insert(role, vec![text.to_string()]);
        self
    }

    pub fn answers(self, role: Role, texts: &[&str]) -> Self {
        self.scripts
            .lock()
            .insert(role, texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn failing(self, role: Role) -> Self {
        self.failing.lock().push(role);
        self
    }

    /// Fire `token` while answering the `nth` (1-based) call of `role`.
    pub fn cancel_during(self, role: Role, nth: usize, token: CancellationToken) -> Self {
        *self.cancel_on.lock() = Some((role, nth, token));
        self
    }

    pub fn calls(&self, role: Role) -> usize {
        self.calls.lock().get(&role).copied().unwrap_or(0)
    }

    fn respond(&self, system: &str) -> Result<String> {
        let role = Role::of(system);
        let count = {
            let mut calls = self.calls.lock();
            let count = calls.entry(role).or_insert(0);
            *count += 1;
            *count
        };

        if let Some((target, nth, token)) = self.cancel_on.lock().as_ref() {
            if *target == role && *nth == count {
                token.cancel();
            }
        }

        if self.failing.lock().contains(&role) {
            return Err(AppError::LLM(format!("scripted failure for {:?}", role)));
        }

        let scripts = self.scripts.lock();
        let answer = scripts
            .get(&role)
            .and_then(|script| script.get(count - 1).or_else(|| script.last()))
            .cloned()
            .unwrap_or_default();
        Ok(answer)
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.respond("")
    }

    async fn generate_with_system(&self, system: &str, _prompt: &str) -> Result<String> {
        self.respond(system)
    }

    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
        let system = messages
            .first()
            .filter(|(role, _)| role == "system")
            .map(|(_, content)| content.as_str())
            .unwrap_or("");
        self.respond(system)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// `web_search` returning the same results for every query.
pub struct StaticSearch {
    results: Vec<Value>,
    calls: AtomicU32,
}

impl StaticSearch {
    pub fn new(results: Vec<Value>) -> Self {
        Self {
            results,
            calls: AtomicU32::new(0),
        }
    }

    /// One well-formed result per query.
    pub fn single(title: &str, url: &str, snippet: &str) -> Self {
        Self::new(vec![json!({ "title": title, "url": url, "snippet": snippet })])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for StaticSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "static search results"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn call(&self, args: Value) -> std::result::Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "query": args["query"],
            "count": self.results.len(),
            "results": self.results,
        }))
    }
}

/// `web_search` that always fails with a transient error.
#[derive(Default)]
pub struct FlakySearch {
    calls: AtomicU32,
}

impl FlakySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for FlakySearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "always unavailable"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn call(&self, _args: Value) -> std::result::Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CapabilityError::transient(WEB_SEARCH, "503 Service Unavailable"))
    }
}

/// A capability that takes `delay` before answering `{"ok": true}`.
pub struct SlowCapability {
    name: String,
    delay: Duration,
    pub calls: AtomicU32,
}

impl SlowCapability {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Capability for SlowCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "slow"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn call(&self, _args: Value) -> std::result::Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "ok": true }))
    }
}

/// Convenience for registering a shared double.
pub fn shared<T: Capability + 'static>(capability: T) -> Arc<T> {
    Arc::new(capability)
}
