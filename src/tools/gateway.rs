//! Uniform calling convention for external capabilities.
//!
//! Every call goes through [`CapabilityGateway::call`], which applies the shared
//! rate limiter, a per-attempt timeout and the retry policy described by a
//! [`CallBudget`]. The returned [`CapabilityCall`] is a complete record of the
//! invocation, ready to be written to the run's message log.

use crate::tools::error::{CapabilityError, CapabilityErrorKind};
use crate::tools::rate_limit::RateLimiter;
use crate::tools::registry::CapabilityRegistry;
use crate::types::{Message, Phase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Timeout and retry policy for a single capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    /// Limit for each individual attempt.
    pub timeout: Duration,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CallBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl CallBudget {
    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }
}

/// Record of one capability invocation, including every retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    pub id: String,
    pub capability: String,
    pub arguments: Value,
    pub attempts: u32,
    pub duration_ms: u64,
    pub result: Result<Value, CapabilityError>,
}

impl CapabilityCall {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Value, CapabilityError> {
        self.result
    }

    /// Message of role `tool` describing this call.
    pub fn to_message(&self, source: Phase) -> Message {
        let outcome = match &self.result {
            Ok(value) => format!("ok {}", summarize(value)),
            Err(e) => format!("error ({}) {}", e.kind, e.message),
        };
        Message::tool(
            source,
            format!(
                "{}({}) -> {} [attempts={}, {}ms]",
                self.capability, self.arguments, outcome, self.attempts, self.duration_ms
            ),
        )
    }
}

fn summarize(value: &Value) -> String {
    if let Some(count) = value.get("count").and_then(Value::as_u64) {
        return format!("{} result(s)", count);
    }
    if let Some(found) = value.get("found").and_then(Value::as_bool) {
        return if found { "found".to_string() } else { "not found".to_string() };
    }
    let text = value.to_string();
    if text.chars().count() > 120 {
        format!("{}...", text.chars().take(120).collect::<String>())
    } else {
        text
    }
}

/// Completed calls of one run, kept so that a stage abandoned mid-flight
/// still leaves its finished calls in the message log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<CapabilityCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &CapabilityCall) {
        self.calls.lock().push(call.clone());
    }

    /// Take every call recorded since the last drain.
    pub fn drain(&self) -> Vec<CapabilityCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct GatewayInner {
    registry: CapabilityRegistry,
    limiter: Arc<RateLimiter>,
    default_budget: CallBudget,
}

/// Cheap to clone; clones share the registry and the rate limiter.
#[derive(Clone)]
pub struct CapabilityGateway {
    inner: Arc<GatewayInner>,
    log: Option<CallLog>,
}

impl CapabilityGateway {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self::with_limiter(registry, Arc::new(RateLimiter::unlimited()), CallBudget::default())
    }

    pub fn with_limiter(
        registry: CapabilityRegistry,
        limiter: Arc<RateLimiter>,
        default_budget: CallBudget,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                registry,
                limiter,
                default_budget,
            }),
            log: None,
        }
    }

    /// A gateway sharing this one's registry and limiter that also records
    /// every finished call into `log`.
    pub fn with_call_log(&self, log: CallLog) -> Self {
        Self {
            inner: self.inner.clone(),
            log: Some(log),
        }
    }

    pub fn default_budget(&self) -> CallBudget {
        self.inner.default_budget
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.inner.limiter.clone()
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.inner.registry.has(name)
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    /// Invoke a capability and return only its result.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        budget: &CallBudget,
    ) -> Result<Value, CapabilityError> {
        self.call(name, args, budget).await.into_result()
    }

    /// Invoke a capability under `budget` and return the full call record.
    pub async fn call(&self, name: &str, args: Value, budget: &CallBudget) -> CapabilityCall {
        let call = self.attempt(name, args, budget).await;
        if let Some(log) = &self.log {
            log.record(&call);
        }
        call
    }

    async fn attempt(&self, name: &str, args: Value, budget: &CallBudget) -> CapabilityCall {
        let started = Instant::now();
        let id = Uuid::new_v4().to_string();

        let Some(capability) = self.inner.registry.get(name) else {
            return CapabilityCall {
                id,
                capability: name.to_string(),
                arguments: args,
                attempts: 0,
                duration_ms: 0,
                result: Err(CapabilityError {
                    kind: CapabilityErrorKind::Permanent,
                    capability: name.to_string(),
                    message: "unknown capability".to_string(),
                    attempts: 0,
                }),
            };
        };

        let mut attempts = 0u32;
        let result = loop {
            attempts += 1;
            let outcome = {
                let _permit = self.inner.limiter.acquire().await;
                match tokio::time::timeout(budget.timeout, capability.call(args.clone())).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CapabilityError::transient(
                        name,
                        format!("timed out after {}ms", budget.timeout.as_millis()),
                    )),
                }
            };

            match outcome {
                Ok(value) => {
                    debug!(capability = name, attempts, "capability call succeeded");
                    break Ok(value);
                }
                Err(err) if err.is_transient() && attempts <= budget.max_retries => {
                    let delay = budget.backoff(attempts - 1);
                    warn!(
                        capability = name,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "transient capability failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    warn!(capability = name, attempts, "capability retries exhausted");
                    break Err(CapabilityError::exhausted(err, attempts));
                }
                Err(mut err) => {
                    debug!(capability = name, error = %err.message, "permanent capability failure");
                    err.attempts = attempts;
                    break Err(err);
                }
            }
        };

        CapabilityCall {
            id,
            capability: name.to_string(),
            arguments: args,
            attempts,
            duration_ms: started.elapsed().as_millis() as u64,
            result,
        }
    }
}
