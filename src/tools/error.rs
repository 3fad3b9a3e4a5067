use serde::{Deserialize, Serialize};
use std::fmt;

/// How a capability failure should be treated by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityErrorKind {
    /// Timeouts, rate limiting, upstream 5xx, dropped connections. Retried.
    Transient,
    /// Invalid arguments, unknown capability, other client errors. Never retried.
    Permanent,
    /// A transient error that outlived the retry budget.
    Exhausted,
}

impl fmt::Display for CapabilityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityErrorKind::Transient => write!(f, "transient"),
            CapabilityErrorKind::Permanent => write!(f, "permanent"),
            CapabilityErrorKind::Exhausted => write!(f, "exhausted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} failure in '{capability}' after {attempts} attempt(s): {message}")]
pub struct CapabilityError {
    pub kind: CapabilityErrorKind,
    pub capability: String,
    pub message: String,
    pub attempts: u32,
}

impl CapabilityError {
    pub fn transient(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Transient, capability, message)
    }

    pub fn permanent(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(CapabilityErrorKind::Permanent, capability, message)
    }

    /// Wrap the last transient failure once retries are used up.
    pub fn exhausted(last: CapabilityError, attempts: u32) -> Self {
        Self {
            kind: CapabilityErrorKind::Exhausted,
            capability: last.capability,
            message: last.message,
            attempts,
        }
    }

    fn new(kind: CapabilityErrorKind, capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            capability: capability.into(),
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == CapabilityErrorKind::Transient
    }

    /// Classify an HTTP status returned by a provider.
    pub fn from_status(capability: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            Self::transient(capability, message)
        } else {
            Self::permanent(capability, message)
        }
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_reqwest(capability: &str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(capability, status, "");
        }
        if err.is_decode() || err.is_builder() {
            Self::permanent(capability, err.to_string())
        } else {
            Self::transient(capability, err.to_string())
        }
    }
}
