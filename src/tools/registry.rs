use crate::tools::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An external function a stage may call through the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn call(&self, args: Value) -> Result<Value, CapabilityError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<CapabilityDefinition> {
        let mut definitions: Vec<_> = self
            .capabilities
            .values()
            .map(|capability| CapabilityDefinition {
                name: capability.name().to_string(),
                description: capability.description().to_string(),
                parameters: capability.parameters_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get a sorted list of all registered capability names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a capability is registered
    pub fn has(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }
}
