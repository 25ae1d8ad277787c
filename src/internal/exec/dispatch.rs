use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::internal::plan::ir::ParamMap;
use crate::internal::schema::validate::ActionSchema;

/// Structured failure raised by a capability: a stable machine-readable
/// kind plus a human-readable message. Reported upward unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct CapabilityError {
    pub kind: String,
    pub message: String,
}

impl CapabilityError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Produced only if policy allowed the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded { value: Value },
    Failed { error: CapabilityError },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded { .. })
    }
}

/// One registered action: a declared parameter schema and a synchronous
/// single-outcome execute. Implementations may use async I/O internally
/// but must resolve to exactly one result; the dispatcher never retries.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> &ActionSchema;
    async fn execute(&self, params: &ParamMap) -> Result<Value, CapabilityError>;
}

/// Action name to capability mapping. Built once at startup and treated
/// as read-only for the duration of a plan's execution; new skills are
/// added by registering an implementation, not by changing dispatch.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
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

    pub fn get(&self, action: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(action)
    }

    pub fn schema_for(&self, action: &str) -> Option<&ActionSchema> {
        self.capabilities.get(action).map(|c| c.schema())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolves an action to its capability and invokes it exactly once.
/// A capability failure is converted to `Failed` with the structured
/// detail intact; nothing is caught and continued past.
pub struct Dispatcher<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub async fn invoke(&self, action: &str, params: &ParamMap) -> ExecutionOutcome {
        let Some(capability) = self.registry.get(action) else {
            return ExecutionOutcome::Failed {
                error: CapabilityError::new(
                    "unregistered_action",
                    format!("no capability registered for action '{}'", action),
                ),
            };
        };

        match capability.execute(params).await {
            Ok(value) => ExecutionOutcome::Succeeded { value },
            Err(error) => {
                tracing::error!(action = %action, kind = %error.kind, "capability failed: {}", error.message);
                ExecutionOutcome::Failed { error }
            }
        }
    }
}
