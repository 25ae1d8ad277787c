use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter maps are ordered so that serialized plans, normalized
/// parameter copies and trace entries are byte-stable across runs.
pub type ParamMap = BTreeMap<String, serde_json::Value>;

/// An ordered list of steps. The order is the execution order; the plan
/// is never mutated once accepted by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

/// One action invocation with named parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub params: ParamMap,
}

impl Step {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            params: ParamMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Structural check, performed once before the execution loop
    /// starts. Failures here are plan-level, distinct from per-step
    /// parameter validation.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.is_empty() {
                return Err(PlanError::EmptyStepId { index });
            }
            if step.action.is_empty() {
                return Err(PlanError::EmptyAction(step.id.clone()));
            }
            if !seen_ids.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStepId(step.id.clone()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Plan cannot be empty")]
    Empty,
    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("Step at index {index} has an empty id")]
    EmptyStepId { index: usize },
    #[error("Step '{0}' has an empty action name")]
    EmptyAction(String),
}
