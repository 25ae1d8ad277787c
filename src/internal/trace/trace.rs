use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::internal::exec::dispatch::ExecutionOutcome;
use crate::internal::plan::ir::{ParamMap, Step};
use crate::internal::policy::policy::PolicyDecision;
use crate::internal::schema::validate::ValidationOutcome;

/// Terminal status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    FailedValidation,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Completed,
    Aborted,
}

/// One lifecycle fact about the currently open step.
#[derive(Debug, Clone)]
pub enum Transition {
    Validated { outcome: ValidationOutcome },
    PolicyChecked { decision: PolicyDecision },
    Executed { outcome: ExecutionOutcome },
}

/// One record per attempted step, in plan order. Carries no wall-clock
/// or random data, so identical runs produce identical entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step_id: String,
    pub action: String,
    pub params: ParamMap,
    pub validation: ValidationOutcome,
    pub policy: Option<PolicyDecision>,
    pub execution: Option<ExecutionOutcome>,
    pub status: StepStatus,
}

/// Finalized trace. `run_id` and `finished_at` are the only fields not
/// covered by the determinism contract; replay tooling compares
/// `entries`, `status` and `halted_step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceArtifact {
    pub run_id: String,
    pub status: PlanStatus,
    pub halted_step: Option<String>,
    pub entries: Vec<TraceEntry>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("No step is open for recording")]
    NoOpenStep,
    #[error("Transition for step '{got}' while step '{open}' is open")]
    StepMismatch { open: String, got: String },
    #[error("Out-of-order transition for step '{0}'")]
    OutOfOrder(String),
    #[error("Cannot begin step '{0}' while another step is open")]
    StepAlreadyOpen(String),
    #[error("Step '{0}' was left open at finalization")]
    UnclosedStep(String),
}

struct OpenEntry {
    step_id: String,
    action: String,
    params: ParamMap,
    validation: Option<ValidationOutcome>,
    policy: Option<PolicyDecision>,
    execution: Option<ExecutionOutcome>,
}

/// Append-only record of step lifecycles. Entries are pushed once, when
/// their step reaches a terminal state, and never edited afterwards;
/// the recorder also enforces the per-step transition order.
pub struct TraceRecorder {
    run_id: String,
    entries: Vec<TraceEntry>,
    open: Option<OpenEntry>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            entries: Vec::new(),
            open: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn begin_step(&mut self, step: &Step) -> Result<(), TraceError> {
        if let Some(open) = &self.open {
            return Err(TraceError::StepAlreadyOpen(open.step_id.clone()));
        }
        self.open = Some(OpenEntry {
            step_id: step.id.clone(),
            action: step.action.clone(),
            params: step.params.clone(),
            validation: None,
            policy: None,
            execution: None,
        });
        Ok(())
    }

    /// Append one lifecycle fact. A transition that makes the step
    /// terminal closes its entry; the entry is immutable from then on.
    pub fn record(&mut self, step_id: &str, transition: Transition) -> Result<(), TraceError> {
        let open = self.open.as_mut().ok_or(TraceError::NoOpenStep)?;
        if open.step_id != step_id {
            return Err(TraceError::StepMismatch {
                open: open.step_id.clone(),
                got: step_id.to_string(),
            });
        }

        let terminal = match transition {
            Transition::Validated { outcome } => {
                if open.validation.is_some() {
                    return Err(TraceError::OutOfOrder(step_id.to_string()));
                }
                let terminal = match &outcome {
                    ValidationOutcome::Valid { .. } => None,
                    ValidationOutcome::Invalid { .. } => Some(StepStatus::FailedValidation),
                };
                open.validation = Some(outcome);
                terminal
            }
            Transition::PolicyChecked { decision } => {
                let validated_ok = matches!(
                    open.validation,
                    Some(ValidationOutcome::Valid { .. })
                );
                if !validated_ok || open.policy.is_some() {
                    return Err(TraceError::OutOfOrder(step_id.to_string()));
                }
                let terminal = match &decision {
                    PolicyDecision::Allowed => None,
                    PolicyDecision::Denied { .. } => Some(StepStatus::Blocked),
                };
                open.policy = Some(decision);
                terminal
            }
            Transition::Executed { outcome } => {
                let allowed = matches!(open.policy, Some(PolicyDecision::Allowed));
                if !allowed || open.execution.is_some() {
                    return Err(TraceError::OutOfOrder(step_id.to_string()));
                }
                let terminal = match &outcome {
                    ExecutionOutcome::Succeeded { .. } => StepStatus::Succeeded,
                    ExecutionOutcome::Failed { .. } => StepStatus::Failed,
                };
                open.execution = Some(outcome);
                Some(terminal)
            }
        };

        if let Some(status) = terminal {
            self.close_open(status)?;
        }
        Ok(())
    }

    fn close_open(&mut self, status: StepStatus) -> Result<(), TraceError> {
        let open = self.open.take().ok_or(TraceError::NoOpenStep)?;
        let validation = open.validation.ok_or_else(|| {
            TraceError::OutOfOrder(open.step_id.clone())
        })?;
        self.entries.push(TraceEntry {
            step_id: open.step_id,
            action: open.action,
            params: open.params,
            validation,
            policy: open.policy,
            execution: open.execution,
            status,
        });
        Ok(())
    }

    /// Close the trace. Consumes the recorder; nothing can be appended
    /// afterwards. `halted_step` is derived from the last entry when
    /// the plan aborted.
    pub fn finalize(self, status: PlanStatus) -> Result<TraceArtifact, TraceError> {
        if let Some(open) = &self.open {
            return Err(TraceError::UnclosedStep(open.step_id.clone()));
        }
        let halted_step = match status {
            PlanStatus::Completed => None,
            PlanStatus::Aborted => self
                .entries
                .iter()
                .rev()
                .find(|e| e.status != StepStatus::Succeeded)
                .map(|e| e.step_id.clone()),
        };
        Ok(TraceArtifact {
            run_id: self.run_id,
            status,
            halted_step,
            entries: self.entries,
            finished_at: Utc::now(),
        })
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}
