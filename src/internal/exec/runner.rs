use crate::internal::{
    exec::dispatch::{CapabilityRegistry, Dispatcher},
    plan::ir::{Plan, PlanError, Step},
    policy::policy::{PolicyDecision, RuleSet},
    schema::validate::{validate, ValidationOutcome, ValidationReason},
    trace::trace::{PlanStatus, StepStatus, TraceArtifact, TraceError, TraceRecorder, Transition},
};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Invalid plan: {0}")]
    Plan(#[from] PlanError),
    #[error("Trace recorder fault: {0}")]
    Trace(#[from] TraceError),
}

/// The execution loop. Owns nothing mutable: the registry and rule set
/// are read-only for the duration of a run, and every run gets a fresh
/// trace recorder, so concurrent plans cannot interfere.
pub struct Runner<'a> {
    registry: &'a CapabilityRegistry,
    rules: &'a RuleSet,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a CapabilityRegistry, rules: &'a RuleSet) -> Self {
        Self { registry, rules }
    }

    /// Drive the plan through validation, policy and dispatch in strict
    /// step order. The loop advances past step i only if step i
    /// succeeded; any other terminal status aborts the plan and later
    /// steps are never touched and get no trace entry.
    pub async fn run(&self, plan: &Plan) -> Result<TraceArtifact, RunnerError> {
        plan.validate()?;

        let mut recorder = TraceRecorder::new();
        let mut plan_status = PlanStatus::Completed;

        for step in &plan.steps {
            let status = self.run_step(step, &mut recorder).await?;
            if status != StepStatus::Succeeded {
                tracing::warn!(
                    step_id = %step.id,
                    action = %step.action,
                    status = ?status,
                    "plan aborted"
                );
                plan_status = PlanStatus::Aborted;
                break;
            }
        }

        Ok(recorder.finalize(plan_status)?)
    }

    /// Per-step state machine: Pending -> Validating -> PolicyChecking
    /// -> Executing, closing at the first non-success gate. No side
    /// effect can occur before both validation and policy approve.
    async fn run_step(
        &self,
        step: &Step,
        recorder: &mut TraceRecorder,
    ) -> Result<StepStatus, RunnerError> {
        recorder.begin_step(step)?;
        tracing::debug!(step_id = %step.id, action = %step.action, "validating step");

        let outcome = match self.registry.schema_for(&step.action) {
            Some(schema) => validate(schema, &step.params),
            None => ValidationOutcome::Invalid {
                field: "action".to_string(),
                reason: ValidationReason::UnknownAction,
            },
        };
        recorder.record(
            &step.id,
            Transition::Validated {
                outcome: outcome.clone(),
            },
        )?;
        let params = match outcome {
            ValidationOutcome::Valid { params } => params,
            ValidationOutcome::Invalid { field, reason } => {
                tracing::warn!(
                    step_id = %step.id,
                    field = %field,
                    reason = %reason,
                    "step failed validation"
                );
                return Ok(StepStatus::FailedValidation);
            }
        };

        let decision = self.rules.evaluate(&step.action, &params);
        recorder.record(
            &step.id,
            Transition::PolicyChecked {
                decision: decision.clone(),
            },
        )?;
        if let PolicyDecision::Denied { rule_id, reason } = decision {
            tracing::warn!(
                step_id = %step.id,
                rule_id = %rule_id,
                reason = %reason,
                "step blocked by policy"
            );
            return Ok(StepStatus::Blocked);
        }

        tracing::info!(step_id = %step.id, action = %step.action, "executing step");
        let execution = Dispatcher::new(self.registry)
            .invoke(&step.action, &params)
            .await;
        let status = if execution.is_success() {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        };
        recorder.record(&step.id, Transition::Executed { outcome: execution })?;

        Ok(status)
    }
}
