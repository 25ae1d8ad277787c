//! Trace recorder tests

use serde_json::json;
use warden::{
    ExecutionOutcome, ParamMap, PlanStatus, PolicyDecision, Step, StepStatus, TraceError,
    TraceRecorder, Transition, ValidationOutcome, ValidationReason,
};

fn valid_outcome() -> ValidationOutcome {
    ValidationOutcome::Valid {
        params: ParamMap::new(),
    }
}

#[test]
fn test_successful_step_produces_one_entry() {
    let mut recorder = TraceRecorder::new();
    let step = Step::new("s1", "echo").with_param("text", json!("hi"));

    recorder.begin_step(&step).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: valid_outcome(),
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::PolicyChecked {
                decision: PolicyDecision::Allowed,
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::Executed {
                outcome: ExecutionOutcome::Succeeded {
                    value: json!({"text": "hi"}),
                },
            },
        )
        .unwrap();

    let artifact = recorder.finalize(PlanStatus::Completed).unwrap();
    assert_eq!(artifact.entries.len(), 1);
    let entry = &artifact.entries[0];
    assert_eq!(entry.step_id, "s1");
    assert_eq!(entry.action, "echo");
    assert_eq!(entry.status, StepStatus::Succeeded);
    assert!(entry.policy.is_some());
    assert!(entry.execution.is_some());
    assert_eq!(artifact.status, PlanStatus::Completed);
    assert_eq!(artifact.halted_step, None);
}

#[test]
fn test_invalid_validation_closes_entry_without_policy_or_execution() {
    let mut recorder = TraceRecorder::new();
    let step = Step::new("s1", "echo");

    recorder.begin_step(&step).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: ValidationOutcome::Invalid {
                    field: "text".to_string(),
                    reason: ValidationReason::Missing,
                },
            },
        )
        .unwrap();

    let entry = &recorder.entries()[0];
    assert_eq!(entry.status, StepStatus::FailedValidation);
    assert!(entry.policy.is_none());
    assert!(entry.execution.is_none());

    // The entry is closed; nothing further can be recorded for it.
    let err = recorder.record(
        "s1",
        Transition::PolicyChecked {
            decision: PolicyDecision::Allowed,
        },
    );
    assert!(matches!(err, Err(TraceError::NoOpenStep)));
}

#[test]
fn test_denied_step_closes_as_blocked() {
    let mut recorder = TraceRecorder::new();
    let step = Step::new("s1", "file.read");

    recorder.begin_step(&step).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: valid_outcome(),
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::PolicyChecked {
                decision: PolicyDecision::Denied {
                    rule_id: "path_traversal".to_string(),
                    reason: "path traversal ('..') is not allowed".to_string(),
                },
            },
        )
        .unwrap();

    let entry = &recorder.entries()[0];
    assert_eq!(entry.status, StepStatus::Blocked);
    assert!(entry.execution.is_none());
}

#[test]
fn test_policy_before_validation_is_out_of_order() {
    let mut recorder = TraceRecorder::new();
    recorder.begin_step(&Step::new("s1", "echo")).unwrap();

    let err = recorder.record(
        "s1",
        Transition::PolicyChecked {
            decision: PolicyDecision::Allowed,
        },
    );
    assert!(matches!(err, Err(TraceError::OutOfOrder(_))));
}

#[test]
fn test_execution_without_policy_approval_is_out_of_order() {
    let mut recorder = TraceRecorder::new();
    recorder.begin_step(&Step::new("s1", "echo")).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: valid_outcome(),
            },
        )
        .unwrap();

    let err = recorder.record(
        "s1",
        Transition::Executed {
            outcome: ExecutionOutcome::Succeeded { value: json!(null) },
        },
    );
    assert!(matches!(err, Err(TraceError::OutOfOrder(_))));
}

#[test]
fn test_transition_for_wrong_step_is_rejected() {
    let mut recorder = TraceRecorder::new();
    recorder.begin_step(&Step::new("s1", "echo")).unwrap();

    let err = recorder.record(
        "s2",
        Transition::Validated {
            outcome: valid_outcome(),
        },
    );
    assert!(matches!(err, Err(TraceError::StepMismatch { .. })));
}

#[test]
fn test_cannot_open_two_steps_at_once() {
    let mut recorder = TraceRecorder::new();
    recorder.begin_step(&Step::new("s1", "echo")).unwrap();

    let err = recorder.begin_step(&Step::new("s2", "echo"));
    assert!(matches!(err, Err(TraceError::StepAlreadyOpen(_))));
}

#[test]
fn test_finalize_with_open_step_fails() {
    let mut recorder = TraceRecorder::new();
    recorder.begin_step(&Step::new("s1", "echo")).unwrap();

    let err = recorder.finalize(PlanStatus::Aborted);
    assert!(matches!(err, Err(TraceError::UnclosedStep(_))));
}

#[test]
fn test_finalize_derives_halted_step_from_last_entry() {
    let mut recorder = TraceRecorder::new();

    let s1 = Step::new("s1", "echo");
    recorder.begin_step(&s1).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: valid_outcome(),
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::PolicyChecked {
                decision: PolicyDecision::Allowed,
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::Executed {
                outcome: ExecutionOutcome::Succeeded { value: json!(1) },
            },
        )
        .unwrap();

    let s2 = Step::new("s2", "echo");
    recorder.begin_step(&s2).unwrap();
    recorder
        .record(
            "s2",
            Transition::Validated {
                outcome: ValidationOutcome::Invalid {
                    field: "text".to_string(),
                    reason: ValidationReason::Missing,
                },
            },
        )
        .unwrap();

    let artifact = recorder.finalize(PlanStatus::Aborted).unwrap();
    assert_eq!(artifact.status, PlanStatus::Aborted);
    assert_eq!(artifact.halted_step.as_deref(), Some("s2"));
    assert_eq!(artifact.entries.len(), 2);
}

#[test]
fn test_artifact_round_trips_through_json() {
    let mut recorder = TraceRecorder::new();
    let step = Step::new("s1", "echo").with_param("text", json!("hi"));
    recorder.begin_step(&step).unwrap();
    recorder
        .record(
            "s1",
            Transition::Validated {
                outcome: ValidationOutcome::Valid {
                    params: step.params.clone(),
                },
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::PolicyChecked {
                decision: PolicyDecision::Allowed,
            },
        )
        .unwrap();
    recorder
        .record(
            "s1",
            Transition::Executed {
                outcome: ExecutionOutcome::Succeeded {
                    value: json!({"text": "hi"}),
                },
            },
        )
        .unwrap();
    let artifact = recorder.finalize(PlanStatus::Completed).unwrap();

    let encoded = serde_json::to_string(&artifact).unwrap();
    let decoded: warden::TraceArtifact = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.entries, artifact.entries);
    assert_eq!(decoded.status, artifact.status);
    assert_eq!(decoded.run_id, artifact.run_id);
}
