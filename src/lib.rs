// Execution boundary library entry point

pub mod internal {
    pub mod plan {
        pub mod ir;
    }
    pub mod schema {
        pub mod validate;
    }
    pub mod policy {
        pub mod policy;
    }
    pub mod exec {
        pub mod dispatch;
        pub mod runner;
    }
    pub mod trace {
        pub mod trace;
    }
    pub mod skills;
    pub mod api;
}

// Re-export key types for external use
pub use internal::exec::dispatch::{
    Capability, CapabilityError, CapabilityRegistry, Dispatcher, ExecutionOutcome,
};
pub use internal::exec::runner::{Runner, RunnerError};
pub use internal::plan::ir::{ParamMap, Plan, PlanError, Step};
pub use internal::policy::policy::{
    ActionMatcher, Effect, ParamCondition, PolicyDecision, PolicyError, PolicyRule, RuleSet,
};
pub use internal::schema::validate::{
    validate, ActionSchema, FieldSpec, ParamKind, ValidationOutcome, ValidationReason,
};
pub use internal::trace::trace::{
    PlanStatus, StepStatus, TraceArtifact, TraceEntry, TraceError, TraceRecorder, Transition,
};
