pub mod echo;
pub mod file;
pub mod http;

use std::path::Path;
use std::sync::Arc;

use crate::internal::exec::dispatch::{CapabilityError, CapabilityRegistry};
use crate::internal::plan::ir::ParamMap;

/// Registry with the builtin skill set, file skills rooted at
/// `workspace`.
pub fn builtin_registry(workspace: &Path) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(echo::EchoSkill::new()));
    registry.register(Arc::new(file::FileReadSkill::new(workspace)));
    registry.register(Arc::new(file::FileWriteSkill::new(workspace)));
    registry.register(Arc::new(http::HttpFetchSkill::new()));
    registry
}

// Parameter accessors for skill implementations. Validation has already
// checked shapes; these guard against a capability being called outside
// the runner (e.g. directly in a test) with bad input.

pub(crate) fn str_param<'a>(params: &'a ParamMap, name: &str) -> Result<&'a str, CapabilityError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_param(name))
}

pub(crate) fn int_param(params: &ParamMap, name: &str) -> Result<Option<i64>, CapabilityError> {
    match params.get(name) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| bad_param(name)),
    }
}

pub(crate) fn bool_param(params: &ParamMap, name: &str) -> Result<Option<bool>, CapabilityError> {
    match params.get(name) {
        None => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| bad_param(name)),
    }
}

fn bad_param(name: &str) -> CapabilityError {
    CapabilityError::new(
        "bad_params",
        format!("parameter '{}' is missing or has the wrong type", name),
    )
}
