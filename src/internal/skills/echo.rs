use async_trait::async_trait;
use serde_json::{json, Value};

use crate::internal::exec::dispatch::{Capability, CapabilityError};
use crate::internal::plan::ir::ParamMap;
use crate::internal::schema::validate::{ActionSchema, ParamKind};

use super::{int_param, str_param};

/// Output is capped so a single step cannot allocate unbounded memory.
const MAX_REPEAT: i64 = 10_000;

/// Side-effect-free skill, mostly useful for demos and wiring checks.
pub struct EchoSkill {
    schema: ActionSchema,
}

impl EchoSkill {
    pub fn new() -> Self {
        Self {
            schema: ActionSchema::new("echo")
                .required("text", ParamKind::String)
                .optional("repeat", ParamKind::Integer),
        }
    }
}

impl Default for EchoSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for EchoSkill {
    fn name(&self) -> &str {
        "echo"
    }

    fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    async fn execute(&self, params: &ParamMap) -> Result<Value, CapabilityError> {
        let text = str_param(params, "text")?;
        let repeat = int_param(params, "repeat")?.unwrap_or(1);
        if repeat < 1 {
            return Err(CapabilityError::new(
                "bad_params",
                "repeat must be at least 1",
            ));
        }
        if repeat > MAX_REPEAT {
            return Err(CapabilityError::new(
                "bad_params",
                format!("repeat must be at most {}", MAX_REPEAT),
            ));
        }
        Ok(json!({ "text": text.repeat(repeat as usize) }))
    }
}
