use async_trait::async_trait;
use serde_json::{json, Value};

use crate::internal::exec::dispatch::{Capability, CapabilityError};
use crate::internal::plan::ir::ParamMap;
use crate::internal::schema::validate::{ActionSchema, ParamKind};

use super::str_param;

/// Single GET per invocation; the dispatcher's exactly-once contract
/// means no internal retry on network failure.
pub struct HttpFetchSkill {
    client: reqwest::Client,
    schema: ActionSchema,
}

impl HttpFetchSkill {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            schema: ActionSchema::new("http.fetch")
                .required("url", ParamKind::String)
                .optional("headers", ParamKind::Map(Box::new(ParamKind::String))),
        }
    }
}

impl Default for HttpFetchSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for HttpFetchSkill {
    fn name(&self) -> &str {
        "http.fetch"
    }

    fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    async fn execute(&self, params: &ParamMap) -> Result<Value, CapabilityError> {
        let url = str_param(params, "url")?;

        let mut request = self.client.get(url);
        if let Some(headers) = params.get("headers").and_then(|v| v.as_object()) {
            for (name, value) in headers {
                let Some(value) = value.as_str() else {
                    return Err(CapabilityError::new(
                        "bad_params",
                        format!("header '{}' must be a string", name),
                    ));
                };
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::new("network", e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::new("network", e.to_string()))?;

        tracing::debug!(url = %url, status = status, bytes = body.len(), "fetched url");
        Ok(json!({ "status": status, "body": body }))
    }
}
