use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::internal::exec::dispatch::{Capability, CapabilityError};
use crate::internal::plan::ir::ParamMap;
use crate::internal::schema::validate::{ActionSchema, ParamKind};

use super::{bool_param, str_param};

/// Resolve a relative path inside the workspace root. Absolute paths
/// and `..` components are refused here as well; policy denies them
/// earlier, but the skill must stay safe when used standalone.
fn resolve_workspace_path(root: &Path, relative: &str) -> Result<PathBuf, CapabilityError> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(CapabilityError::new(
            "invalid_path",
            format!("absolute paths are not allowed: '{}'", relative),
        ));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(CapabilityError::new(
                    "invalid_path",
                    format!("path escapes the workspace: '{}'", relative),
                ));
            }
        }
    }
    Ok(root.join(candidate))
}

fn io_error(path: &str, error: std::io::Error) -> CapabilityError {
    let kind = match error.kind() {
        ErrorKind::NotFound => "not_found",
        ErrorKind::PermissionDenied => "permission_denied",
        _ => "io",
    };
    CapabilityError::new(kind, format!("'{}': {}", path, error))
}

pub struct FileReadSkill {
    root: PathBuf,
    schema: ActionSchema,
}

impl FileReadSkill {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            schema: ActionSchema::new("file.read").required("path", ParamKind::String),
        }
    }
}

#[async_trait]
impl Capability for FileReadSkill {
    fn name(&self) -> &str {
        "file.read"
    }

    fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    async fn execute(&self, params: &ParamMap) -> Result<Value, CapabilityError> {
        let path = str_param(params, "path")?;
        let resolved = resolve_workspace_path(&self.root, path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(json!({ "path": path, "content": content, "bytes": content.len() }))
    }
}

pub struct FileWriteSkill {
    root: PathBuf,
    schema: ActionSchema,
}

impl FileWriteSkill {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            schema: ActionSchema::new("file.write")
                .required("path", ParamKind::String)
                .required("content", ParamKind::String)
                .optional("append", ParamKind::Bool),
        }
    }
}

#[async_trait]
impl Capability for FileWriteSkill {
    fn name(&self) -> &str {
        "file.write"
    }

    fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    async fn execute(&self, params: &ParamMap) -> Result<Value, CapabilityError> {
        let path = str_param(params, "path")?;
        let content = str_param(params, "content")?;
        let append = bool_param(params, "append")?.unwrap_or(false);
        let resolved = resolve_workspace_path(&self.root, path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }

        if append {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
                .map_err(|e| io_error(path, e))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| io_error(path, e))?;
        } else {
            tokio::fs::write(&resolved, content)
                .await
                .map_err(|e| io_error(path, e))?;
        }

        tracing::debug!(path = %path, bytes = content.len(), append = append, "file written");
        Ok(json!({ "path": path, "bytes": content.len() }))
    }
}
