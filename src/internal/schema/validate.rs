use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::internal::plan::ir::ParamMap;

/// Expected value kind for a parameter. Compound kinds recurse: a list
/// checks every element, a map requires an object whose values all
/// match the inner kind. Deliberately not JSON-Schema; just enough to
/// reject a wrongly shaped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Bool,
    List(Box<ParamKind>),
    Map(Box<ParamKind>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: ParamKind,
    pub required: bool,
}

/// Per-action declaration of parameter names and kinds. Supplied by the
/// capability that owns the action; looked up by the runner, never
/// inferred from the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub action: String,
    pub fields: BTreeMap<String, FieldSpec>,
}

impl ActionSchema {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn required(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: true,
            },
        );
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: false,
            },
        );
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// Required parameter absent.
    Missing,
    /// Present parameter has the wrong top-level kind.
    WrongType,
    /// Structurally bad value inside a compound parameter, or a
    /// parameter name the schema does not declare.
    Malformed,
    /// No schema registered for the step's action.
    UnknownAction,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationReason::Missing => "missing",
            ValidationReason::WrongType => "wrong_type",
            ValidationReason::Malformed => "malformed",
            ValidationReason::UnknownAction => "unknown_action",
        };
        f.write_str(s)
    }
}

/// Exactly one per step. `Valid` carries a normalized copy of the
/// parameters (sorted keys, values untouched); the original step is
/// never mutated and no defaults are ever substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid { params: ParamMap },
    Invalid { field: String, reason: ValidationReason },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }
}

/// Check `params` against `schema`, reporting the first violation
/// found. Check order: required fields present, then per-field kind,
/// then undeclared fields. Purely functional; no side effects.
pub fn validate(schema: &ActionSchema, params: &ParamMap) -> ValidationOutcome {
    for (name, spec) in &schema.fields {
        if spec.required && !params.contains_key(name) {
            return ValidationOutcome::Invalid {
                field: name.clone(),
                reason: ValidationReason::Missing,
            };
        }
    }

    for (name, spec) in &schema.fields {
        if let Some(value) = params.get(name) {
            if let Err(reason) = check_kind(value, &spec.kind, 0) {
                return ValidationOutcome::Invalid {
                    field: name.clone(),
                    reason,
                };
            }
        }
    }

    for name in params.keys() {
        if !schema.fields.contains_key(name) {
            return ValidationOutcome::Invalid {
                field: name.clone(),
                reason: ValidationReason::Malformed,
            };
        }
    }

    ValidationOutcome::Valid {
        params: params.clone(),
    }
}

/// A mismatch at the top of a parameter is `wrong_type`; a mismatch
/// nested inside a compound value is `malformed`.
fn check_kind(value: &Value, kind: &ParamKind, depth: usize) -> Result<(), ValidationReason> {
    let ok = match kind {
        ParamKind::String => value.is_string(),
        ParamKind::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
        ParamKind::Number => value.is_number(),
        ParamKind::Bool => value.is_boolean(),
        ParamKind::List(inner) => match value.as_array() {
            Some(items) => {
                for item in items {
                    check_kind(item, inner, depth + 1)?;
                }
                true
            }
            None => false,
        },
        ParamKind::Map(inner) => match value.as_object() {
            Some(entries) => {
                for entry in entries.values() {
                    check_kind(entry, inner, depth + 1)?;
                }
                true
            }
            None => false,
        },
    };

    if ok {
        Ok(())
    } else if depth == 0 {
        Err(ValidationReason::WrongType)
    } else {
        Err(ValidationReason::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ActionSchema {
        ActionSchema::new("echo")
            .required("text", ParamKind::String)
            .optional("repeat", ParamKind::Integer)
    }

    fn params(pairs: &[(&str, Value)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_params_produce_normalized_copy() {
        let input = params(&[("text", json!("hi")), ("repeat", json!(2))]);
        match validate(&schema(), &input) {
            ValidationOutcome::Valid { params } => assert_eq!(params, input),
            other => panic!("expected valid outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_reported_first() {
        // "repeat" also has the wrong type, but the missing required
        // field must be the first violation found.
        let input = params(&[("repeat", json!("two"))]);
        assert_eq!(
            validate(&schema(), &input),
            ValidationOutcome::Invalid {
                field: "text".to_string(),
                reason: ValidationReason::Missing,
            }
        );
    }

    #[test]
    fn test_wrong_top_level_kind() {
        let input = params(&[("text", json!(42))]);
        assert_eq!(
            validate(&schema(), &input),
            ValidationOutcome::Invalid {
                field: "text".to_string(),
                reason: ValidationReason::WrongType,
            }
        );
    }

    #[test]
    fn test_nested_mismatch_is_malformed() {
        let schema = ActionSchema::new("tagged")
            .required("tags", ParamKind::List(Box::new(ParamKind::String)));
        let input = params(&[("tags", json!(["ok", 3]))]);
        assert_eq!(
            validate(&schema, &input),
            ValidationOutcome::Invalid {
                field: "tags".to_string(),
                reason: ValidationReason::Malformed,
            }
        );
    }

    #[test]
    fn test_map_values_are_kind_checked() {
        let schema = ActionSchema::new("fetch")
            .required("headers", ParamKind::Map(Box::new(ParamKind::String)));
        let good = params(&[("headers", json!({"accept": "text/plain"}))]);
        assert!(validate(&schema, &good).is_valid());

        let bad = params(&[("headers", json!({"retries": 3}))]);
        assert_eq!(
            validate(&schema, &bad),
            ValidationOutcome::Invalid {
                field: "headers".to_string(),
                reason: ValidationReason::Malformed,
            }
        );
    }

    #[test]
    fn test_undeclared_parameter_is_rejected() {
        let input = params(&[("text", json!("hi")), ("volume", json!(11))]);
        assert_eq!(
            validate(&schema(), &input),
            ValidationOutcome::Invalid {
                field: "volume".to_string(),
                reason: ValidationReason::Malformed,
            }
        );
    }

    #[test]
    fn test_validation_does_not_mutate_input() {
        let input = params(&[("text", json!("hi"))]);
        let before = input.clone();
        let _ = validate(&schema(), &input);
        assert_eq!(input, before);
    }
}
