use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::internal::plan::ir::ParamMap;

const POLICY_PATH_ENV: &str = "WARDEN_POLICY_PATH";

/// Reason string used for the fail-closed default decision.
pub const NO_MATCHING_ALLOW_RULE: &str = "no_matching_allow_rule";
/// Rule id reported for the fail-closed default decision.
pub const DEFAULT_RULE_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// How a rule selects actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMatcher {
    #[default]
    Any,
    Exact(String),
    Prefix(String),
}

impl ActionMatcher {
    fn matches(&self, action: &str) -> bool {
        match self {
            ActionMatcher::Any => true,
            ActionMatcher::Exact(name) => action == name,
            ActionMatcher::Prefix(prefix) => action.starts_with(prefix.as_str()),
        }
    }
}

/// A predicate over a single parameter. `matches` applies to
/// string-valued parameters only; a non-string value never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamCondition {
    Exists { field: String },
    Equals { field: String, value: serde_json::Value },
    Matches { field: String, pattern: String },
}

/// One ordered rule: predicate over (action, parameters) plus a
/// decision and a human-readable reason. Pure data so rule sets can be
/// loaded, reloaded and unit-tested without touching dispatch code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub effect: Effect,
    pub reason: String,
    #[serde(default)]
    pub action: ActionMatcher,
    #[serde(default, rename = "where")]
    pub conditions: Vec<ParamCondition>,
}

impl PolicyRule {
    pub fn allow(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            effect: Effect::Allow,
            reason: reason.into(),
            action: ActionMatcher::Any,
            conditions: Vec::new(),
        }
    }

    pub fn deny(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            effect: Effect::Deny,
            reason: reason.into(),
            action: ActionMatcher::Any,
            conditions: Vec::new(),
        }
    }

    pub fn for_action(mut self, matcher: ActionMatcher) -> Self {
        self.action = matcher;
        self
    }

    pub fn when(mut self, condition: ParamCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    Allowed,
    Denied { rule_id: String, reason: String },
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }

    fn fail_closed() -> Self {
        PolicyDecision::Denied {
            rule_id: DEFAULT_RULE_ID.to_string(),
            reason: NO_MATCHING_ALLOW_RULE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rule '{rule_id}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        source: regex::Error,
    },
}

struct CompiledRule {
    rule: PolicyRule,
    // One compiled regex per `matches` condition, in condition order.
    patterns: Vec<Option<Regex>>,
}

/// An ordered, immutable rule set. Evaluation walks rules in their
/// declared order and returns the first match; no match means `Denied`
/// with `no_matching_allow_rule`.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn from_rules(rules: Vec<PolicyRule>) -> Result<Self, PolicyError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let mut patterns = Vec::with_capacity(rule.conditions.len());
            for condition in &rule.conditions {
                match condition {
                    ParamCondition::Matches { pattern, .. } => {
                        let regex =
                            Regex::new(pattern).map_err(|source| PolicyError::InvalidPattern {
                                rule_id: rule.id.clone(),
                                pattern: pattern.clone(),
                                source,
                            })?;
                        patterns.push(Some(regex));
                    }
                    _ => patterns.push(None),
                }
            }
            compiled.push(CompiledRule { rule, patterns });
        }
        Ok(Self { rules: compiled })
    }

    /// Read an ordered rule list from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        let rules: Vec<PolicyRule> = serde_json::from_str(&contents)?;
        Self::from_rules(rules)
    }

    /// Rule set from `WARDEN_POLICY_PATH`, falling back to the built-in
    /// default rules only when the variable is unset. A set but
    /// unloadable path is an error: substituting the defaults there
    /// would hand a host a more permissive boundary than it asked for.
    pub fn load_from_env() -> Result<Self, PolicyError> {
        match env::var(POLICY_PATH_ENV) {
            Ok(path) => {
                let rules = Self::load(Path::new(&path))?;
                tracing::info!(path = %path, rules = rules.len(), "loaded policy file");
                Ok(rules)
            }
            Err(_) => Ok(Self::default_rules()),
        }
    }

    pub fn default_rules() -> Self {
        static DEFAULT: Lazy<Vec<PolicyRule>> = Lazy::new(default_rule_list);
        // The built-in patterns are static and known to compile.
        Self::from_rules(DEFAULT.clone()).unwrap_or_else(|_| Self { rules: Vec::new() })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule wins; no match fails closed.
    pub fn evaluate(&self, action: &str, params: &ParamMap) -> PolicyDecision {
        for compiled in &self.rules {
            if rule_matches(compiled, action, params) {
                return match compiled.rule.effect {
                    Effect::Allow => PolicyDecision::Allowed,
                    Effect::Deny => PolicyDecision::Denied {
                        rule_id: compiled.rule.id.clone(),
                        reason: compiled.rule.reason.clone(),
                    },
                };
            }
        }
        PolicyDecision::fail_closed()
    }
}

fn rule_matches(compiled: &CompiledRule, action: &str, params: &ParamMap) -> bool {
    if !compiled.rule.action.matches(action) {
        return false;
    }

    for (condition, pattern) in compiled.rule.conditions.iter().zip(&compiled.patterns) {
        let holds = match condition {
            ParamCondition::Exists { field } => params.contains_key(field),
            ParamCondition::Equals { field, value } => params.get(field) == Some(value),
            ParamCondition::Matches { field, .. } => match (params.get(field), pattern) {
                (Some(value), Some(regex)) => {
                    value.as_str().map(|s| regex.is_match(s)).unwrap_or(false)
                }
                _ => false,
            },
        };
        if !holds {
            return false;
        }
    }
    true
}

/// Hard boundaries first, then allowances for the builtin skills.
fn default_rule_list() -> Vec<PolicyRule> {
    vec![
        PolicyRule::deny("path_traversal", "path traversal ('..') is not allowed")
            .for_action(ActionMatcher::Prefix("file.".to_string()))
            .when(ParamCondition::Matches {
                field: "path".to_string(),
                pattern: r"(^|[/\\])\.\.([/\\]|$)".to_string(),
            }),
        PolicyRule::allow("allow_echo", "echo has no side effects")
            .for_action(ActionMatcher::Exact("echo".to_string())),
        PolicyRule::allow("allow_file", "workspace file access")
            .for_action(ActionMatcher::Prefix("file.".to_string())),
        PolicyRule::allow("allow_http_fetch", "outbound fetch")
            .for_action(ActionMatcher::Exact("http.fetch".to_string())),
    ]
}
