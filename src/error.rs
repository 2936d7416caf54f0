use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Produced by the rule loader when a rule definition is malformed.
///
/// `path` locates the offending node inside the rule, e.g. `evaluation.allOf[1]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("rule '{}' at {path}: {message}", rule_label(.rule_id))]
pub struct SchemaError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub path: String,
    pub message: String,
}

/// Produced when a filter configuration document is structurally malformed
/// or cannot be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}{message}", path_prefix(.path))]
pub struct ConfigurationError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Error kind for template source failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateErrorKind {
    Syntax,
    TypeMismatch,
}

/// Produced when the original template text cannot be parsed or indexed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}{message}", location_prefix(.line, .column))]
pub struct TemplateError {
    pub kind: TemplateErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// Raised by an operator that cannot interpret the value it was given.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("operator '{operator}': {message}")]
pub struct OperatorError {
    pub operator: &'static str,
    pub message: String,
}

/// Error kind for evaluation failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationErrorKind {
    MissingScope,
    Operator,
    Timeout,
    Internal,
}

/// Produced while evaluating a single rule. Isolated to that rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub kind: EvaluationErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl EvaluationError {
    pub(crate) fn missing_scope() -> Self {
        EvaluationError {
            kind: EvaluationErrorKind::MissingScope,
            message: "no scope supplied to evaluate the expression against".to_string(),
            rule_id: None,
        }
    }
}

impl From<OperatorError> for EvaluationError {
    fn from(e: OperatorError) -> Self {
        EvaluationError {
            kind: EvaluationErrorKind::Operator,
            message: e.to_string(),
            rule_id: None,
        }
    }
}

/// Combined error type for the [`load`](crate::load) entry point.
#[derive(Clone, Debug, Error)]
pub enum EngineError {
    #[error("{} schema error(s): {}", .0.len(), join_errors(.0))]
    Schema(Vec<SchemaError>),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

fn rule_label(rule_id: &Option<String>) -> &str {
    rule_id.as_deref().unwrap_or("<unknown>")
}

fn path_prefix(path: &Option<String>) -> String {
    path.as_ref().map(|p| format!("{}: ", p)).unwrap_or_default()
}

fn location_prefix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!("{}:{}: ", l, c),
        (Some(l), None) => format!("{}: ", l),
        _ => String::new(),
    }
}

fn join_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
