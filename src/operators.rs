//! The operator library: pure predicates over a single, possibly absent,
//! JSON value.
//!
//! `negate` is applied by [`Operator::evaluate`] after the operator has run,
//! never by the operators themselves.

use crate::error::OperatorError;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// One predicate, with its argument.
#[derive(Clone, Debug)]
pub enum OperatorKind {
    Exists,
    NotExists,
    HasValue,
    Equals(Value),
    NotEquals(Value),
    Regex(Regex),
    In(Vec<Value>),
    GreaterThan(f64),
    GreaterOrEquals(f64),
    LessThan(f64),
    LessOrEquals(f64),
}

impl OperatorKind {
    /// The rule-catalog key this operator is written as.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Exists | OperatorKind::NotExists => "exists",
            OperatorKind::HasValue => "hasValue",
            OperatorKind::Equals(_) => "equals",
            OperatorKind::NotEquals(_) => "notEquals",
            OperatorKind::Regex(_) => "regex",
            OperatorKind::In(_) => "in",
            OperatorKind::GreaterThan(_) => "greater",
            OperatorKind::GreaterOrEquals(_) => "greaterOrEquals",
            OperatorKind::LessThan(_) => "less",
            OperatorKind::LessOrEquals(_) => "lessOrEquals",
        }
    }

    /// Applies the predicate. `None` means the path resolved to nothing.
    pub fn test(&self, value: Option<&Value>) -> Result<bool, OperatorError> {
        let result = match self {
            OperatorKind::Exists => value.is_some(),
            OperatorKind::NotExists => value.is_none(),
            OperatorKind::HasValue => value.is_some_and(has_value),
            OperatorKind::Equals(expected) => value.is_some_and(|v| values_deep_equal(v, expected)),
            OperatorKind::NotEquals(expected) => {
                !value.is_some_and(|v| values_deep_equal(v, expected))
            }
            OperatorKind::Regex(re) => value.and_then(Value::as_str).is_some_and(|s| re.is_match(s)),
            OperatorKind::In(items) => {
                value.is_some_and(|v| items.iter().any(|item| values_deep_equal(v, item)))
            }
            OperatorKind::GreaterThan(threshold) => self.compare(value, |v| v > *threshold)?,
            OperatorKind::GreaterOrEquals(threshold) => self.compare(value, |v| v >= *threshold)?,
            OperatorKind::LessThan(threshold) => self.compare(value, |v| v < *threshold)?,
            OperatorKind::LessOrEquals(threshold) => self.compare(value, |v| v <= *threshold)?,
        };
        Ok(result)
    }

    /// Numeric comparison. Absent values never satisfy it; present
    /// non-numeric values are an error.
    fn compare(
        &self,
        value: Option<&Value>,
        predicate: impl Fn(f64) -> bool,
    ) -> Result<bool, OperatorError> {
        match value {
            None => Ok(false),
            Some(v) => match v.as_f64() {
                Some(n) => Ok(predicate(n)),
                None => Err(OperatorError {
                    operator: self.name(),
                    message: format!("expected a number, got {}", type_name(v)),
                }),
            },
        }
    }
}

/// An operator together with the `not` flag from the rule.
#[derive(Clone, Debug)]
pub struct Operator {
    pub kind: OperatorKind,
    pub negate: bool,
}

impl Operator {
    pub fn new(kind: OperatorKind) -> Self {
        Operator {
            kind,
            negate: false,
        }
    }

    pub fn negated(kind: OperatorKind) -> Self {
        Operator { kind, negate: true }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Runs the operator and applies `negate`.
    pub fn evaluate(&self, value: Option<&Value>) -> Result<bool, OperatorError> {
        let result = self.kind.test(value)?;
        Ok(if self.negate { !result } else { result })
    }
}

/// Builds a case-insensitive regex, as the `regex` operator matches.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Present and carrying content: not null, not an empty string, array or object.
fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Deep equality. Integer 42 equals float 42.0; object key order is
/// irrelevant; arrays compare element-wise.
pub fn values_deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(fa), Some(fb)) => fa == fb,
            _ => a == b,
        },
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| values_deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() {
                return false;
            }
            a.iter()
                .all(|(k, v)| b.get(k).is_some_and(|bv| values_deep_equal(v, bv)))
        }
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
