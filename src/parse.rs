//! Rule catalog loading.
//!
//! Every schema problem in the catalog is collected, not just the first; a
//! catalog with any error is rejected as a whole.

use crate::enums::Severity;
use crate::error::SchemaError;
use crate::operators::{Operator, OperatorKind, compile_pattern};
use crate::path::JsonPath;
use crate::types::*;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

// ─── Discriminator table ────────────────────────────────────────────────────

type OperatorBuilder = fn(&Value) -> Result<Operator, String>;

/// Every operator key a leaf may carry, with the function that builds the
/// operator from its argument. This table is the only place operator keys
/// are recognised.
static OPERATOR_TABLE: &[(&str, OperatorBuilder)] = &[
    ("exists", build_exists),
    ("hasValue", build_has_value),
    ("equals", build_equals),
    ("notEquals", build_not_equals),
    ("regex", build_regex),
    ("in", build_in),
    ("greater", build_greater),
    ("greaterOrEquals", build_greater_or_equals),
    ("less", build_less),
    ("lessOrEquals", build_less_or_equals),
];

const ALL_OF: &str = "allOf";
const ANY_OF: &str = "anyOf";
const RESOURCE_TYPE: &str = "resourceType";
const PATH: &str = "path";
const WHERE: &str = "where";
const NOT: &str = "not";

fn lookup_operator(key: &str) -> Option<OperatorBuilder> {
    OPERATOR_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, build)| *build)
}

/// Operator keys accepted in a leaf expression, in table order.
pub fn operator_names() -> impl Iterator<Item = &'static str> {
    OPERATOR_TABLE.iter().map(|(name, _)| *name)
}

fn build_exists(arg: &Value) -> Result<Operator, String> {
    match arg.as_bool() {
        Some(true) => Ok(Operator::new(OperatorKind::Exists)),
        Some(false) => Ok(Operator::new(OperatorKind::NotExists)),
        None => Err(format!("'exists' expects a boolean, got {}", arg)),
    }
}

fn build_has_value(arg: &Value) -> Result<Operator, String> {
    match arg.as_bool() {
        Some(true) => Ok(Operator::new(OperatorKind::HasValue)),
        Some(false) => Ok(Operator::negated(OperatorKind::HasValue)),
        None => Err(format!("'hasValue' expects a boolean, got {}", arg)),
    }
}

fn build_equals(arg: &Value) -> Result<Operator, String> {
    Ok(Operator::new(OperatorKind::Equals(arg.clone())))
}

fn build_not_equals(arg: &Value) -> Result<Operator, String> {
    Ok(Operator::new(OperatorKind::NotEquals(arg.clone())))
}

fn build_regex(arg: &Value) -> Result<Operator, String> {
    let pattern = arg
        .as_str()
        .ok_or_else(|| format!("'regex' expects a string pattern, got {}", arg))?;
    let re = compile_pattern(pattern)
        .map_err(|e| format!("invalid regex '{}': {}", pattern, e))?;
    Ok(Operator::new(OperatorKind::Regex(re)))
}

fn build_in(arg: &Value) -> Result<Operator, String> {
    let items = arg
        .as_array()
        .ok_or_else(|| format!("'in' expects an array, got {}", arg))?;
    Ok(Operator::new(OperatorKind::In(items.clone())))
}

fn numeric_argument(name: &str, arg: &Value) -> Result<f64, String> {
    arg.as_f64()
        .ok_or_else(|| format!("'{}' expects a number, got {}", name, arg))
}

fn build_greater(arg: &Value) -> Result<Operator, String> {
    let n = numeric_argument("greater", arg)?;
    Ok(Operator::new(OperatorKind::GreaterThan(n)))
}

fn build_greater_or_equals(arg: &Value) -> Result<Operator, String> {
    let n = numeric_argument("greaterOrEquals", arg)?;
    Ok(Operator::new(OperatorKind::GreaterOrEquals(n)))
}

fn build_less(arg: &Value) -> Result<Operator, String> {
    let n = numeric_argument("less", arg)?;
    Ok(Operator::new(OperatorKind::LessThan(n)))
}

fn build_less_or_equals(arg: &Value) -> Result<Operator, String> {
    let n = numeric_argument("lessOrEquals", arg)?;
    Ok(Operator::new(OperatorKind::LessOrEquals(n)))
}

// ─── Catalog entry points ───────────────────────────────────────────────────

/// Parses a JSON rule catalog: an ordered array of rule objects.
pub fn parse_rules(input: &str) -> Result<RuleCatalog, Vec<SchemaError>> {
    if input.trim().is_empty() {
        return Err(vec![catalog_error("empty input")]);
    }
    let value: Value =
        serde_json::from_str(input).map_err(|e| vec![catalog_error(&e.to_string())])?;
    parse_rules_value(&value)
}

/// Parses a YAML rule catalog with the same shape as the JSON one.
pub fn parse_rules_yaml(input: &str) -> Result<RuleCatalog, Vec<SchemaError>> {
    if input.trim().is_empty() {
        return Err(vec![catalog_error("empty input")]);
    }
    let value: Value =
        serde_saphyr::from_str(input).map_err(|e| vec![catalog_error(&e.to_string())])?;
    parse_rules_value(&value)
}

/// Parses an already-decoded rule catalog.
pub fn parse_rules_value(value: &Value) -> Result<RuleCatalog, Vec<SchemaError>> {
    let entries = value
        .as_array()
        .ok_or_else(|| vec![catalog_error("rule catalog must be an array of rules")])?;

    let mut errors = Vec::new();
    let mut rules = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for (i, entry) in entries.iter().enumerate() {
        if let Some(rule) = parse_rule(entry, i, &mut errors) {
            if !seen.insert(rule.id.clone()) {
                errors.push(SchemaError {
                    rule_id: Some(rule.id.clone()),
                    path: format!("[{}].id", i),
                    message: format!("duplicate rule id '{}'", rule.id),
                });
                continue;
            }
            rules.push(rule);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    debug!(rules = rules.len(), "loaded rule catalog");
    Ok(RuleCatalog::from_rules(rules))
}

/// Parses a single expression tree, outside of any rule.
pub fn parse_expression(value: &Value) -> Result<ExpressionNode, Vec<SchemaError>> {
    let mut errors = Vec::new();
    let mut loader = Loader {
        rule_id: None,
        errors: &mut errors,
    };
    let node = loader.expression(value, "evaluation");
    match node {
        Some(node) if errors.is_empty() => Ok(node),
        _ => Err(errors),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRule {
    id: String,
    description: String,
    recommendation: String,
    #[serde(default)]
    help_uri: Option<String>,
    #[serde(default)]
    severity: Option<Severity>,
    evaluation: Value,
}

fn parse_rule(entry: &Value, index: usize, errors: &mut Vec<SchemaError>) -> Option<RuleDefinition> {
    let declared_id = entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let raw: RawRule = match serde_json::from_value(entry.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            errors.push(SchemaError {
                rule_id: declared_id,
                path: format!("[{}]", index),
                message: e.to_string(),
            });
            return None;
        }
    };

    if raw.id.trim().is_empty() {
        errors.push(SchemaError {
            rule_id: None,
            path: format!("[{}].id", index),
            message: "rule id must not be empty".to_string(),
        });
        return None;
    }

    let before = errors.len();
    let mut loader = Loader {
        rule_id: Some(&raw.id),
        errors: &mut *errors,
    };
    let evaluation = loader.expression(&raw.evaluation, "evaluation")?;
    if errors.len() > before {
        return None;
    }

    Some(RuleDefinition {
        id: raw.id,
        description: raw.description,
        recommendation: raw.recommendation,
        help_uri: raw.help_uri,
        severity: raw.severity.unwrap_or_default(),
        evaluation,
    })
}

fn catalog_error(message: &str) -> SchemaError {
    SchemaError {
        rule_id: None,
        path: String::new(),
        message: message.to_string(),
    }
}

// ─── Expression nodes ───────────────────────────────────────────────────────

struct Loader<'r, 'e> {
    rule_id: Option<&'r str>,
    errors: &'e mut Vec<SchemaError>,
}

impl Loader<'_, '_> {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(SchemaError {
            rule_id: self.rule_id.map(str::to_string),
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// Returns `None` if this node or any node beneath it is malformed;
    /// the reasons are in `errors`.
    fn expression(&mut self, value: &Value, location: &str) -> Option<ExpressionNode> {
        let Some(obj) = value.as_object() else {
            self.error(location, format!("expression must be an object, got {}", value));
            return None;
        };
        let before = self.errors.len();

        let mut discriminators = Vec::new();
        for key in obj.keys() {
            match key.as_str() {
                RESOURCE_TYPE | PATH | WHERE | NOT => {}
                ALL_OF | ANY_OF => discriminators.push(key.as_str()),
                other if lookup_operator(other).is_some() => discriminators.push(other),
                other => self.error(location, format!("unknown operator '{}'", other)),
            }
        }

        match discriminators.len() {
            0 => self.error(
                location,
                "expression has no discriminator: expected 'allOf', 'anyOf' or one operator",
            ),
            1 => {}
            n => self.error(
                location,
                format!(
                    "expression has {} discriminators ({}); exactly one is allowed",
                    n,
                    discriminators.join(", ")
                ),
            ),
        }

        let scope = self.scope(obj, location);

        if self.errors.len() > before {
            return None;
        }
        let scope = scope?;
        let discriminator = discriminators[0];

        match discriminator {
            ALL_OF | ANY_OF => {
                if obj.contains_key(NOT) {
                    self.error(location, "'not' is only valid on operator expressions");
                    return None;
                }
                let children = self.children(&obj[discriminator], location, discriminator)?;
                let structured = StructuredExpression { scope, children };
                Some(if discriminator == ALL_OF {
                    ExpressionNode::AllOf(structured)
                } else {
                    ExpressionNode::AnyOf(structured)
                })
            }
            name => {
                let negate = match obj.get(NOT) {
                    None => false,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => {
                        self.error(location, format!("'not' must be a boolean, got {}", other));
                        return None;
                    }
                };
                let build = lookup_operator(name)?;
                let mut operator = match build(&obj[name]) {
                    Ok(op) => op,
                    Err(message) => {
                        self.error(&format!("{}.{}", location, name), message);
                        return None;
                    }
                };
                operator.negate ^= negate;
                Some(ExpressionNode::Leaf(LeafExpression { scope, operator }))
            }
        }
    }

    fn children(
        &mut self,
        value: &Value,
        location: &str,
        key: &str,
    ) -> Option<Vec<ExpressionNode>> {
        let Some(items) = value.as_array() else {
            self.error(
                &format!("{}.{}", location, key),
                format!("'{}' expects an array of expressions, got {}", key, value),
            );
            return None;
        };

        let mut children = Vec::with_capacity(items.len());
        let mut failed = false;
        for (i, item) in items.iter().enumerate() {
            match self.expression(item, &format!("{}.{}[{}]", location, key, i)) {
                Some(child) => children.push(child),
                None => failed = true,
            }
        }
        if failed { None } else { Some(children) }
    }

    fn scope(&mut self, obj: &Map<String, Value>, location: &str) -> Option<ExpressionScope> {
        let before = self.errors.len();

        let resource_type = match obj.get(RESOURCE_TYPE) {
            None => None,
            Some(Value::String(t)) if !t.trim().is_empty() => Some(t.clone()),
            Some(other) => {
                self.error(
                    &format!("{}.{}", location, RESOURCE_TYPE),
                    format!("'resourceType' must be a non-empty string, got {}", other),
                );
                None
            }
        };

        let path = match obj.get(PATH) {
            None => None,
            Some(Value::String(p)) => match JsonPath::parse(p) {
                Ok(path) => Some(path),
                Err(message) => {
                    self.error(&format!("{}.{}", location, PATH), message);
                    None
                }
            },
            Some(other) => {
                self.error(
                    &format!("{}.{}", location, PATH),
                    format!("'path' must be a string, got {}", other),
                );
                None
            }
        };

        let where_condition = match obj.get(WHERE) {
            None => None,
            Some(condition) => self
                .expression(condition, &format!("{}.{}", location, WHERE))
                .map(Box::new),
        };

        if self.errors.len() > before {
            return None;
        }
        Some(ExpressionScope {
            resource_type,
            path,
            where_condition,
        })
    }
}
