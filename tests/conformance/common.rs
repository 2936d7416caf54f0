use armlint::parse::parse_rules_value;
use armlint::{RuleCatalog, RuleDefinition, TemplateContext};
use serde_json::{Value, json};
use std::path::PathBuf;

pub fn fixtures_dir() -> PathBuf {
    std::env::var("ARMLINT_FIXTURES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"))
}

/// Reads a fixture file, or `None` (with a note on stderr) if it is missing.
pub fn read_fixture(relative: &str) -> Option<String> {
    let path = fixtures_dir().join(relative);
    if !path.exists() {
        eprintln!("Skipping: {:?} not found", path);
        return None;
    }
    Some(std::fs::read_to_string(&path).unwrap())
}

/// A self-mapped context over pretty-printed `document`.
pub fn context(document: &Value) -> TemplateContext {
    let text = serde_json::to_string_pretty(document).unwrap();
    TemplateContext::from_source("template.json", text).unwrap()
}

pub fn catalog(rules: Value) -> RuleCatalog {
    parse_rules_value(&rules).unwrap()
}

/// A single rule with placeholder metadata around `evaluation`.
pub fn rule(id: &str, evaluation: Value) -> RuleDefinition {
    let catalog = catalog(json!([{
        "id": id,
        "description": format!("{} description", id),
        "recommendation": format!("{} recommendation", id),
        "evaluation": evaluation,
    }]));
    catalog.rules()[0].clone()
}

/// `{ "resources": [...] }` with one entry per `(type, properties)` pair.
pub fn resources(entries: &[(&str, Value)]) -> Value {
    let resources: Vec<Value> = entries
        .iter()
        .map(|(t, properties)| json!({ "type": t, "properties": properties }))
        .collect();
    json!({ "resources": resources })
}
