//! Filter configuration: which rules run, and at what severity.
//!
//! ```json
//! {
//!   "inclusions": { "ids": ["TA-000001"], "severity": [1] },
//!   "exclusions": { "ids": ["TA-000004"] },
//!   "severityOverrides": { "TA-000002": 3 }
//! }
//! ```
//!
//! Inclusions win over exclusions: when inclusions select anything, the
//! exclusions are not consulted. Ids that match no rule are ignored.

use crate::enums::Severity;
use crate::error::ConfigurationError;
use crate::types::{RuleCatalog, RuleDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const KNOWN_KEYS: &[&str] = &["inclusions", "exclusions", "severityOverrides"];

/// A set of rules named by id or by severity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSelection {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub severity: Vec<Severity>,
}

impl RuleSelection {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.severity.is_empty()
    }

    fn selects(&self, id: &str, severity: Severity) -> bool {
        self.ids.iter().any(|i| i == id) || self.severity.contains(&severity)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusions: Option<RuleSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<RuleSelection>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub severity_overrides: HashMap<String, Severity>,
}

/// A rule chosen to run, with the severity its results are reported at.
#[derive(Clone, Copy, Debug)]
pub struct ActiveRule<'c> {
    /// Position in the catalog; results are ordered by it.
    pub index: usize,
    pub rule: &'c RuleDefinition,
    pub severity: Severity,
}

impl FilterConfiguration {
    /// Parses a JSON configuration document.
    pub fn parse(input: &str) -> Result<Self, ConfigurationError> {
        let value: Value = serde_json::from_str(input).map_err(|e| ConfigurationError {
            message: e.to_string(),
            path: None,
        })?;
        FilterConfiguration::from_value(&value)
    }

    /// Parses a YAML configuration document.
    pub fn parse_yaml(input: &str) -> Result<Self, ConfigurationError> {
        let value: Value = serde_saphyr::from_str(input).map_err(|e| ConfigurationError {
            message: e.to_string(),
            path: None,
        })?;
        FilterConfiguration::from_value(&value)
    }

    /// Reads a configuration file: YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError {
            message: e.to_string(),
            path: Some(display.clone()),
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let parsed = if is_yaml {
            FilterConfiguration::parse_yaml(&content)
        } else {
            FilterConfiguration::parse(&content)
        };
        parsed.map_err(|e| ConfigurationError {
            message: e.message,
            path: Some(display),
        })
    }

    /// Builds a configuration from an already-decoded document.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let Some(obj) = value.as_object() else {
            return Err(ConfigurationError {
                message: format!("configuration must be an object, got {}", value),
                path: None,
            });
        };

        for key in obj.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "ignoring unknown configuration key");
            }
        }

        let known: serde_json::Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        serde_json::from_value(Value::Object(known)).map_err(|e| ConfigurationError {
            message: e.to_string(),
            path: None,
        })
    }

    /// Severity the rule's results are reported at.
    pub fn effective_severity(&self, rule: &RuleDefinition) -> Severity {
        self.severity_overrides
            .get(&rule.id)
            .copied()
            .unwrap_or(rule.severity)
    }

    /// Computes the active rules, in catalog order.
    pub fn select<'c>(&self, catalog: &'c RuleCatalog) -> Vec<ActiveRule<'c>> {
        self.log_unknown_ids(catalog);

        let inclusions = self.inclusions.as_ref().filter(|s| !s.is_empty());
        let exclusions = self.exclusions.as_ref().filter(|s| !s.is_empty());

        let active: Vec<ActiveRule<'c>> = catalog
            .rules()
            .iter()
            .enumerate()
            .map(|(index, rule)| ActiveRule {
                index,
                rule,
                severity: self.effective_severity(rule),
            })
            .filter(|candidate| match (inclusions, exclusions) {
                (Some(inc), _) => inc.selects(&candidate.rule.id, candidate.severity),
                (None, Some(exc)) => !exc.selects(&candidate.rule.id, candidate.severity),
                (None, None) => true,
            })
            .collect();

        debug!(
            total = catalog.len(),
            active = active.len(),
            "computed active rule set"
        );
        active
    }

    fn log_unknown_ids(&self, catalog: &RuleCatalog) {
        let listed = self
            .inclusions
            .iter()
            .chain(self.exclusions.iter())
            .flat_map(|s| s.ids.iter())
            .chain(self.severity_overrides.keys());
        for id in listed {
            if !catalog.contains(id) {
                debug!(id = %id, "configuration names an unknown rule id");
            }
        }
    }
}

/// Active rules of `catalog` under `configuration`, in catalog order.
pub fn filter_rules<'c>(
    catalog: &'c RuleCatalog,
    configuration: &FilterConfiguration,
) -> Vec<ActiveRule<'c>> {
    configuration.select(catalog)
}
