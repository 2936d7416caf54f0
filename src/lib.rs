//! A JSON rule engine for infrastructure-as-code templates.
//!
//! Rules are expression trees over a template's resources. The engine
//! evaluates every selected rule against a template and reports, for each
//! rule, which locations passed or failed and at which line of the original
//! source text:
//!
//! ```text
//! parse_rules(json) → RuleCatalog → FilterConfiguration::select → active rules
//!                                                                   ↓
//! TemplateContext (original text, expanded document, mappings) → Engine::analyze
//!                                                                   ↓
//!                                               AnalysisReport { evaluations, errors }
//! ```
//!
//! Template expansion happens upstream. The engine only consumes the
//! expanded document and the mapping table that correlates expanded
//! resources with their original locations.
//!
//! # Quick Start
//!
//! ```rust
//! let rules = r#"[
//!   {
//!     "id": "TA-000001",
//!     "description": "Web apps should only be reachable over HTTPS",
//!     "recommendation": "Set httpsOnly to true",
//!     "severity": 1,
//!     "evaluation": {
//!       "resourceType": "Microsoft.Web/sites",
//!       "path": "properties.httpsOnly",
//!       "equals": true
//!     }
//!   }
//! ]"#;
//!
//! let template = r#"{
//!   "resources": [
//!     {
//!       "type": "Microsoft.Web/sites",
//!       "properties": { "httpsOnly": false }
//!     }
//!   ]
//! }"#;
//!
//! let engine = armlint::load(rules, None).expect("valid rules");
//! let context = armlint::TemplateContext::from_source("azuredeploy.json", template)
//!     .expect("valid template");
//!
//! let report = engine.analyze(&context);
//! let failure = &report.evaluations[0];
//! assert!(!failure.passed());
//! assert_eq!(failure.failing_results()[0].line, 5);
//! ```

pub mod context;
pub mod engine;
pub mod enums;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod lines;
pub mod operators;
pub mod parse;
pub mod path;
pub mod resolver;
pub mod types;

pub use context::{ResourceMappings, TemplateContext};
pub use engine::{AnalysisReport, Engine, EngineOptions, RuleFailure};
pub use enums::*;
pub use error::*;
pub use filter::{ActiveRule, FilterConfiguration, RuleSelection, filter_rules};
pub use resolver::JsonPathResolver;
pub use types::*;

// Re-export entry-point functions at the crate root for convenience.
pub use evaluate::evaluate_rule;
pub use lines::resolve_line;
pub use parse::{parse_rules, parse_rules_yaml};

/// Convenience entry point: loads a JSON rule catalog and an optional JSON
/// filter configuration into a ready-to-run [`Engine`].
///
/// # Errors
///
/// [`EngineError::Schema`] with every schema problem found in the catalog,
/// or [`EngineError::Configuration`] if the configuration is malformed.
///
/// # Example
///
/// ```rust
/// let rules = r#"[
///   {
///     "id": "TA-000002",
///     "description": "Storage accounts should reject plain HTTP",
///     "recommendation": "Enable supportsHttpsTrafficOnly",
///     "evaluation": {
///       "resourceType": "Microsoft.Storage/storageAccounts",
///       "path": "properties.supportsHttpsTrafficOnly",
///       "equals": true
///     }
///   }
/// ]"#;
///
/// match armlint::load(rules, Some(r#"{ "exclusions": { "ids": ["TA-000002"] } }"#)) {
///     Ok(engine) => assert!(engine.active_rules().is_empty()),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn load(rules: &str, configuration: Option<&str>) -> Result<Engine, EngineError> {
    let catalog = parse::parse_rules(rules).map_err(EngineError::Schema)?;

    let configuration = match configuration {
        Some(text) => FilterConfiguration::parse(text)?,
        None => FilterConfiguration::default(),
    };

    Ok(Engine::new(catalog).with_configuration(configuration))
}
