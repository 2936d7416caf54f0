use super::common::*;
use armlint::*;
use serde_json::json;

fn two_rules() -> RuleCatalog {
    let evaluation = json!({ "path": "a", "exists": true });
    catalog(json!([
        { "id": "id1", "description": "", "recommendation": "", "severity": 1, "evaluation": evaluation },
        { "id": "id2", "description": "", "recommendation": "", "severity": 3, "evaluation": evaluation }
    ]))
}

fn active_ids(catalog: &RuleCatalog, configuration: &FilterConfiguration) -> Vec<String> {
    filter_rules(catalog, configuration)
        .iter()
        .map(|a| a.rule.id.clone())
        .collect()
}

#[test]
fn inclusions_select_only_listed_ids() {
    let config = FilterConfiguration::parse(r#"{ "inclusions": { "ids": ["id1"] } }"#).unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id1"]);
}

#[test]
fn exclusions_drop_listed_ids() {
    let config = FilterConfiguration::parse(r#"{ "exclusions": { "ids": ["id2"] } }"#).unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id1"]);
}

#[test]
fn no_lists_activates_everything() {
    let config = FilterConfiguration::parse("{}").unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id1", "id2"]);

    let empty_lists =
        FilterConfiguration::parse(r#"{ "inclusions": { "ids": [] }, "exclusions": {} }"#).unwrap();
    assert_eq!(active_ids(&two_rules(), &empty_lists), ["id1", "id2"]);
}

#[test]
fn inclusions_take_precedence_over_exclusions() {
    let config = FilterConfiguration::parse(
        r#"{ "inclusions": { "ids": ["id1"] }, "exclusions": { "ids": ["id1"] } }"#,
    )
    .unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id1"]);
}

#[test]
fn unknown_ids_are_ignored() {
    let config =
        FilterConfiguration::parse(r#"{ "inclusions": { "ids": ["id2", "nope"] } }"#).unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id2"]);

    let config = FilterConfiguration::parse(r#"{ "exclusions": { "ids": ["nope"] } }"#).unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id1", "id2"]);
}

#[test]
fn severity_selection_uses_effective_severity() {
    let config = FilterConfiguration::parse(
        r#"{ "inclusions": { "severity": [1] }, "severityOverrides": { "id2": 1, "id1": 2 } }"#,
    )
    .unwrap();
    let catalog = two_rules();
    let active = filter_rules(&catalog, &config);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rule.id, "id2");
    assert_eq!(active[0].index, 1);
    assert_eq!(active[0].severity, Severity::High);
    // The definition itself is untouched.
    assert_eq!(active[0].rule.severity, Severity::Low);
}

#[test]
fn fixture_configurations() {
    let Some(text) = read_fixture("rules/catalog.json") else {
        return;
    };
    let catalog = parse_rules(&text).unwrap();

    let high = FilterConfiguration::from_file(&fixtures_dir().join("config/high_only.json")).unwrap();
    assert_eq!(active_ids(&catalog, &high), ["TA-000002", "TA-000003"]);

    let excluded =
        FilterConfiguration::from_file(&fixtures_dir().join("config/exclusions.yaml")).unwrap();
    let active = filter_rules(&catalog, &excluded);
    let ids: Vec<&str> = active.iter().map(|a| a.rule.id.as_str()).collect();
    assert_eq!(ids, ["TA-000001", "TA-000002", "TA-000003", "TA-000005"]);
    assert_eq!(active[0].severity, Severity::High);
}

#[test]
fn malformed_configuration_is_an_error() {
    let err = FilterConfiguration::from_file(&fixtures_dir().join("config/malformed.json"))
        .unwrap_err();
    assert!(err.path.as_deref().unwrap().ends_with("malformed.json"));

    assert!(FilterConfiguration::parse("[]").is_err());
    assert!(FilterConfiguration::parse("{ not json").is_err());
    assert!(FilterConfiguration::parse(r#"{ "exclusions": { "ids": "id1" } }"#).is_err());
    assert!(FilterConfiguration::parse(r#"{ "inclusions": { "names": ["id1"] } }"#).is_err());
    assert!(FilterConfiguration::parse(r#"{ "severityOverrides": { "id1": 9 } }"#).is_err());
}

#[test]
fn unreadable_configuration_file_is_an_error() {
    let missing = fixtures_dir().join("config/does-not-exist.json");
    let err = FilterConfiguration::from_file(&missing).unwrap_err();
    assert!(err.to_string().contains("does-not-exist.json"));
}

#[test]
fn unknown_top_level_keys_are_ignored() {
    let config = FilterConfiguration::parse(
        r#"{ "exclusions": { "ids": ["id1"] }, "reportFormat": "sarif" }"#,
    )
    .unwrap();
    assert_eq!(active_ids(&two_rules(), &config), ["id2"]);
}
