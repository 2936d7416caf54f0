use super::common::*;
use armlint::lines::{SourcePositionIndex, strip_comments};
use armlint::path::{DocumentPath, PathSegment};
use armlint::*;
use serde_json::{Value, json};

fn doc_path(segments: &[&str]) -> DocumentPath {
    segments
        .iter()
        .map(|s| match s.parse::<usize>() {
            Ok(i) => PathSegment::Index(i),
            Err(_) => PathSegment::Key(s.to_string()),
        })
        .collect::<Vec<_>>()
        .into()
}

// ─── SourcePositionIndex ────────────────────────────────────────────────────

#[test]
fn index_records_keys_and_elements() {
    let text = "{\n  \"a\": {\n    \"b\": 1\n  },\n  \"list\": [\n    10,\n    { \"c\": true }\n  ]\n}";
    let index = SourcePositionIndex::build(text).unwrap();

    assert_eq!(index.line_of(""), Some(1));
    assert_eq!(index.line_of("a"), Some(2));
    assert_eq!(index.line_of("a.b"), Some(3));
    assert_eq!(index.line_of("list"), Some(5));
    assert_eq!(index.line_of("list[0]"), Some(6));
    assert_eq!(index.line_of("list[1].c"), Some(7));
    assert_eq!(index.line_of("A.B"), Some(3));
    assert_eq!(index.line_of("missing"), None);
}

#[test]
fn index_handles_escapes_and_special_keys() {
    let text = "{\n \"we\\\"ird\": 1,\n \"dotted.key\": {\n  \"x\": [1, 2]\n }\n}";
    let index = SourcePositionIndex::build(text).unwrap();
    assert_eq!(index.line_of("we\"ird"), Some(2));
    assert_eq!(index.line_of("['dotted.key'].x[1]"), Some(4));
}

#[test]
fn comments_are_blanked_without_moving_lines() {
    let text = "{\n  // a comment with \"quotes\"\n  \"a\": \"http://not-a-comment\", /* block\n spanning */ \"b\": 2\n}";
    let stripped = strip_comments(text);
    assert_eq!(stripped.lines().count(), text.lines().count());

    let parsed: Value = serde_json::from_str(&stripped).unwrap();
    assert_eq!(parsed["a"], json!("http://not-a-comment"));

    let index = SourcePositionIndex::build(&stripped).unwrap();
    assert_eq!(index.line_of("a"), Some(3));
    assert_eq!(index.line_of("b"), Some(4));
}

// ─── resolve_line ───────────────────────────────────────────────────────────

fn copy_loop_context() -> Option<TemplateContext> {
    let text = read_fixture("templates/copy_loop.json")?;
    let original: Value = serde_json::from_str(&text).unwrap();

    // Two unrolled copies of the single original resource.
    let mut resource = original["resources"][0].clone();
    resource["name"] = json!("nsg0");
    resource["properties"]["provisioningState"] = json!("Succeeded");
    let mut second = resource.clone();
    second["name"] = json!("nsg1");
    let expanded = json!({ "parameters": original["parameters"], "resources": [resource, second] });

    let mappings: ResourceMappings = [("resources[0]", "resources[0]"), ("resources[1]", "resources[0]")]
        .into_iter()
        .collect();
    Some(TemplateContext::new("copy_loop.json", text, expanded, mappings).unwrap())
}

#[test]
fn exact_mapping_returns_mapped_line() {
    let Some(ctx) = copy_loop_context() else {
        return;
    };
    assert_eq!(resolve_line(&ctx, &doc_path(&["resources", "1"])), 6);
    assert_eq!(resolve_line(&ctx, &doc_path(&["resources", "0"])), 6);
}

#[test]
fn descendant_of_mapped_resource_reports_the_resource_line() {
    let Some(ctx) = copy_loop_context() else {
        return;
    };
    let port = doc_path(&[
        "resources",
        "1",
        "properties",
        "securityRules",
        "0",
        "properties",
        "destinationPortRange",
    ]);
    assert_eq!(resolve_line(&ctx, &port), 6);

    let generated = doc_path(&["resources", "1", "properties", "provisioningState"]);
    assert_eq!(resolve_line(&ctx, &generated), 6);
}

#[test]
fn unmapped_location_falls_back_to_line_one() {
    let Some(ctx) = copy_loop_context() else {
        return;
    };
    assert_eq!(resolve_line(&ctx, &doc_path(&["parameters", "count"])), 1);
    assert_eq!(resolve_line(&ctx, &DocumentPath::root()), 1);
}

#[test]
fn nearest_mapped_ancestor_wins() {
    let text = "{\n  \"resources\": [\n    {\n      \"type\": \"X/y\",\n      \"properties\": {\n        \"enabled\": false\n      }\n    }\n  ]\n}";
    let expanded = json!({ "resources": [{ "type": "X/y", "properties": { "enabled": false } }] });
    let mappings: ResourceMappings = [
        ("resources[0]", "resources[0]"),
        ("resources[0].properties.enabled", "resources[0].properties.enabled"),
    ]
    .into_iter()
    .collect();
    let ctx = TemplateContext::new("t.json", text, expanded, mappings).unwrap();

    // Exact entry.
    let enabled = doc_path(&["resources", "0", "properties", "enabled"]);
    assert_eq!(resolve_line(&ctx, &enabled), 6);
    // Only the resource is mapped, even though "properties" sits on line 5.
    let properties = doc_path(&["resources", "0", "properties"]);
    assert_eq!(resolve_line(&ctx, &properties), 3);
    let kind = doc_path(&["resources", "0", "type"]);
    assert_eq!(resolve_line(&ctx, &kind), 3);
}

#[test]
fn mapping_to_missing_original_keeps_walking_up() {
    let text = "{\n  \"resources\": [\n    {\n      \"type\": \"X/y\"\n    }\n  ]\n}";
    let expanded = json!({ "resources": [{ "type": "X/y" }] });
    let mappings: ResourceMappings = [("resources[0]", "resources[7]"), ("resources", "resources")]
        .into_iter()
        .collect();
    let ctx = TemplateContext::new("t.json", text, expanded, mappings).unwrap();

    // resources[7] does not exist, so the entry for the array answers.
    assert_eq!(resolve_line(&ctx, &doc_path(&["resources", "0", "type"])), 2);
}

#[test]
fn self_mapped_context_resolves_every_location() {
    let Some(text) = read_fixture("templates/web_app.json") else {
        return;
    };
    let ctx = TemplateContext::from_source("web_app.json", text).unwrap();

    assert_eq!(
        resolve_line(&ctx, &doc_path(&["resources", "0", "properties", "httpsOnly"])),
        11
    );
    assert_eq!(
        resolve_line(
            &ctx,
            &doc_path(&["resources", "0", "resources", "0", "properties", "ftpsState"])
        ),
        22
    );
    assert_eq!(resolve_line(&ctx, &doc_path(&["resources", "1"])), 27);
}

// ─── TemplateContext ────────────────────────────────────────────────────────

#[test]
fn context_rejects_invalid_text() {
    let err = TemplateContext::from_source("bad.json", "{ \"a\": }").unwrap_err();
    assert_eq!(err.kind, TemplateErrorKind::Syntax);
    assert_eq!(err.line, Some(1));

    let err = TemplateContext::from_source("list.json", "[1, 2]").unwrap_err();
    assert_eq!(err.kind, TemplateErrorKind::TypeMismatch);
}

#[test]
fn context_exposes_inputs() {
    let ctx = TemplateContext::from_source("main.json", "{ \"a\": 1 } // trailing")
        .unwrap()
        .with_main_template(false);
    assert_eq!(ctx.template_identifier(), "main.json");
    assert!(!ctx.is_main_template());
    assert_eq!(ctx.original_document(), &json!({ "a": 1 }));
    assert_eq!(ctx.expanded_document(), ctx.original_document());
    assert!(ctx.original_text().ends_with("// trailing"));
    assert_eq!(ctx.resource_mappings().get(""), Some(""));
    assert_eq!(ctx.resource_mappings().get("a"), Some("a"));
    assert_eq!(ctx.resource_mappings().len(), ctx.source_index().len());
    assert!(!ctx.source_index().is_empty());
}
