use super::common::*;
use armlint::path::{JsonPath, Selector};
use armlint::*;
use serde_json::json;

fn path(p: &str) -> JsonPath {
    JsonPath::parse(p).unwrap()
}

// ─── Path syntax ────────────────────────────────────────────────────────────

#[test]
fn path_selectors() {
    assert_eq!(
        path("resources[*].properties.rules[2]").selectors(),
        &[
            Selector::Property("resources".into()),
            Selector::AllElements,
            Selector::Property("properties".into()),
            Selector::Property("rules".into()),
            Selector::Index(2),
        ]
    );
    assert_eq!(
        path("tags.*").selectors(),
        &[Selector::Property("tags".into()), Selector::AnyChild]
    );
    assert!(path("").is_empty());
    assert_eq!(path("a.b").to_string(), "a.b");
}

// ─── resolve ────────────────────────────────────────────────────────────────

#[test]
fn wildcard_yields_one_resolver_per_element_in_order() {
    let ctx = context(&resources(&[
        ("A/one", json!({})),
        ("B/two", json!({})),
        ("C/three", json!({})),
    ]));
    let root = JsonPathResolver::new(&ctx);

    let found = root.resolve(&path("resources[*].type"));
    let types: Vec<&str> = found.iter().map(|r| r.value().as_str().unwrap()).collect();
    assert_eq!(types, ["A/one", "B/two", "C/three"]);
    assert_eq!(found[1].path().to_string(), "resources[1].type");
}

#[test]
fn missing_segments_yield_nothing() {
    let ctx = context(&json!({ "a": { "b": 1 }, "list": [1, 2] }));
    let root = JsonPathResolver::new(&ctx);

    assert!(root.resolve(&path("a.c")).is_empty());
    assert!(root.resolve(&path("a.b.c")).is_empty());
    assert!(root.resolve(&path("list[5]")).is_empty());
    assert!(root.resolve(&path("a[*]")).is_empty());
    assert_eq!(root.resolve(&path("list[1]"))[0].value(), &json!(2));
}

#[test]
fn empty_path_is_the_scope_itself() {
    let ctx = context(&json!({ "a": 1 }));
    let root = JsonPathResolver::new(&ctx);
    let found = root.resolve(&path(""));
    assert_eq!(found.len(), 1);
    assert!(found[0].path().is_root());
}

#[test]
fn property_lookup_falls_back_to_case_insensitive() {
    let ctx = context(&json!({ "Properties": { "HttpsOnly": true, "httpsonly": false } }));
    let root = JsonPathResolver::new(&ctx);

    // Exact match wins over a case-insensitive one.
    let exact = root.resolve(&path("Properties.httpsonly"));
    assert_eq!(exact[0].value(), &json!(false));

    let folded = root.resolve(&path("properties.HTTPSONLY"));
    assert_eq!(folded.len(), 1);
    assert_eq!(folded[0].path().to_string(), "Properties.HttpsOnly");
}

#[test]
fn any_child_covers_objects_and_arrays() {
    let ctx = context(&json!({ "tags": { "env": "prod", "owner": "ops" }, "list": [true, false] }));
    let root = JsonPathResolver::new(&ctx);

    let tags: Vec<_> = root
        .resolve(&path("tags.*"))
        .iter()
        .map(|r| r.value().clone())
        .collect();
    assert_eq!(tags, [json!("prod"), json!("ops")]);
    assert_eq!(root.resolve(&path("list.*")).len(), 2);
}

#[test]
fn resolvers_are_relative_to_their_anchor() {
    let ctx = context(&json!({ "outer": { "inner": { "x": 1 } } }));
    let root = JsonPathResolver::new(&ctx);
    let inner = &root.resolve(&path("outer.inner"))[0];
    let x = &inner.resolve(&path("x"))[0];
    assert_eq!(x.value(), &json!(1));
    assert_eq!(x.path().to_string(), "outer.inner.x");
}

// ─── resolve_resource_type ──────────────────────────────────────────────────

#[test]
fn resource_type_matching_is_case_insensitive() {
    let ctx = context(&resources(&[
        ("Microsoft.Web/sites", json!({ "n": 1 })),
        ("Microsoft.Storage/storageAccounts", json!({})),
        ("microsoft.web/SITES", json!({ "n": 2 })),
    ]));
    let root = JsonPathResolver::new(&ctx);

    let found = root.resolve_resource_type("MICROSOFT.WEB/sites");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].path().to_string(), "resources[0]");
    assert_eq!(found[1].path().to_string(), "resources[2]");
}

#[test]
fn nested_resources_are_found_in_document_order() {
    let ctx = context(&json!({
        "resources": [
            {
                "type": "Microsoft.Web/sites",
                "resources": [
                    { "type": "config", "name": "web" },
                    { "type": "Microsoft.Web/sites/config", "name": "logs" }
                ]
            },
            { "type": "Microsoft.Web/sites/config", "name": "top" }
        ]
    }));
    let root = JsonPathResolver::new(&ctx);

    let found = root.resolve_resource_type("microsoft.web/sites/config");
    let names: Vec<&str> = found
        .iter()
        .map(|r| r.value()["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["web", "logs", "top"]);

    // The short form matches only what declares it.
    let short = root.resolve_resource_type("config");
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].path().to_string(), "resources[0].resources[0]");
}

#[test]
fn no_resources_collection_yields_nothing() {
    let ctx = context(&json!({ "resources": {} }));
    let root = JsonPathResolver::new(&ctx);
    assert!(root.resolve_resource_type("X/y").is_empty());

    let ctx = context(&json!({ "parameters": {} }));
    assert!(JsonPathResolver::new(&ctx).resolve_resource_type("X/y").is_empty());
}
