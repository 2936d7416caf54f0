//! Navigation of the expanded document.
//!
//! A [`JsonPathResolver`] is an immutable cursor anchored at one location.
//! Deriving children never mutates the parent, so resolvers can be shared
//! freely between evaluations.

use crate::context::TemplateContext;
use crate::lines::resolve_line;
use crate::path::{DocumentPath, JsonPath, Selector};
use serde_json::Value;

const RESOURCES: &str = "resources";
const TYPE: &str = "type";

#[derive(Clone, Debug)]
pub struct JsonPathResolver<'a> {
    context: &'a TemplateContext,
    value: &'a Value,
    path: DocumentPath,
}

impl<'a> JsonPathResolver<'a> {
    /// A resolver anchored at the root of the expanded document.
    pub fn new(context: &'a TemplateContext) -> Self {
        JsonPathResolver {
            context,
            value: context.expanded_document(),
            path: DocumentPath::root(),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Full location of the anchor in the expanded document.
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn context(&self) -> &'a TemplateContext {
        self.context
    }

    /// Best-known line of the anchor in the original source.
    pub fn line(&self) -> usize {
        resolve_line(self.context, &self.path)
    }

    /// Resolves `path` relative to the anchor.
    ///
    /// Returns one resolver per match in document order. A segment that
    /// does not exist yields an empty list; absence is not an error.
    pub fn resolve(&self, path: &JsonPath) -> Vec<JsonPathResolver<'a>> {
        let mut current = vec![self.clone()];

        for selector in path.selectors() {
            if current.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for resolver in &current {
                match selector {
                    Selector::Property(name) => {
                        if let Some((key, child)) = lookup_property(resolver.value, name) {
                            next.push(resolver.child_key(key, child));
                        }
                    }
                    Selector::AnyChild => match resolver.value {
                        Value::Object(map) => {
                            next.extend(map.iter().map(|(k, v)| resolver.child_key(k, v)));
                        }
                        Value::Array(items) => {
                            next.extend(
                                items
                                    .iter()
                                    .enumerate()
                                    .map(|(i, v)| resolver.child_index(i, v)),
                            );
                        }
                        _ => {}
                    },
                    Selector::AllElements => {
                        if let Some(items) = resolver.value.as_array() {
                            next.extend(
                                items
                                    .iter()
                                    .enumerate()
                                    .map(|(i, v)| resolver.child_index(i, v)),
                            );
                        }
                    }
                    Selector::Index(i) => {
                        if let Some(item) = resolver.value.as_array().and_then(|a| a.get(*i)) {
                            next.push(resolver.child_index(*i, item));
                        }
                    }
                }
            }
            current = next;
        }

        current
    }

    /// Finds every resource of `resource_type` under the anchor's `resources`
    /// collection, descending into nested `resources` arrays.
    ///
    /// Type matching is case-insensitive. A nested resource declaring a short
    /// type such as `config` also matches its qualified form
    /// `Microsoft.Web/sites/config`. Results are in document order, parents
    /// before their children.
    pub fn resolve_resource_type(&self, resource_type: &str) -> Vec<JsonPathResolver<'a>> {
        let mut found = Vec::new();
        self.collect_resources(None, resource_type, &mut found);
        found
    }

    fn collect_resources(
        &self,
        parent_type: Option<&str>,
        resource_type: &str,
        found: &mut Vec<JsonPathResolver<'a>>,
    ) {
        let Some((key, resources)) = lookup_property(self.value, RESOURCES) else {
            return;
        };
        let Some(entries) = resources.as_array() else {
            return;
        };
        let collection = self.child_key(key, resources);

        for (i, entry) in entries.iter().enumerate() {
            let resource = collection.child_index(i, entry);
            let declared = lookup_property(entry, TYPE).and_then(|(_, t)| t.as_str());

            let qualified = match (parent_type, declared) {
                (Some(parent), Some(short)) if !short.contains('/') => {
                    Some(format!("{}/{}", parent, short))
                }
                (_, Some(full)) => Some(full.to_string()),
                _ => None,
            };

            let matches = declared.is_some_and(|t| t.eq_ignore_ascii_case(resource_type))
                || qualified
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(resource_type));
            if matches {
                found.push(resource.clone());
            }

            resource.collect_resources(qualified.as_deref(), resource_type, found);
        }
    }

    fn child_key(&self, key: &str, value: &'a Value) -> JsonPathResolver<'a> {
        JsonPathResolver {
            context: self.context,
            value,
            path: self.path.key(key),
        }
    }

    fn child_index(&self, index: usize, value: &'a Value) -> JsonPathResolver<'a> {
        JsonPathResolver {
            context: self.context,
            value,
            path: self.path.index(index),
        }
    }
}

/// Property lookup: exact key first, then ASCII case-insensitive.
fn lookup_property<'v>(value: &'v Value, name: &str) -> Option<(&'v String, &'v Value)> {
    let map = value.as_object()?;
    map.get_key_value(name)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
}
