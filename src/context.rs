//! The template under analysis, as handed over by the expansion stage.

use crate::error::{TemplateError, TemplateErrorKind};
use crate::lines::{SourcePositionIndex, strip_comments};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Correlates canonical locations in the expanded document with canonical
/// locations in the original source, e.g. `resources[3]` → `resources[1]`
/// when a copy loop was unrolled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceMappings(HashMap<String, String>);

impl ResourceMappings {
    pub fn new() -> Self {
        ResourceMappings(HashMap::new())
    }

    /// A table mapping every location of the original source to itself.
    pub fn identity(index: &SourcePositionIndex) -> Self {
        index.paths().map(|path| (path, path)).collect()
    }

    pub fn insert(&mut self, expanded: impl Into<String>, original: impl Into<String>) {
        self.0.insert(expanded.into(), original.into());
    }

    pub fn get(&self, expanded: &str) -> Option<&str> {
        self.0.get(expanded).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceMappings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ResourceMappings(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Everything the engine needs to know about one template.
///
/// Built once per template; immutable for the duration of an analysis run.
/// The position index over the original text is built at construction so
/// evaluation never touches the raw text again.
#[derive(Clone, Debug)]
pub struct TemplateContext {
    template_identifier: String,
    original_text: String,
    original_document: Value,
    expanded_document: Value,
    resource_mappings: ResourceMappings,
    is_main_template: bool,
    source_index: SourcePositionIndex,
}

impl TemplateContext {
    /// Builds a context from the original text, the expanded document and
    /// the mapping table produced by the expansion stage.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if the original text is not a JSON object.
    pub fn new(
        template_identifier: impl Into<String>,
        original_text: impl Into<String>,
        expanded_document: Value,
        resource_mappings: ResourceMappings,
    ) -> Result<Self, TemplateError> {
        let original_text = original_text.into();
        let cleaned = strip_comments(&original_text);

        let original_document: Value = serde_json::from_str(&cleaned).map_err(|e| TemplateError {
            kind: TemplateErrorKind::Syntax,
            message: e.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
        })?;

        if !original_document.is_object() {
            return Err(TemplateError {
                kind: TemplateErrorKind::TypeMismatch,
                message: "template root must be a JSON object".to_string(),
                line: None,
                column: None,
            });
        }

        let source_index = SourcePositionIndex::build(&cleaned)?;

        Ok(TemplateContext {
            template_identifier: template_identifier.into(),
            original_text,
            original_document,
            expanded_document,
            resource_mappings,
            is_main_template: true,
            source_index,
        })
    }

    /// Builds a context for a template that needs no expansion: the
    /// expanded document is the original one and every location maps to
    /// itself.
    pub fn from_source(
        template_identifier: impl Into<String>,
        original_text: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let mut context = TemplateContext::new(
            template_identifier,
            original_text,
            Value::Null,
            ResourceMappings::new(),
        )?;
        context.expanded_document = context.original_document.clone();
        context.resource_mappings = ResourceMappings::identity(&context.source_index);
        Ok(context)
    }

    /// Marks the context as a nested template rather than the entry template.
    pub fn with_main_template(mut self, is_main_template: bool) -> Self {
        self.is_main_template = is_main_template;
        self
    }

    pub fn template_identifier(&self) -> &str {
        &self.template_identifier
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn original_document(&self) -> &Value {
        &self.original_document
    }

    pub fn expanded_document(&self) -> &Value {
        &self.expanded_document
    }

    pub fn resource_mappings(&self) -> &ResourceMappings {
        &self.resource_mappings
    }

    pub fn is_main_template(&self) -> bool {
        self.is_main_template
    }

    pub fn source_index(&self) -> &SourcePositionIndex {
        &self.source_index
    }
}
