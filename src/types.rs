use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::enums::*;
use crate::operators::Operator;
use crate::path::JsonPath;

// ─── Expression tree ────────────────────────────────────────────────────────

/// Where an expression applies, relative to the scope it is evaluated in.
///
/// Narrowing happens in this order: `resource_type`, then `where`, then `path`.
#[derive(Clone, Debug, Default)]
pub struct ExpressionScope {
    pub resource_type: Option<String>,
    pub path: Option<JsonPath>,
    pub where_condition: Option<Box<ExpressionNode>>,
}

/// A terminal node applying one operator to every resolved value.
#[derive(Clone, Debug)]
pub struct LeafExpression {
    pub scope: ExpressionScope,
    pub operator: Operator,
}

/// An `allOf` or `anyOf` node.
#[derive(Clone, Debug)]
pub struct StructuredExpression {
    pub scope: ExpressionScope,
    pub children: Vec<ExpressionNode>,
}

/// A rule expression. Exactly one discriminator (`allOf`, `anyOf` or an
/// operator key) was present in the source node; the loader guarantees it.
#[derive(Clone, Debug)]
pub enum ExpressionNode {
    Leaf(LeafExpression),
    AllOf(StructuredExpression),
    AnyOf(StructuredExpression),
}

impl ExpressionNode {
    pub fn scope(&self) -> &ExpressionScope {
        match self {
            ExpressionNode::Leaf(leaf) => &leaf.scope,
            ExpressionNode::AllOf(s) | ExpressionNode::AnyOf(s) => &s.scope,
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        match self {
            ExpressionNode::Leaf(_) => ExpressionKind::Leaf,
            ExpressionNode::AllOf(_) => ExpressionKind::AllOf,
            ExpressionNode::AnyOf(_) => ExpressionKind::AnyOf,
        }
    }
}

// ─── Rules ──────────────────────────────────────────────────────────────────

/// A validated rule. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct RuleDefinition {
    pub id: String,
    pub description: String,
    pub recommendation: String,
    pub help_uri: Option<String>,
    pub severity: Severity,
    pub evaluation: ExpressionNode,
}

/// The loaded rule set, in declaration order, with an id index.
///
/// Built once per engine and passed by reference; never mutated.
#[derive(Clone, Debug, Default)]
pub struct RuleCatalog {
    rules: Vec<RuleDefinition>,
    by_id: HashMap<String, usize>,
}

impl RuleCatalog {
    /// Callers guarantee ids are unique; the loader checks this.
    pub(crate) fn from_rules(rules: Vec<RuleDefinition>) -> Self {
        let by_id = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        RuleCatalog { rules, by_id }
    }

    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&RuleDefinition> {
        self.by_id.get(id).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ─── Evaluation results ─────────────────────────────────────────────────────

/// Rule-level facts shared by every node of one evaluation tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub rule_id: String,
    pub description: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_uri: Option<String>,
    pub severity: Severity,
    pub file_identifier: String,
}

impl RuleMetadata {
    /// Metadata for `rule` reported at `severity` against one template.
    pub fn for_rule(rule: &RuleDefinition, severity: Severity, file_identifier: &str) -> Self {
        RuleMetadata {
            rule_id: rule.id.clone(),
            description: rule.description.clone(),
            recommendation: rule.recommendation.clone(),
            help_uri: rule.help_uri.clone(),
            severity,
            file_identifier: file_identifier.to_string(),
        }
    }
}

/// One operator application: whether it held and where.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    pub passed: bool,
    pub line: usize,
}

/// A node of the result tree. One tree is produced per rule per template.
///
/// `passed` is derived from the node's own results and children when the
/// engine builds the node and cannot be set otherwise.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(flatten)]
    metadata: Arc<RuleMetadata>,
    kind: ExpressionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'static str>,
    passed: bool,
    results: Vec<EvaluationResult>,
    evaluations: Vec<Evaluation>,
}

impl Evaluation {
    /// A leaf node: passes iff every result passed.
    pub(crate) fn leaf(
        metadata: Arc<RuleMetadata>,
        operator: &'static str,
        results: Vec<EvaluationResult>,
    ) -> Self {
        let passed = results.iter().all(|r| r.passed);
        Evaluation {
            metadata,
            kind: ExpressionKind::Leaf,
            operator: Some(operator),
            passed,
            results,
            evaluations: Vec::new(),
        }
    }

    /// An `allOf` node: the AND of its children, `true` when empty.
    pub(crate) fn all_of(metadata: Arc<RuleMetadata>, evaluations: Vec<Evaluation>) -> Self {
        let passed = evaluations.iter().all(|e| e.passed);
        Evaluation {
            metadata,
            kind: ExpressionKind::AllOf,
            operator: None,
            passed,
            results: Vec::new(),
            evaluations,
        }
    }

    /// An `anyOf` node: the OR of its children, `false` when empty.
    pub(crate) fn any_of(metadata: Arc<RuleMetadata>, evaluations: Vec<Evaluation>) -> Self {
        let passed = evaluations.iter().any(|e| e.passed);
        Evaluation {
            metadata,
            kind: ExpressionKind::AnyOf,
            operator: None,
            passed,
            results: Vec::new(),
            evaluations,
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.metadata.rule_id
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    pub fn recommendation(&self) -> &str {
        &self.metadata.recommendation
    }

    pub fn help_uri(&self) -> Option<&str> {
        self.metadata.help_uri.as_deref()
    }

    pub fn severity(&self) -> Severity {
        self.metadata.severity
    }

    pub fn file_identifier(&self) -> &str {
        &self.metadata.file_identifier
    }

    pub fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    /// Operator key for leaf nodes.
    pub fn operator(&self) -> Option<&'static str> {
        self.operator
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Results recorded by this node itself (leaf nodes only).
    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    /// Immediate children, in evaluation order.
    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn evaluations_evaluated_true(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.passed)
    }

    pub fn evaluations_evaluated_false(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| !e.passed)
    }

    /// Whether this node or any descendant recorded a leaf result.
    pub fn has_results(&self) -> bool {
        !self.results.is_empty() || self.evaluations.iter().any(Evaluation::has_results)
    }

    /// The failing leaf results a reporter should emit, one diagnostic each.
    ///
    /// Empty when the node passed. Otherwise the node's own failing results
    /// followed by those of every failing child, depth first.
    pub fn failing_results(&self) -> Vec<EvaluationResult> {
        let mut out = Vec::new();
        self.collect_failures(&mut out);
        out
    }

    fn collect_failures(&self, out: &mut Vec<EvaluationResult>) {
        if self.passed {
            return;
        }
        out.extend(self.results.iter().filter(|r| !r.passed).copied());
        for child in self.evaluations_evaluated_false() {
            child.collect_failures(out);
        }
    }
}
