//! The expression-tree interpreter.
//!
//! Each node narrows the scope it is given (resource type, then `where`,
//! then path) and applies its own logic to every narrowed scope:
//!
//! - leaf: the operator must hold for every resolved value;
//! - `allOf`: AND over children, `true` with nothing to check;
//! - `anyOf`: OR over children, `false` with nothing to check.
//!
//! The asymmetry between the last two is the identity of AND and OR and is
//! intentional.

use crate::context::TemplateContext;
use crate::error::{EvaluationError, EvaluationErrorKind};
use crate::resolver::JsonPathResolver;
use crate::types::*;
use std::sync::Arc;
use std::time::Instant;

/// Evaluates expression trees on behalf of one rule.
#[derive(Clone, Debug)]
pub struct Evaluator {
    metadata: Arc<RuleMetadata>,
    deadline: Option<Instant>,
}

impl Evaluator {
    pub fn new(metadata: RuleMetadata) -> Self {
        Evaluator {
            metadata: Arc::new(metadata),
            deadline: None,
        }
    }

    /// Aborts evaluation with a timeout error once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Evaluates `node` relative to `scope`.
    ///
    /// # Errors
    ///
    /// `MissingScope` when `scope` is `None`; `Operator` when an operator
    /// cannot interpret a value; `Timeout` when the deadline has passed.
    pub fn evaluate(
        &self,
        node: &ExpressionNode,
        scope: Option<&JsonPathResolver<'_>>,
    ) -> Result<Evaluation, EvaluationError> {
        let scope = scope.ok_or_else(EvaluationError::missing_scope)?;
        self.check_deadline()?;

        let candidates = self.narrow(node.scope(), scope)?;

        match node {
            ExpressionNode::Leaf(leaf) => self.leaf(leaf, &candidates),
            ExpressionNode::AllOf(structured) => {
                let children = self.children(structured, &candidates)?;
                Ok(Evaluation::all_of(self.metadata.clone(), children))
            }
            ExpressionNode::AnyOf(structured) => {
                let children = self.children(structured, &candidates)?;
                Ok(Evaluation::any_of(self.metadata.clone(), children))
            }
        }
    }

    /// Applies the resource-type and `where` narrowing.
    fn narrow<'a>(
        &self,
        node_scope: &ExpressionScope,
        scope: &JsonPathResolver<'a>,
    ) -> Result<Vec<JsonPathResolver<'a>>, EvaluationError> {
        let candidates = match &node_scope.resource_type {
            Some(resource_type) => scope.resolve_resource_type(resource_type),
            None => vec![scope.clone()],
        };

        let Some(condition) = &node_scope.where_condition else {
            return Ok(candidates);
        };

        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.evaluate(condition, Some(&candidate))?.passed() {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }

    fn leaf(
        &self,
        leaf: &LeafExpression,
        candidates: &[JsonPathResolver<'_>],
    ) -> Result<Evaluation, EvaluationError> {
        let operator = &leaf.operator;
        let mut results = Vec::new();

        for scope in candidates {
            self.check_deadline()?;
            let matches = match &leaf.scope.path {
                Some(path) => scope.resolve(path),
                None => vec![scope.clone()],
            };

            if matches.is_empty() {
                let passed = operator
                    .evaluate(None)
                    .map_err(|e| located(e.into(), scope))?;
                results.push(EvaluationResult {
                    passed,
                    line: scope.line(),
                });
                continue;
            }

            for resolved in &matches {
                self.check_deadline()?;
                let passed = operator
                    .evaluate(Some(resolved.value()))
                    .map_err(|e| located(e.into(), resolved))?;
                results.push(EvaluationResult {
                    passed,
                    line: resolved.line(),
                });
            }
        }

        Ok(Evaluation::leaf(
            self.metadata.clone(),
            operator.name(),
            results,
        ))
    }

    /// Evaluates every child against every path-resolved scope, in order.
    /// Scopes whose path does not resolve contribute nothing.
    fn children(
        &self,
        structured: &StructuredExpression,
        candidates: &[JsonPathResolver<'_>],
    ) -> Result<Vec<Evaluation>, EvaluationError> {
        let mut evaluations = Vec::new();
        for candidate in candidates {
            let scopes = match &structured.scope.path {
                Some(path) => candidate.resolve(path),
                None => vec![candidate.clone()],
            };
            for scope in &scopes {
                for child in &structured.children {
                    evaluations.push(self.evaluate(child, Some(scope))?);
                }
            }
        }
        Ok(evaluations)
    }

    fn check_deadline(&self) -> Result<(), EvaluationError> {
        if let Some(deadline) = self.deadline
            && Instant::now() > deadline
        {
            return Err(EvaluationError {
                kind: EvaluationErrorKind::Timeout,
                message: "rule exceeded its evaluation time budget".to_string(),
                rule_id: None,
            });
        }
        Ok(())
    }
}

fn located(mut error: EvaluationError, at: &JsonPathResolver<'_>) -> EvaluationError {
    error.message = format!("{} (at '{}')", error.message, at.path());
    error
}

/// Evaluates one rule against a template, starting at the document root.
///
/// Errors carry the rule id.
pub fn evaluate_rule(
    rule: &RuleDefinition,
    context: &TemplateContext,
) -> Result<Evaluation, EvaluationError> {
    let evaluator = Evaluator::new(RuleMetadata::for_rule(
        rule,
        rule.severity,
        context.template_identifier(),
    ));
    run(&evaluator, rule, context)
}

pub(crate) fn run(
    evaluator: &Evaluator,
    rule: &RuleDefinition,
    context: &TemplateContext,
) -> Result<Evaluation, EvaluationError> {
    let root = JsonPathResolver::new(context);
    evaluator
        .evaluate(&rule.evaluation, Some(&root))
        .map_err(|mut e| {
            e.rule_id = Some(rule.id.clone());
            e
        })
}
