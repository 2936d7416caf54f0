//! Runs the active rule set against templates.
//!
//! Rules are independent, so they may be evaluated on worker threads.
//! Results are always collected by rule index: the report lists rules in
//! catalog order no matter which finished first.

use crate::context::TemplateContext;
use crate::error::{EvaluationError, EvaluationErrorKind};
use crate::evaluate::{self, Evaluator};
use crate::filter::{ActiveRule, FilterConfiguration};
use crate::types::*;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Tuning knobs that do not change evaluation results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Worker threads used per template. `1` evaluates on the caller's thread.
    pub parallelism: usize,
    /// Wall-clock budget per rule; exceeding it fails that rule only.
    pub rule_time_budget: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            parallelism: 1,
            rule_time_budget: None,
        }
    }
}

/// A rule that could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure {
    pub rule_id: String,
    pub file_identifier: String,
    pub error: EvaluationError,
}

/// Outcome of analyzing one template. Both lists follow catalog order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AnalysisReport {
    pub evaluations: Vec<Evaluation>,
    pub errors: Vec<RuleFailure>,
}

impl AnalysisReport {
    /// Evaluations of rules the template violates.
    pub fn failed(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| !e.passed())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A loaded rule catalog plus the configuration selecting what runs.
#[derive(Clone, Debug)]
pub struct Engine {
    catalog: RuleCatalog,
    configuration: FilterConfiguration,
    options: EngineOptions,
}

impl Engine {
    pub fn new(catalog: RuleCatalog) -> Self {
        Engine {
            catalog,
            configuration: FilterConfiguration::default(),
            options: EngineOptions::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: FilterConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn configuration(&self) -> &FilterConfiguration {
        &self.configuration
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The rules the current configuration selects, in catalog order.
    pub fn active_rules(&self) -> Vec<ActiveRule<'_>> {
        self.configuration.select(&self.catalog)
    }

    /// Evaluates every active rule against `context`.
    pub fn analyze(&self, context: &TemplateContext) -> AnalysisReport {
        let active = self.active_rules();
        debug!(
            template = context.template_identifier(),
            main_template = context.is_main_template(),
            rules = active.len(),
            "analyzing template"
        );

        let outcomes = if self.options.parallelism > 1 && active.len() > 1 {
            self.evaluate_parallel(&active, context)
        } else {
            active
                .iter()
                .map(|rule| self.evaluate_isolated(rule, context))
                .collect()
        };

        let mut report = AnalysisReport::default();
        for (rule, outcome) in active.iter().zip(outcomes) {
            match outcome {
                Ok(evaluation) => report.evaluations.push(evaluation),
                Err(error) => report.errors.push(RuleFailure {
                    rule_id: rule.rule.id.clone(),
                    file_identifier: context.template_identifier().to_string(),
                    error,
                }),
            }
        }
        report
    }

    /// Analyzes several independent templates, one report each, in input order.
    pub fn analyze_all(&self, contexts: &[TemplateContext]) -> Vec<AnalysisReport> {
        contexts.iter().map(|c| self.analyze(c)).collect()
    }

    fn evaluate_parallel(
        &self,
        active: &[ActiveRule<'_>],
        context: &TemplateContext,
    ) -> Vec<Result<Evaluation, EvaluationError>> {
        let workers = self.options.parallelism.min(active.len());
        let mut slots: Vec<Option<Result<Evaluation, EvaluationError>>> =
            (0..active.len()).map(|_| None).collect();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    s.spawn(move || {
                        active
                            .iter()
                            .enumerate()
                            .skip(worker)
                            .step_by(workers)
                            .map(|(i, rule)| (i, self.evaluate_isolated(rule, context)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            for handle in handles {
                if let Ok(done) = handle.join() {
                    for (i, outcome) in done {
                        slots[i] = Some(outcome);
                    }
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(internal_error("worker thread failed"))))
            .collect()
    }

    /// Evaluates one rule; a panic inside evaluation fails that rule only.
    fn evaluate_isolated(
        &self,
        active: &ActiveRule<'_>,
        context: &TemplateContext,
    ) -> Result<Evaluation, EvaluationError> {
        let rule = active.rule;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let metadata =
                RuleMetadata::for_rule(rule, active.severity, context.template_identifier());
            let mut evaluator = Evaluator::new(metadata);
            // A budget too large to add to the clock means no deadline.
            if let Some(budget) = self.options.rule_time_budget
                && let Some(deadline) = Instant::now().checked_add(budget)
            {
                evaluator = evaluator.with_deadline(deadline);
            }
            evaluate::run(&evaluator, rule, context)
        }))
        .unwrap_or_else(|_| {
            let mut error = internal_error("rule evaluation panicked");
            error.rule_id = Some(rule.id.clone());
            Err(error)
        });

        match &outcome {
            Ok(evaluation) => debug!(rule = %rule.id, passed = evaluation.passed(), "rule evaluated"),
            Err(error) => warn!(rule = %rule.id, error = %error, "rule evaluation failed"),
        }
        outcome
    }
}

fn internal_error(message: &str) -> EvaluationError {
    EvaluationError {
        kind: EvaluationErrorKind::Internal,
        message: message.to_string(),
        rule_id: None,
    }
}
