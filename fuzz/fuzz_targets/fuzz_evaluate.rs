#![no_main]

use arbitrary::Arbitrary;
use armlint::{Engine, EngineOptions, TemplateContext, parse_rules};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    rules: String,
    template: String,
    parallelism: u8,
}

fuzz_target!(|input: Input| {
    let Ok(catalog) = parse_rules(&input.rules) else {
        return;
    };
    let Ok(ctx) = TemplateContext::from_source("f.json", input.template) else {
        return;
    };

    let engine = Engine::new(catalog).with_options(EngineOptions {
        parallelism: usize::from(input.parallelism % 4) + 1,
        rule_time_budget: None,
    });
    let report = engine.analyze(&ctx);
    assert_eq!(
        report.evaluations.len() + report.errors.len(),
        engine.active_rules().len()
    );
});
