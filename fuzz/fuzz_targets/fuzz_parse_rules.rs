#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = armlint::parse_rules(s);
        let _ = armlint::parse_rules_yaml(s);
        let _ = armlint::FilterConfiguration::parse(s);
    }
});
