#![no_main]

use armlint::path::JsonPath;
use armlint::{JsonPathResolver, TemplateContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Use the first byte to determine the split point between path and template.
    let split = data[0] as usize % data.len().max(1);
    let (path_bytes, text_bytes) = data.split_at(split.min(data.len()));

    let path = String::from_utf8_lossy(path_bytes);
    let Ok(text) = std::str::from_utf8(text_bytes) else {
        return;
    };
    let (Ok(path), Ok(ctx)) = (JsonPath::parse(&path), TemplateContext::from_source("f.json", text))
    else {
        return;
    };

    let root = JsonPathResolver::new(&ctx);
    for resolver in root.resolve(&path) {
        let _ = resolver.line();
        let _ = resolver.resolve_resource_type("x/y");
    }
});
