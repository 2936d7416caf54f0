#![no_main]

use armlint::lines::{SourcePositionIndex, strip_comments};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let cleaned = strip_comments(text);
        assert_eq!(cleaned.lines().count(), text.lines().count());

        // The index must accept everything serde_json accepts.
        if serde_json::from_str::<serde_json::Value>(&cleaned).is_ok() {
            let index = SourcePositionIndex::build(&cleaned);
            assert!(index.is_ok(), "{:?}", index.err());
        }
    }
});
