//! Fuzz target for the directive scanner.
//!
//! Arbitrary page text must never panic the scanner, and every span it
//! reports must lie on character boundaries inside the input.
//!
//! Run with: cargo +nightly fuzz run scanner_fuzz -- -max_total_time=60

#![no_main]

use datatable_extract::DirectiveScanner;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for raw in DirectiveScanner::new(input, "data", "dataselect").flatten() {
            let span = raw.span;
            assert!(span.start < span.end, "empty span {:?}", span);
            assert!(span.end <= input.len(), "span past end {:?}", span);
            assert!(input.is_char_boundary(span.start) && input.is_char_boundary(span.end));
            assert!(span.line >= 1 && span.column >= 1);
            assert!(input[span.start..span.end].starts_with("{{#"));
        }
    }
});
