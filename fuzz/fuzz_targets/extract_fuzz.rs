//! Fuzz target for data directive extraction.
//!
//! Checks that extraction never panics and that no extracted row is wider
//! than the configured slot count.
//!
//! Run with: cargo +nightly fuzz run extract_fuzz -- -max_total_time=60

#![no_main]

use datatable_core::DataTableConfig;
use datatable_extract::Extractor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let config = DataTableConfig::default();
        let extractor = Extractor::from_config(&config);

        let extraction = extractor.extract_page(input);
        for rows in extraction.tables.values() {
            for row in rows {
                assert!(row.len() <= config.data_slots, "row wider than {} slots", config.data_slots);
            }
        }

        // Lazy and eager extraction agree.
        let lazy = extractor.extract(input).filter(|r| r.is_ok()).count();
        assert_eq!(lazy, extraction.record_count());

        for select in extractor.selects(input).flatten() {
            assert!(select.span.end <= input.len());
        }
    }
});
