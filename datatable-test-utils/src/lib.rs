//! DataTable Test Utilities
//!
//! Shared test infrastructure for the DataTable workspace:
//! - Proptest generators for titles, rows and page content
//! - Fixtures for the employee roster scenario
//! - Assertions for DataTable results

pub use datatable_core::{
    ColumnSet, DataError, DataResult, DataTableConfig, PageId, Record, RecordQuery,
    StorageError, TableConfig, TableName, TitleRules,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for DataTable inputs.

    use super::*;
    use proptest::prelude::*;

    /// A title that is valid under the default title rules.
    pub fn arb_title_text() -> impl Strategy<Value = String> {
        "[A-Z][a-z0-9]{0,12}( [a-z0-9]{1,8}){0,2}"
    }

    pub fn arb_table_name() -> impl Strategy<Value = TableName> {
        arb_title_text().prop_map(|t| TableName::from_key(t.replace(' ', "_")))
    }

    /// Main-namespace page ids.
    pub fn arb_page_id() -> impl Strategy<Value = PageId> {
        arb_title_text().prop_map(|t| PageId::new(0, t.replace(' ', "_")))
    }

    /// A field value that contains no markup, separators or edge
    /// whitespace, so it survives extraction unchanged.
    pub fn arb_field_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9 .,-]{0,15}".prop_map(|s| s.trim().to_string())
    }

    /// One row with at most `slots` values.
    pub fn arb_row(slots: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_field_value(), 0..=slots)
    }

    /// Up to `max_rows` rows with at most `slots` values each.
    pub fn arb_rows(slots: usize, max_rows: usize) -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(arb_row(slots), 0..=max_rows)
    }

    /// Arbitrary text mixing prose and directive fragments, for scanner
    /// robustness.
    pub fn arb_wikitext() -> impl Strategy<Value = String> {
        let piece = prop_oneof![
            "[a-z \n]{0,10}",
            Just("{{#data:".to_string()),
            Just("{{".to_string()),
            Just("}}".to_string()),
            Just("[[".to_string()),
            Just("]]".to_string()),
            Just("|".to_string()),
            Just("<!--".to_string()),
            Just("-->".to_string()),
            Just("<nowiki>".to_string()),
            Just("</nowiki>".to_string()),
            Just("ä".to_string()),
        ];
        prop::collection::vec(piece, 0..40).prop_map(|parts| parts.concat())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Render rows as data directives for `table`.
    pub fn page_content(table: &str, rows: &[Vec<String>]) -> String {
        rows.iter()
            .map(|row| {
                let mut directive = format!("{{{{#data:{}", table);
                for value in row {
                    directive.push('|');
                    directive.push_str(value);
                }
                directive.push_str("}}\n");
                directive
            })
            .collect()
    }

    /// Config with an `Employees` table labelled `[Name, City]`.
    pub fn employees_config() -> DataTableConfig {
        let mut config = DataTableConfig {
            data_slots: 4,
            ..Default::default()
        };
        config.tables.insert(
            "Employees".to_string(),
            TableConfig {
                columns: vec!["Name".to_string(), "City".to_string()],
            },
        );
        config
    }

    pub fn employees() -> TableName {
        TableName::from_key("Employees")
    }

    pub fn roster() -> PageId {
        PageId::new(0, "Roster")
    }

    pub fn roster_rows() -> Vec<Vec<String>> {
        vec![
            vec!["Alice".to_string(), "Kampala".to_string()],
            vec!["Bob".to_string(), "Nairobi".to_string()],
        ]
    }

    /// The roster page as authored.
    pub fn roster_content() -> String {
        format!("Staff of the month.\n\n{}", page_content("Employees", &roster_rows()))
    }

    /// `n` single-field rows `"{prefix}{i:04}"`.
    pub fn numbered_rows(prefix: &str, n: usize) -> Vec<Vec<String>> {
        (0..n).map(|i| vec![format!("{}{:04}", prefix, i)]).collect()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for DataTable results.

    use super::*;

    /// Assert that a DataResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &DataResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a DataResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &DataResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a DataResult failed with `StorageError::InvalidQuery`.
    #[track_caller]
    pub fn assert_invalid_query<T: std::fmt::Debug>(result: &DataResult<T>) {
        match result {
            Err(DataError::Storage(StorageError::InvalidQuery { .. })) => {}
            other => panic!("Expected InvalidQuery, got: {:?}", other),
        }
    }

    /// Assert that records carry sequences 1..=n in order.
    #[track_caller]
    pub fn assert_dense_sequences(records: &[Record]) {
        for (i, record) in records.iter().enumerate() {
            assert_eq!(
                record.sequence as usize,
                i + 1,
                "record {} has sequence {}",
                i,
                record.sequence
            );
        }
    }

    /// Field values of records with the empty padding slots removed.
    pub fn field_rows(records: &[Record]) -> Vec<Vec<String>> {
        records
            .iter()
            .map(|r| {
                let mut fields = r.fields.clone();
                while fields.last().is_some_and(|f| f.is_empty()) {
                    fields.pop();
                }
                fields
            })
            .collect()
    }
}
