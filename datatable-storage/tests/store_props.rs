//! Property tests for record store invariants.

use std::collections::BTreeSet;

use datatable_storage::{DataStore, LmdbStore, MemoryStore, PageRows, RecordStore};
use datatable_test_utils::assertions::field_rows;
use datatable_test_utils::generators::{arb_page_id, arb_rows, arb_table_name};
use datatable_test_utils::{PageId, RecordQuery, TableName};
use proptest::prelude::*;
use tempfile::TempDir;

const SLOTS: usize = 4;

fn records_of(store: &dyn DataStore, table: &TableName, page: &PageId) -> Vec<Vec<String>> {
    let records = store
        .select(table, &RecordQuery::all())
        .unwrap()
        .unwrap_or_default();
    let owned: Vec<_> = records.into_iter().filter(|r| &r.page == page).collect();
    field_rows(&owned)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Replacing twice with the same rows is the same as replacing once.
    #[test]
    fn prop_replace_idempotent(
        table in arb_table_name(),
        page in arb_page_id(),
        rows in arb_rows(SLOTS, 8),
    ) {
        let store = MemoryStore::new(SLOTS);
        store.replace_page_records(&table, &page, &rows).unwrap();
        let once = store.select(&table, &RecordQuery::all()).unwrap();
        store.replace_page_records(&table, &page, &rows).unwrap();
        let twice = store.select(&table, &RecordQuery::all()).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// A page's rows come back in input order, and replacing one page
    /// never disturbs another.
    #[test]
    fn prop_pages_are_isolated(
        table in arb_table_name(),
        a in arb_page_id(),
        b in arb_page_id(),
        rows_a in arb_rows(SLOTS, 6),
        rows_b in arb_rows(SLOTS, 6),
        rows_c in arb_rows(SLOTS, 6),
    ) {
        prop_assume!(a != b);
        let store = MemoryStore::new(SLOTS);
        store.replace_page_records(&table, &a, &rows_a).unwrap();
        store.replace_page_records(&table, &b, &rows_b).unwrap();
        store.replace_page_records(&table, &a, &rows_c).unwrap();

        prop_assert_eq!(records_of(&store, &table, &b), trim(&rows_b));
        prop_assert_eq!(records_of(&store, &table, &a), trim(&rows_c));
    }

    /// After a page is deleted no table holds its rows, in either backend.
    #[test]
    fn prop_delete_complete(
        page in arb_page_id(),
        other in arb_page_id(),
        tables in prop::collection::btree_map(arb_table_name(), arb_rows(SLOTS, 4), 1..4),
    ) {
        prop_assume!(page != other);
        let dir = TempDir::new().unwrap();
        let lmdb = LmdbStore::open(dir.path(), 16, SLOTS).unwrap();
        let memory = MemoryStore::new(SLOTS);
        let stores: [&dyn DataStore; 2] = [&memory, &lmdb];

        let rows: PageRows = tables;
        for store in stores {
            store.replace_page(&page, &rows).unwrap();
            store.replace_page(&other, &rows).unwrap();
            store.delete_page_records(&page, None).unwrap();

            for table in rows.keys() {
                let records = store.select(table, &RecordQuery::all()).unwrap().unwrap();
                prop_assert!(records.iter().all(|r| r.page != page));
            }
            prop_assert!(store.tables_for_page(&page).unwrap().is_empty());
            let expected: BTreeSet<_> = rows
                .iter()
                .filter(|(_, r)| !r.is_empty())
                .map(|(t, _)| t.clone())
                .collect();
            prop_assert_eq!(store.tables_for_page(&other).unwrap(), expected);
        }
    }
}

/// Rows as stored and read back: trailing empty values are padding.
fn trim(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            while row.last().is_some_and(|v| v.is_empty()) {
                row.pop();
            }
            row
        })
        .collect()
}
