//! DataTable Pager - cursor pagination over browsing views
//!
//! One engine serves the tables, pages and data views. A view is chosen by
//! its [`QueryDescriptor`]; the engine orders the projected rows by
//! `(index value, natural id)` and cuts a window out of them.
//!
//! A window starts at an inclusive `from` value or strictly after a
//! continuation [`Cursor`]; a cursor replaces `from`. Advancing by cursor
//! rather than by `from` is what keeps pages free of duplicates when index
//! values repeat.

use datatable_core::{
    Cursor, DataResult, DataTableConfig, Direction, QueryDescriptor, ScanWindow, ViewRow,
};
use datatable_storage::RecordStore;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUEST AND RESULT
// ============================================================================

/// Where a page starts and how large it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Inclusive bound on the index value: lower when ascending, upper
    /// when descending. Ignored once a cursor is set.
    pub from: Option<String>,
    /// Skip every row up to and including this position.
    pub cursor: Option<Cursor>,
    /// Requested page size; the pager clamps it.
    pub limit: Option<usize>,
    pub direction: Direction,
}

impl PageRequest {
    /// First page in ascending order.
    pub fn start() -> Self {
        Self::default()
    }

    pub fn from_value(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Whether the window begins at the very start of the view.
    pub fn is_start(&self) -> bool {
        self.from.is_none() && self.cursor.is_none()
    }

    /// Scan bounds for this request, reading `limit` rows.
    ///
    /// A cursor already points past `from` in its own direction; keeping
    /// `from` as well would clip a reversed walk at the original start.
    pub fn scan_window(&self, limit: usize) -> ScanWindow {
        ScanWindow {
            from: match self.cursor {
                Some(_) => None,
                None => self.from.clone(),
            },
            after: self.cursor.clone(),
            direction: self.direction,
            limit,
        }
    }
}

/// One window of a view plus what a renderer needs to wrap and link it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    pub rows: Vec<ViewRow>,
    /// More rows follow in the requested direction.
    pub has_more: bool,
    /// The window begins at the start of the view.
    pub is_first: bool,
    /// Continue in the same direction.
    pub next: Option<Cursor>,
    /// Continue in the reverse direction, towards rows before this window.
    pub previous: Option<Cursor>,
    pub limit: usize,
    pub direction: Direction,
}

impl ResultPage {
    fn empty(limit: usize, direction: Direction) -> Self {
        Self {
            rows: Vec::new(),
            has_more: false,
            is_first: true,
            next: None,
            previous: None,
            limit,
            direction,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// No rows follow this window.
    pub fn is_last(&self) -> bool {
        !self.has_more
    }

    /// Rows with their first-row and last-row flags.
    pub fn positioned(&self) -> impl Iterator<Item = PositionedRow<'_>> {
        let last = self.rows.len().saturating_sub(1);
        self.rows.iter().enumerate().map(move |(i, row)| PositionedRow {
            row,
            first: i == 0,
            last: i == last,
        })
    }
}

/// A row with its place in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionedRow<'a> {
    pub row: &'a ViewRow,
    pub first: bool,
    pub last: bool,
}

// ============================================================================
// INDEX PAGER
// ============================================================================

/// Cursor pagination over any [`RecordStore`].
pub struct IndexPager<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    default_limit: usize,
    max_limit: usize,
}

impl<'s, S: RecordStore + ?Sized> IndexPager<'s, S> {
    pub fn new(store: &'s S, default_limit: usize, max_limit: usize) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            store,
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub fn from_config(store: &'s S, config: &DataTableConfig) -> Self {
        Self::new(store, config.default_page_size, config.max_page_size)
    }

    /// Effective page size: the default if none was asked for, never
    /// below one or above the maximum.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }

    /// Fetch one window of the view.
    ///
    /// Asks the store for at most `limit + 1` ordered rows past the start
    /// position; the extra row only decides `has_more`.
    pub fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        request: &PageRequest,
    ) -> DataResult<ResultPage> {
        let limit = self.clamp_limit(request.limit);
        let direction = request.direction;

        if matches!(descriptor, QueryDescriptor::Pages { table: None }) {
            tracing::debug!("Pages view without a table, nothing to scan");
            return Ok(ResultPage::empty(limit, direction));
        }

        let mut window = self
            .store
            .scan(descriptor, &request.scan_window(limit + 1))?;
        let has_more = window.len() > limit;
        window.truncate(limit);

        let is_first = request.is_start();
        let next = if has_more {
            window.last().map(Cursor::after_row)
        } else {
            None
        };
        let previous = if is_first {
            None
        } else {
            window.first().map(Cursor::after_row)
        };

        tracing::debug!(
            view = descriptor.index_field(),
            rows = window.len(),
            limit,
            has_more,
            direction = direction.as_param(),
            "Fetched result page"
        );

        Ok(ResultPage {
            rows: window,
            has_more,
            is_first,
            next,
            previous,
            limit,
            direction,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use datatable_core::{PageId, TableName};
    use datatable_storage::MemoryStore;
    use datatable_test_utils::fixtures::{employees, numbered_rows, roster, roster_rows};

    fn data(table: &TableName) -> QueryDescriptor {
        QueryDescriptor::Data {
            table: table.clone(),
            page: None,
            data_from: None,
        }
    }

    fn keys(page: &ResultPage) -> Vec<String> {
        page.rows.iter().map(|r| r.index_key().to_string()).collect()
    }

    fn drain(pager: &IndexPager<'_, MemoryStore>, view: &QueryDescriptor, request: PageRequest) -> Vec<ViewRow> {
        let mut out = Vec::new();
        let mut request = request;
        loop {
            let page = pager.fetch_page(view, &request).unwrap();
            out.extend(page.rows.iter().cloned());
            match page.next {
                Some(cursor) => request = request.after(cursor),
                None => return out,
            }
        }
    }

    #[test]
    fn test_roster_data_view() {
        let store = MemoryStore::new(4);
        store.replace_page_records(&employees(), &roster(), &roster_rows()).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let page = pager.fetch_page(&data(&employees()), &PageRequest::start()).unwrap();
        assert_eq!(keys(&page), vec!["Alice", "Bob"]);
        assert!(page.is_first);
        assert!(page.is_last());
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);

        let flags: Vec<_> = page.positioned().map(|p| (p.first, p.last)).collect();
        assert_eq!(flags, vec![(true, false), (false, true)]);
    }

    #[test]
    fn test_limit_is_clamped() {
        let store = MemoryStore::new(1);
        let pager = IndexPager::new(&store, 50, 10);
        assert_eq!(pager.clamp_limit(None), 10);
        assert_eq!(pager.clamp_limit(Some(0)), 1);
        assert_eq!(pager.clamp_limit(Some(7)), 7);
        assert_eq!(pager.clamp_limit(Some(100_000)), 10);
    }

    #[test]
    fn test_pages_view_without_table_is_empty() {
        let store = MemoryStore::new(4);
        store.replace_page_records(&employees(), &roster(), &roster_rows()).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let page = pager
            .fetch_page(&QueryDescriptor::Pages { table: None }, &PageRequest::start())
            .unwrap();
        assert!(page.is_empty());
        assert!(page.is_last());

        let scoped = pager
            .fetch_page(
                &QueryDescriptor::Pages {
                    table: Some(employees()),
                },
                &PageRequest::start(),
            )
            .unwrap();
        assert_eq!(keys(&scoped), vec!["Roster"]);
    }

    #[test]
    fn test_cursor_walk_has_no_gaps_or_duplicates() {
        let store = MemoryStore::new(1);
        let table = TableName::from_key("Numbers");
        store.replace_page_records(&table, &PageId::new(0, "A"), &numbered_rows("n", 25)).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let walked = drain(&pager, &data(&table), PageRequest::start().with_limit(7));
        let all = pager
            .fetch_page(&data(&table), &PageRequest::start().with_limit(100))
            .unwrap();
        assert_eq!(walked, all.rows);
        assert_eq!(walked.len(), 25);
    }

    #[test]
    fn test_ties_are_split_by_natural_id() {
        let store = MemoryStore::new(1);
        let table = TableName::from_key("Dupes");
        let same = vec![vec!["x".to_string()]; 3];
        store.replace_page_records(&table, &PageId::new(0, "B"), &same).unwrap();
        store.replace_page_records(&table, &PageId::new(0, "A"), &same).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let walked = drain(&pager, &data(&table), PageRequest::start().with_limit(2));
        assert_eq!(walked.len(), 6);
        let ids: Vec<_> = walked.iter().map(ViewRow::natural_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_from_is_inclusive_in_both_directions() {
        let store = MemoryStore::new(1);
        let table = TableName::from_key("Letters");
        let rows: Vec<Vec<String>> = ["a", "b", "c", "d"].iter().map(|v| vec![v.to_string()]).collect();
        store.replace_page_records(&table, &PageId::new(0, "P"), &rows).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let up = pager
            .fetch_page(&data(&table), &PageRequest::start().from_value("b"))
            .unwrap();
        assert_eq!(keys(&up), vec!["b", "c", "d"]);
        assert!(!up.is_first);

        let down = pager
            .fetch_page(
                &data(&table),
                &PageRequest::start()
                    .from_value("c")
                    .with_direction(Direction::Descending),
            )
            .unwrap();
        assert_eq!(keys(&down), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_previous_cursor_walks_back() {
        let store = MemoryStore::new(1);
        let table = TableName::from_key("Numbers");
        store.replace_page_records(&table, &PageId::new(0, "A"), &numbered_rows("n", 10)).unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let first = pager
            .fetch_page(&data(&table), &PageRequest::start().with_limit(4))
            .unwrap();
        let second = pager
            .fetch_page(
                &data(&table),
                &PageRequest::start().with_limit(4).after(first.next.clone().unwrap()),
            )
            .unwrap();
        assert_eq!(keys(&second), vec!["n0004", "n0005", "n0006", "n0007"]);

        let back = pager
            .fetch_page(
                &data(&table),
                &PageRequest::start()
                    .with_limit(4)
                    .with_direction(Direction::Descending)
                    .after(second.previous.clone().unwrap()),
            )
            .unwrap();
        let mut back_keys = keys(&back);
        back_keys.reverse();
        assert_eq!(back_keys, keys(&first));
        assert!(back.is_last());
    }

    #[test]
    fn test_previous_from_a_started_window_is_not_clipped() {
        let store = MemoryStore::new(1);
        let table = TableName::from_key("Employees");
        for title in ["A", "B", "M", "N", "O", "P"] {
            store
                .replace_page_records(&table, &PageId::new(0, title), &[vec![title.to_string()]])
                .unwrap();
        }
        let pager = IndexPager::new(&store, 50, 5000);
        let view = QueryDescriptor::Pages {
            table: Some(table),
        };
        let started = PageRequest::start().from_value("M").with_limit(2);

        let first = pager.fetch_page(&view, &started).unwrap();
        assert_eq!(keys(&first), vec!["M", "N"]);
        let second = pager
            .fetch_page(&view, &started.clone().after(first.next.clone().unwrap()))
            .unwrap();
        assert_eq!(keys(&second), vec!["O", "P"]);

        // The previous link keeps `from` but reverses direction.
        let back = pager
            .fetch_page(
                &view,
                &started
                    .with_direction(Direction::Descending)
                    .after(second.previous.clone().unwrap()),
            )
            .unwrap();
        assert_eq!(keys(&back), vec!["N", "M"]);
        assert!(back.has_more);
    }

    #[test]
    fn test_tables_view_counts() {
        let store = MemoryStore::new(2);
        store.replace_page_records(&employees(), &roster(), &roster_rows()).unwrap();
        store
            .replace_page_records(&employees(), &PageId::new(0, "Annex"), &roster_rows()[..1])
            .unwrap();
        let pager = IndexPager::new(&store, 50, 5000);

        let page = pager
            .fetch_page(&QueryDescriptor::Tables, &PageRequest::start())
            .unwrap();
        match page.rows.as_slice() {
            [ViewRow::Table(summary)] => {
                assert_eq!(summary.table, employees());
                assert_eq!(summary.pages, 2);
                assert_eq!(summary.records, 3);
            }
            other => panic!("unexpected rows: {:?}", other),
        }
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use datatable_core::{PageId, TableName};
    use datatable_storage::MemoryStore;
    use datatable_test_utils::generators::arb_field_value;
    use proptest::prelude::*;

    fn arb_pages() -> impl Strategy<Value = Vec<Vec<String>>> {
        // Few distinct values, so index ties are common.
        prop::collection::vec(
            prop::collection::vec(prop_oneof![Just("k".to_string()), arb_field_value()], 0..6),
            1..5,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Walking by cursor yields every row of the view exactly once, in
        /// order, for any page size and direction.
        #[test]
        fn prop_cursor_walk_reconstructs_view(
            pages in arb_pages(),
            limit in 1usize..6,
            descending in any::<bool>(),
        ) {
            let store = MemoryStore::new(1);
            let table = TableName::from_key("T");
            for (i, values) in pages.iter().enumerate() {
                let rows: Vec<Vec<String>> = values.iter().map(|v| vec![v.clone()]).collect();
                store
                    .replace_page_records(&table, &PageId::new(0, format!("P{}", i)), &rows)
                    .unwrap();
            }
            let pager = IndexPager::new(&store, 50, 5000);
            let view = QueryDescriptor::Data { table, page: None, data_from: None };
            let direction = if descending { Direction::Descending } else { Direction::Ascending };

            let everything = ScanWindow { direction, ..ScanWindow::all() };
            let expected = store.scan(&view, &everything).unwrap();

            let mut walked = Vec::new();
            let mut request = PageRequest::start().with_limit(limit).with_direction(direction);
            loop {
                let page = pager.fetch_page(&view, &request).unwrap();
                prop_assert!(page.rows.len() <= limit);
                let again = pager.fetch_page(&view, &request).unwrap();
                prop_assert_eq!(&page, &again);
                walked.extend(page.rows.iter().cloned());
                match page.next {
                    Some(cursor) => request = request.after(cursor),
                    None => break,
                }
            }
            prop_assert_eq!(walked, expected);
        }
    }
}
