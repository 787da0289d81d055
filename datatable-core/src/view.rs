//! Browsing view descriptors, typed view rows and continuation cursors.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PageId, PageSummary, Record, TableName, TableSummary};

/// Shape of one browsing query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum QueryDescriptor {
    /// All tables with distinct page and record counts.
    Tables,
    /// Pages that own records in one table. Without a table the view is
    /// empty.
    Pages { table: Option<TableName> },
    /// Raw records of one table, optionally one page, optionally starting
    /// at a first-field value.
    Data {
        table: TableName,
        page: Option<PageId>,
        data_from: Option<String>,
    },
}

impl QueryDescriptor {
    /// Name of the field that defines sort and cursor order.
    pub fn index_field(&self) -> &'static str {
        match self {
            QueryDescriptor::Tables => "table",
            QueryDescriptor::Pages { .. } => "page_title",
            QueryDescriptor::Data { .. } => "data_1",
        }
    }
}

/// Stable secondary key of a view row, used to break index ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaturalId {
    Table(TableName),
    Page(PageId),
    Record { page: PageId, sequence: u32 },
}

/// One projected row of a browsing view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ViewRow {
    Table(TableSummary),
    Page(PageSummary),
    Data(Record),
}

impl ViewRow {
    /// Value of the view's index field.
    pub fn index_key(&self) -> &str {
        match self {
            ViewRow::Table(t) => t.table.key(),
            ViewRow::Page(p) => &p.page.title,
            ViewRow::Data(r) => r.field(1),
        }
    }

    pub fn natural_id(&self) -> NaturalId {
        match self {
            ViewRow::Table(t) => NaturalId::Table(t.table.clone()),
            ViewRow::Page(p) => NaturalId::Page(p.page.clone()),
            ViewRow::Data(r) => NaturalId::Record {
                page: r.page.clone(),
                sequence: r.sequence,
            },
        }
    }
}

/// Scan direction of a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Parse the `dir` request parameter; anything but `desc` is ascending.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("desc") => Direction::Descending,
            _ => Direction::Ascending,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// Continuation point between two pages: the last emitted row's index
/// value and natural id. Rows at or before it in scan order are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub value: String,
    pub after: NaturalId,
}

impl Cursor {
    pub fn after_row(row: &ViewRow) -> Self {
        Self {
            value: row.index_key().to_string(),
            after: row.natural_id(),
        }
    }

    /// Opaque URL-safe form: hex-encoded JSON.
    pub fn encode(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Decode an opaque cursor; malformed input yields `None`.
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = hex::decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Total order of view rows: index value, then natural id.
pub fn compare_rows(a: &ViewRow, b: &ViewRow) -> Ordering {
    a.index_key()
        .cmp(b.index_key())
        .then_with(|| a.natural_id().cmp(&b.natural_id()))
}

/// Bounds and size of one ordered scan over a view.
///
/// Rows come back in `(index value, natural id)` order, reversed when
/// descending, starting at `from` and strictly past `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWindow {
    /// Inclusive bound on the index value: lower when ascending, upper
    /// when descending.
    pub from: Option<String>,
    pub after: Option<Cursor>,
    pub direction: Direction,
    /// Most rows to return.
    pub limit: usize,
}

impl ScanWindow {
    /// Every row of the view, ascending.
    pub fn all() -> Self {
        Self {
            from: None,
            after: None,
            direction: Direction::Ascending,
            limit: usize::MAX,
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == Direction::Ascending
    }

    /// The tightest bound on the index value in scan direction, combining
    /// `from` and the cursor.
    pub fn start_value(&self) -> Option<&str> {
        let cursor = self.after.as_ref().map(|c| c.value.as_str());
        match (self.from.as_deref(), cursor) {
            (Some(from), Some(cursor)) if self.is_ascending() => Some(from.max(cursor)),
            (Some(from), Some(cursor)) => Some(from.min(cursor)),
            (from, cursor) => from.or(cursor),
        }
    }

    /// Whether `row` lies inside the window's bounds.
    pub fn admits(&self, row: &ViewRow) -> bool {
        let ascending = self.is_ascending();
        if let Some(from) = &self.from {
            let key = row.index_key();
            let within = if ascending {
                key >= from.as_str()
            } else {
                key <= from.as_str()
            };
            if !within {
                return false;
            }
        }
        match &self.after {
            None => true,
            Some(cursor) => {
                let ord = row
                    .index_key()
                    .cmp(cursor.value.as_str())
                    .then_with(|| row.natural_id().cmp(&cursor.after));
                if ascending {
                    ord == Ordering::Greater
                } else {
                    ord == Ordering::Less
                }
            }
        }
    }

    /// Order, bound and cut rows already held in memory.
    pub fn apply(&self, mut rows: Vec<ViewRow>) -> Vec<ViewRow> {
        rows.sort_by(compare_rows);
        if !self.is_ascending() {
            rows.reverse();
        }
        rows.into_iter()
            .filter(|row| self.admits(row))
            .take(self.limit)
            .collect()
    }
}
