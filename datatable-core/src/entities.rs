//! Entity types: column sets, records and the aggregate rows of the
//! browsing views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PageId, TableName};

/// Physical name of the 1-based generic data slot `index`.
pub fn slot_name(index: usize) -> String {
    format!("data_{}", index)
}

/// Ordered display labels of a table's generic data slots (1-based).
///
/// Every table has exactly `len()` slots; labels are metadata only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    labels: Vec<String>,
}

impl ColumnSet {
    /// Build a column set with `slots` slots, labelled from `labels` and
    /// falling back to `data_N` where no label is given.
    pub fn new(slots: usize, labels: &[String]) -> Self {
        let labels = (1..=slots)
            .map(|i| {
                labels
                    .get(i - 1)
                    .filter(|l| !l.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| slot_name(i))
            })
            .collect();
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of the 1-based slot.
    pub fn label(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Resolve a label or a `data_N` slot name to its 1-based index.
    /// Labels match case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        if let Some(pos) = self
            .labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(wanted))
        {
            return Some(pos + 1);
        }
        wanted
            .strip_prefix("data_")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n >= 1 && *n <= self.labels.len())
    }
}

/// One row of field values owned by a single source page within one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub table: TableName,
    pub page: PageId,
    /// 1-based position among the page's rows for this table.
    pub sequence: u32,
    pub fields: Vec<String>,
}

impl Record {
    /// Value of the 1-based slot; unprovisioned slots read as empty.
    pub fn field(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Field values keyed by column label.
    pub fn to_named(&self, columns: &ColumnSet) -> BTreeMap<String, String> {
        columns
            .labels()
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), self.field(i + 1).to_string()))
            .collect()
    }
}

/// Registry entry for a table that has been written at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: TableName,
    pub registered_at: DateTime<Utc>,
}

/// Tables view row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: TableName,
    pub pages: u64,
    pub records: u64,
}

/// Pages view row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: PageId,
    pub records: u64,
}
