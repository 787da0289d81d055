//! DataTable Storage - Record Store, Schema Registry and Dependency Tracker
//!
//! Defines the storage abstraction for extracted records and dependency
//! edges, with an in-memory implementation and an LMDB implementation.

pub mod lmdb;
mod memory;
mod registry;
mod scan;

pub use lmdb::{apply_schema_updates, LmdbStore, LmdbStoreError, SCHEMA_VERSION};
pub use memory::MemoryStore;
pub use registry::SchemaRegistry;

use std::collections::{BTreeMap, BTreeSet};

use datatable_core::{
    DataResult, PageId, QueryDescriptor, Record, RecordQuery, ScanWindow, StorageError,
    TableInfo, TableName, ViewRow,
};
use serde::{Deserialize, Serialize};

/// New rows of one page, grouped by table.
pub type PageRows = BTreeMap<TableName, Vec<Vec<String>>>;

/// Outcome of a schema update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SchemaUpdate {
    /// Fresh store, layout written at the current version.
    Created { version: u32 },
    /// Older layout migrated.
    Upgraded { from: u32, to: u32 },
    /// Nothing to do.
    Current { version: u32 },
}

// ============================================================================
// STORAGE TRAITS
// ============================================================================

/// Persistence of records keyed by (table, source page, sequence).
///
/// Every write that touches a page is atomic: readers see either the old
/// or the new full row set of that page, never a mix.
pub trait RecordStore: Send + Sync {
    // === Schema Registry ===

    /// Register a table. Returns true if it was not registered before.
    fn register_if_absent(&self, table: &TableName) -> DataResult<bool>;

    /// Whether the table has ever been registered.
    fn table_exists(&self, table: &TableName) -> DataResult<bool>;

    /// All registered tables.
    fn tables(&self) -> DataResult<Vec<TableInfo>>;

    // === Records ===

    /// Replace all rows of `page` in `table`, registering the table if
    /// needed. Sequences follow input order starting at 1. Returns the
    /// number of rows written.
    fn replace_page_records(
        &self,
        table: &TableName,
        page: &PageId,
        rows: &[Vec<String>],
    ) -> DataResult<usize>;

    /// Replace all rows of `page` across tables in one unit: tables in
    /// `rows` get the new rows, tables the page owned rows in but that are
    /// absent from `rows` lose them. Returns every table touched.
    fn replace_page(&self, page: &PageId, rows: &PageRows) -> DataResult<BTreeSet<TableName>>;

    /// Delete the rows of `page`, in every table or in one. Returns the
    /// number of rows removed.
    fn delete_page_records(&self, page: &PageId, table: Option<&TableName>) -> DataResult<usize>;

    /// Tables in which `page` currently owns rows.
    fn tables_for_page(&self, page: &PageId) -> DataResult<BTreeSet<TableName>>;

    /// Filtered, ordered records of a table. `None` means the table was
    /// never registered, as opposed to registered but empty.
    fn select(&self, table: &TableName, query: &RecordQuery) -> DataResult<Option<Vec<Record>>>;

    /// Select with textual filter and order fragments resolved by
    /// `registry`. A missing table wins over a malformed fragment.
    fn select_fragments(
        &self,
        table: &TableName,
        registry: &SchemaRegistry,
        filter: Option<&str>,
        order: Option<&str>,
    ) -> DataResult<Option<Vec<Record>>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let query = registry.query_for(table, filter, order)?;
        self.select(table, &query)
    }

    /// Rows of a browsing view inside `window`, in scan order, at most
    /// `window.limit` of them.
    fn scan(&self, descriptor: &QueryDescriptor, window: &ScanWindow) -> DataResult<Vec<ViewRow>>;

    /// Create or upgrade the physical layout. Idempotent.
    fn apply_schema_updates(&self) -> DataResult<SchemaUpdate> {
        Ok(SchemaUpdate::Current {
            version: SCHEMA_VERSION,
        })
    }
}

/// Edges `(consumer page, table)` recorded while rendering.
pub trait DependencyTracker: Send + Sync {
    /// Add an edge. Returns true if it was not present.
    fn record_dependency(&self, consumer: &PageId, table: &TableName) -> DataResult<bool>;

    /// Drop every edge of a consumer. Returns the number removed.
    fn reset_dependencies(&self, consumer: &PageId) -> DataResult<usize>;

    /// Consumers whose renders read `table`.
    fn dependents_of(&self, table: &TableName) -> DataResult<BTreeSet<PageId>>;

    /// Tables a consumer's render read.
    fn dependencies_of(&self, consumer: &PageId) -> DataResult<BTreeSet<TableName>>;
}

/// A complete backend.
pub trait DataStore: RecordStore + DependencyTracker {}

impl<T: RecordStore + DependencyTracker> DataStore for T {}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Pad a row to `slots` fields; rows wider than `slots` are rejected.
pub(crate) fn normalize_row(
    table: &TableName,
    index: usize,
    row: &[String],
    slots: usize,
) -> Result<Vec<String>, StorageError> {
    if row.len() > slots {
        return Err(StorageError::InsertFailed {
            table: table.to_string(),
            reason: format!(
                "row {} has {} fields but only {} data slots exist",
                index + 1,
                row.len(),
                slots
            ),
        });
    }
    let mut fields = row.to_vec();
    fields.resize(slots, String::new());
    Ok(fields)
}

pub(crate) fn sequence_of(table: &TableName, index: usize) -> Result<u32, StorageError> {
    u32::try_from(index + 1).map_err(|_| StorageError::InsertFailed {
        table: table.to_string(),
        reason: "too many rows for one page".to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
