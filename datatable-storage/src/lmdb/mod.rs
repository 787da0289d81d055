//! LMDB-backed record store and dependency tracker.
//!
//! Uses the heed crate (Rust bindings for LMDB). Every mutating operation
//! runs in one write transaction; an error returns before `commit`, which
//! drops the transaction and aborts every change it made.
//!
//! # Databases
//!
//! - `meta`: schema version
//! - `tables`: table key -> JSON [`TableInfo`]
//! - `records`: (table, page, sequence) -> JSON field array
//! - `data_index`: (table, first field, page, sequence), the Data view order
//! - `page_counts`: (table, title, namespace) -> record count, the Pages
//!   and Tables view order
//! - `page_tables`: (page, table) for pages that own rows
//! - `deps` / `deps_by_table`: dependency edges in both directions

mod keys;
mod schema;

pub use schema::{apply_schema_updates, SCHEMA_VERSION};

use std::collections::BTreeSet;
use std::ops::Bound;
use std::path::Path;

use chrono::Utc;
use datatable_core::{
    DataError, DataResult, PageId, PageSummary, QueryDescriptor, Record, RecordQuery, ScanWindow,
    StorageError, TableInfo, TableName, TableSummary, ViewRow,
};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::scan::ViewBuilder;
use crate::{normalize_row, sequence_of, DependencyTracker, PageRows, RecordStore, SchemaUpdate};

const MAX_DBS: u32 = 8;
const EMPTY: &[u8] = &[];

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored key or value could not be decoded.
    #[error("Corrupt entry in {database}: {reason}")]
    Corrupt { database: &'static str, reason: String },

    /// The on-disk layout is newer than this build.
    #[error("Schema version {found} is newer than this build supports")]
    SchemaVersion { found: u32 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to DataError.
impl From<LmdbStoreError> for DataError {
    fn from(e: LmdbStoreError) -> Self {
        let storage = match e {
            LmdbStoreError::Corrupt { database, reason } => StorageError::Corrupt {
                database: database.to_string(),
                reason,
            },
            LmdbStoreError::SchemaVersion { found } => StorageError::SchemaVersion {
                found,
                supported: SCHEMA_VERSION,
            },
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        };
        DataError::Storage(storage)
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

type Entries<'t> = Box<dyn Iterator<Item = heed::Result<(&'t [u8], &'t [u8])>> + 't>;

/// Entries of `db` from `lower` (inclusive) to `upper` (exclusive), in
/// scan direction.
fn ordered_range<'t>(
    db: &Database<Bytes, Bytes>,
    txn: &'t RoTxn<'_>,
    lower: &[u8],
    upper: &[u8],
    ascending: bool,
) -> Result<Entries<'t>, LmdbStoreError> {
    if lower >= upper {
        return Ok(Box::new(std::iter::empty()));
    }
    let bounds = (Bound::Included(lower), Bound::Excluded(upper));
    Ok(if ascending {
        Box::new(db.range(txn, &bounds).map_err(txn_err)?)
    } else {
        Box::new(db.rev_range(txn, &bounds).map_err(txn_err)?)
    })
}

fn decode_count(value: &[u8]) -> Result<u64, LmdbStoreError> {
    let raw: [u8; 8] = value
        .try_into()
        .map_err(|_| corrupt("page_counts", format!("count has {} bytes", value.len())))?;
    Ok(u64::from_be_bytes(raw))
}

fn corrupt(database: &'static str, reason: impl Into<String>) -> LmdbStoreError {
    LmdbStoreError::Corrupt {
        database,
        reason: reason.into(),
    }
}

/// LMDB-backed [`RecordStore`] and [`DependencyTracker`].
///
/// # Example
///
/// ```ignore
/// use datatable_storage::{LmdbStore, RecordStore};
///
/// let store = LmdbStore::open("/var/lib/datatable", 256, 10)?;
/// store.apply_schema_updates()?;
/// store.replace_page_records(&table, &page, &rows)?;
/// ```
#[derive(Clone)]
pub struct LmdbStore {
    env: Env,
    slots: usize,
    meta: Database<Bytes, Bytes>,
    tables: Database<Bytes, Bytes>,
    records: Database<Bytes, Bytes>,
    data_index: Database<Bytes, Bytes>,
    page_counts: Database<Bytes, Bytes>,
    page_tables: Database<Bytes, Bytes>,
    deps: Database<Bytes, Bytes>,
    deps_by_table: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the database in megabytes
    /// * `slots` - Number of data slots per record
    ///
    /// # Errors
    ///
    /// Fails if the directory or environment cannot be created, or if the
    /// stored layout is newer than [`SCHEMA_VERSION`].
    pub fn open<P: AsRef<Path>>(
        path: P,
        map_size_mb: usize,
        slots: usize,
    ) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(MAX_DBS)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let mut create = |name: &str| {
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some(name))
                .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))
        };
        let meta = create("meta")?;
        let tables = create("tables")?;
        let records = create("records")?;
        let data_index = create("data_index")?;
        let page_counts = create("page_counts")?;
        let page_tables = create("page_tables")?;
        let deps = create("deps")?;
        let deps_by_table = create("deps_by_table")?;
        wtxn.commit().map_err(txn_err)?;

        let store = Self {
            env,
            slots,
            meta,
            tables,
            records,
            data_index,
            page_counts,
            page_tables,
            deps,
            deps_by_table,
        };

        if let Some(found) = store.stored_version()? {
            if found > SCHEMA_VERSION {
                return Err(LmdbStoreError::SchemaVersion { found });
            }
        }

        tracing::info!(path = %path.as_ref().display(), map_size_mb, "Opened LMDB store");
        Ok(store)
    }

    fn read_txn(&self) -> Result<RoTxn<'_>, LmdbStoreError> {
        self.env.read_txn().map_err(txn_err)
    }

    fn write_txn(&self) -> Result<RwTxn<'_>, LmdbStoreError> {
        self.env.write_txn().map_err(txn_err)
    }

    fn prefix_keys(
        &self,
        txn: &RoTxn<'_>,
        db: Database<Bytes, Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, LmdbStoreError> {
        let mut keys = Vec::new();
        for entry in db.prefix_iter(txn, prefix).map_err(txn_err)? {
            let (key, _) = entry.map_err(txn_err)?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn register_in(&self, wtxn: &mut RwTxn<'_>, table: &TableName) -> Result<bool, LmdbStoreError> {
        let key = table.key().as_bytes();
        if self.tables.get(wtxn, key).map_err(txn_err)?.is_some() {
            return Ok(false);
        }
        let info = TableInfo {
            name: table.clone(),
            registered_at: Utc::now(),
        };
        let value =
            serde_json::to_vec(&info).map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
        self.tables.put(wtxn, key, &value).map_err(txn_err)?;
        Ok(true)
    }

    fn owned_tables_in(
        &self,
        txn: &RoTxn<'_>,
        page: &PageId,
    ) -> Result<BTreeSet<TableName>, LmdbStoreError> {
        self.prefix_keys(txn, self.page_tables, &keys::page_prefix(page))?
            .iter()
            .map(|key| {
                keys::decode_page_table_key(key)
                    .map(|(_, table)| table)
                    .ok_or_else(|| corrupt("page_tables", "undecodable key"))
            })
            .collect()
    }

    fn remove_rows_in(
        &self,
        wtxn: &mut RwTxn<'_>,
        table: &TableName,
        page: &PageId,
    ) -> Result<usize, LmdbStoreError> {
        let mut stale = Vec::new();
        for entry in self
            .records
            .prefix_iter(wtxn, &keys::record_page_prefix(table, page))
            .map_err(txn_err)?
        {
            let (key, value) = entry.map_err(txn_err)?;
            stale.push((key.to_vec(), Self::decode_record(key, value)?));
        }
        for (key, record) in &stale {
            self.records.delete(wtxn, key).map_err(txn_err)?;
            self.data_index
                .delete(
                    wtxn,
                    &keys::data_index_key(table, record.field(1), page, record.sequence),
                )
                .map_err(txn_err)?;
        }
        self.page_counts
            .delete(wtxn, &keys::page_count_key(table, page))
            .map_err(txn_err)?;
        self.page_tables
            .delete(wtxn, &keys::page_table_key(page, table))
            .map_err(txn_err)?;
        Ok(stale.len())
    }

    /// Register, clear and rewrite one (table, page) inside `wtxn`. A row
    /// failing validation returns early with the earlier rows written, so
    /// the caller must not commit.
    fn write_rows_in(
        &self,
        wtxn: &mut RwTxn<'_>,
        table: &TableName,
        page: &PageId,
        rows: &[Vec<String>],
    ) -> DataResult<usize> {
        self.register_in(wtxn, table)?;
        self.remove_rows_in(wtxn, table, page)?;
        for (i, row) in rows.iter().enumerate() {
            let sequence = sequence_of(table, i)?;
            let fields = normalize_row(table, i, row, self.slots)?;
            let value = serde_json::to_vec(&fields)
                .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
            self.records
                .put(wtxn, &keys::record_key(table, page, sequence), &value)
                .map_err(txn_err)?;
            let first = fields.first().map(String::as_str).unwrap_or_default();
            self.data_index
                .put(wtxn, &keys::data_index_key(table, first, page, sequence), EMPTY)
                .map_err(txn_err)?;
        }
        if !rows.is_empty() {
            let count = rows.len() as u64;
            self.page_counts
                .put(wtxn, &keys::page_count_key(table, page), &count.to_be_bytes())
                .map_err(txn_err)?;
            self.page_tables
                .put(wtxn, &keys::page_table_key(page, table), EMPTY)
                .map_err(txn_err)?;
        }
        Ok(rows.len())
    }

    fn decode_record(key: &[u8], value: &[u8]) -> Result<Record, LmdbStoreError> {
        let (table, page, sequence) =
            keys::decode_record_key(key).ok_or_else(|| corrupt("records", "undecodable key"))?;
        let fields: Vec<String> =
            serde_json::from_slice(value).map_err(|e| corrupt("records", e.to_string()))?;
        Ok(Record {
            table,
            page,
            sequence,
            fields,
        })
    }

    /// Tables view: page counts grouped by table, in table key order.
    fn scan_tables(&self, txn: &RoTxn<'_>, window: &ScanWindow) -> Result<Vec<ViewRow>, LmdbStoreError> {
        let everything = [0xFF];
        let (lower, upper) = match (window.start_value(), window.is_ascending()) {
            (Some(v), true) => (v.as_bytes().to_vec(), everything.to_vec()),
            (Some(v), false) => (Vec::new(), keys::prefix_end(&keys::text_prefix(v))),
            (None, _) => (Vec::new(), everything.to_vec()),
        };

        let mut rows = Vec::new();
        let mut current: Option<TableSummary> = None;
        let emit = |summary: TableSummary, rows: &mut Vec<ViewRow>| {
            let row = ViewRow::Table(summary);
            if window.admits(&row) {
                rows.push(row);
            }
        };
        for entry in ordered_range(&self.page_counts, txn, &lower, &upper, window.is_ascending())? {
            let (key, value) = entry.map_err(txn_err)?;
            let (table, _) = keys::decode_page_count_key(key)
                .ok_or_else(|| corrupt("page_counts", "undecodable key"))?;
            let records = decode_count(value)?;
            if let Some(summary) = current.as_mut().filter(|s| s.table == table) {
                summary.pages += 1;
                summary.records += records;
                continue;
            }
            if let Some(done) = current.take() {
                emit(done, &mut rows);
                if rows.len() >= window.limit {
                    return Ok(rows);
                }
            }
            current = Some(TableSummary {
                table,
                pages: 1,
                records,
            });
        }
        if let Some(done) = current {
            emit(done, &mut rows);
        }
        Ok(rows)
    }

    /// Pages view of one table, in title order.
    fn scan_pages(
        &self,
        txn: &RoTxn<'_>,
        table: &TableName,
        window: &ScanWindow,
    ) -> Result<Vec<ViewRow>, LmdbStoreError> {
        let prefix = keys::table_prefix(table);
        let (lower, upper) = match (window.start_value(), window.is_ascending()) {
            (Some(v), true) => {
                let mut lower = prefix.clone();
                lower.extend_from_slice(v.as_bytes());
                (lower, keys::prefix_end(&prefix))
            }
            (Some(v), false) => (prefix.clone(), keys::prefix_end(&keys::title_prefix(table, v))),
            (None, _) => (prefix.clone(), keys::prefix_end(&prefix)),
        };

        let mut rows = Vec::new();
        for entry in ordered_range(&self.page_counts, txn, &lower, &upper, window.is_ascending())? {
            let (key, value) = entry.map_err(txn_err)?;
            let (_, page) = keys::decode_page_count_key(key)
                .ok_or_else(|| corrupt("page_counts", "undecodable key"))?;
            let row = ViewRow::Page(PageSummary {
                page,
                records: decode_count(value)?,
            });
            if window.admits(&row) {
                rows.push(row);
                if rows.len() >= window.limit {
                    break;
                }
            }
        }
        Ok(rows)
    }

    /// Data view of a whole table, in first-field order. `data_from` is a
    /// floor on the first field in both directions.
    fn scan_data(
        &self,
        txn: &RoTxn<'_>,
        table: &TableName,
        data_from: Option<&str>,
        window: &ScanWindow,
    ) -> Result<Vec<ViewRow>, LmdbStoreError> {
        let prefix = keys::table_prefix(table);
        let floor = data_from.map(|v| keys::data_value_prefix(table, v));
        let (lower, upper) = if window.is_ascending() {
            let start = match (window.start_value(), data_from) {
                (Some(v), Some(f)) => Some(v.max(f)),
                (v, f) => v.or(f),
            };
            let lower = start.map_or_else(|| prefix.clone(), |v| keys::data_value_prefix(table, v));
            (lower, keys::prefix_end(&prefix))
        } else {
            let upper = window.start_value().map_or_else(
                || keys::prefix_end(&prefix),
                |v| keys::prefix_end(&keys::data_value_prefix(table, v)),
            );
            (floor.unwrap_or_else(|| prefix.clone()), upper)
        };

        let mut rows = Vec::new();
        for entry in ordered_range(&self.data_index, txn, &lower, &upper, window.is_ascending())? {
            let (key, _) = entry.map_err(txn_err)?;
            let (_, _, page, sequence) = keys::decode_data_index_key(key)
                .ok_or_else(|| corrupt("data_index", "undecodable key"))?;
            let record_key = keys::record_key(table, &page, sequence);
            let value = self
                .records
                .get(txn, &record_key)
                .map_err(txn_err)?
                .ok_or_else(|| corrupt("data_index", "entry without a record"))?;
            let row = ViewRow::Data(Self::decode_record(&record_key, value)?);
            if window.admits(&row) {
                rows.push(row);
                if rows.len() >= window.limit {
                    break;
                }
            }
        }
        Ok(rows)
    }

    fn stored_version(&self) -> Result<Option<u32>, LmdbStoreError> {
        let rtxn = self.read_txn()?;
        schema::read_version(self, &rtxn)
    }
}

impl RecordStore for LmdbStore {
    fn register_if_absent(&self, table: &TableName) -> DataResult<bool> {
        let mut wtxn = self.write_txn()?;
        let added = self.register_in(&mut wtxn, table)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(added)
    }

    fn table_exists(&self, table: &TableName) -> DataResult<bool> {
        let rtxn = self.read_txn()?;
        let found = self
            .tables
            .get(&rtxn, table.key().as_bytes())
            .map_err(txn_err)?;
        Ok(found.is_some())
    }

    fn tables(&self) -> DataResult<Vec<TableInfo>> {
        let rtxn = self.read_txn()?;
        let mut tables = Vec::new();
        for entry in self.tables.iter(&rtxn).map_err(txn_err)? {
            let (_, value) = entry.map_err(txn_err)?;
            let info: TableInfo =
                serde_json::from_slice(value).map_err(|e| corrupt("tables", e.to_string()))?;
            tables.push(info);
        }
        Ok(tables)
    }

    fn replace_page_records(
        &self,
        table: &TableName,
        page: &PageId,
        rows: &[Vec<String>],
    ) -> DataResult<usize> {
        let mut wtxn = self.write_txn()?;
        let written = self.write_rows_in(&mut wtxn, table, page, rows).inspect_err(|e| {
            tracing::error!(table = %table, page = %page, error = %e, "Replacing page records failed");
        })?;
        wtxn.commit().map_err(txn_err)?;
        tracing::debug!(table = %table, page = %page, rows = written, "Replaced page records");
        Ok(written)
    }

    fn replace_page(&self, page: &PageId, rows: &PageRows) -> DataResult<BTreeSet<TableName>> {
        let mut wtxn = self.write_txn()?;
        let mut touched = BTreeSet::new();
        for table in self.owned_tables_in(&wtxn, page)? {
            if !rows.contains_key(&table) {
                self.remove_rows_in(&mut wtxn, &table, page)?;
                touched.insert(table);
            }
        }
        for (table, table_rows) in rows {
            self.write_rows_in(&mut wtxn, table, page, table_rows)?;
            touched.insert(table.clone());
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(touched)
    }

    fn delete_page_records(&self, page: &PageId, table: Option<&TableName>) -> DataResult<usize> {
        let mut wtxn = self.write_txn()?;
        let tables = match table {
            Some(t) => BTreeSet::from([t.clone()]),
            None => self.owned_tables_in(&wtxn, page)?,
        };
        let mut removed = 0;
        for t in &tables {
            removed += self.remove_rows_in(&mut wtxn, t, page)?;
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(removed)
    }

    fn tables_for_page(&self, page: &PageId) -> DataResult<BTreeSet<TableName>> {
        let rtxn = self.read_txn()?;
        Ok(self.owned_tables_in(&rtxn, page)?)
    }

    fn select(&self, table: &TableName, query: &RecordQuery) -> DataResult<Option<Vec<Record>>> {
        let rtxn = self.read_txn()?;
        if self
            .tables
            .get(&rtxn, table.key().as_bytes())
            .map_err(txn_err)?
            .is_none()
        {
            return Ok(None);
        }

        let mut records = Vec::new();
        let prefix = keys::table_prefix(table);
        for entry in self.records.prefix_iter(&rtxn, &prefix).map_err(txn_err)? {
            let (key, value) = entry.map_err(txn_err)?;
            let record = Self::decode_record(key, value)?;
            if query.matches(&record) {
                records.push(record);
            }
        }
        query.sort(&mut records);
        Ok(Some(records))
    }

    fn scan(&self, descriptor: &QueryDescriptor, window: &ScanWindow) -> DataResult<Vec<ViewRow>> {
        if window.limit == 0 {
            return Ok(Vec::new());
        }
        let rtxn = self.read_txn()?;
        let rows = match descriptor {
            QueryDescriptor::Tables => self.scan_tables(&rtxn, window)?,
            QueryDescriptor::Pages { table: None } => Vec::new(),
            QueryDescriptor::Pages { table: Some(table) } => self.scan_pages(&rtxn, table, window)?,
            QueryDescriptor::Data {
                table,
                page: None,
                data_from,
            } => self.scan_data(&rtxn, table, data_from.as_deref(), window)?,
            QueryDescriptor::Data {
                table,
                page: Some(page),
                ..
            } => {
                // One page's rows: read them all and order in memory.
                let mut builder = ViewBuilder::new(descriptor);
                let prefix = keys::record_page_prefix(table, page);
                for entry in self.records.prefix_iter(&rtxn, &prefix).map_err(txn_err)? {
                    let (key, value) = entry.map_err(txn_err)?;
                    builder.push(Self::decode_record(key, value)?);
                }
                window.apply(builder.finish())
            }
        };
        tracing::trace!(view = descriptor.index_field(), rows = rows.len(), "Scanned view window");
        Ok(rows)
    }

    fn apply_schema_updates(&self) -> DataResult<SchemaUpdate> {
        apply_schema_updates(self)
    }
}

impl DependencyTracker for LmdbStore {
    fn record_dependency(&self, consumer: &PageId, table: &TableName) -> DataResult<bool> {
        let mut wtxn = self.write_txn()?;
        let key = keys::page_table_key(consumer, table);
        let existed = self.deps.get(&wtxn, &key).map_err(txn_err)?.is_some();
        if !existed {
            self.deps.put(&mut wtxn, &key, EMPTY).map_err(txn_err)?;
            self.deps_by_table
                .put(&mut wtxn, &keys::table_page_key(table, consumer), EMPTY)
                .map_err(txn_err)?;
            wtxn.commit().map_err(txn_err)?;
        }
        Ok(!existed)
    }

    fn reset_dependencies(&self, consumer: &PageId) -> DataResult<usize> {
        let mut wtxn = self.write_txn()?;
        let edges = self.prefix_keys(&wtxn, self.deps, &keys::page_prefix(consumer))?;
        for key in &edges {
            let (_, table) = keys::decode_page_table_key(key)
                .ok_or_else(|| corrupt("deps", "undecodable key"))?;
            self.deps.delete(&mut wtxn, key).map_err(txn_err)?;
            self.deps_by_table
                .delete(&mut wtxn, &keys::table_page_key(&table, consumer))
                .map_err(txn_err)?;
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(edges.len())
    }

    fn dependents_of(&self, table: &TableName) -> DataResult<BTreeSet<PageId>> {
        let rtxn = self.read_txn()?;
        let mut consumers = BTreeSet::new();
        for key in self.prefix_keys(&rtxn, self.deps_by_table, &keys::table_prefix(table))? {
            let (_, page) = keys::decode_table_page_key(&key)
                .ok_or_else(|| corrupt("deps_by_table", "undecodable key"))?;
            consumers.insert(page);
        }
        Ok(consumers)
    }

    fn dependencies_of(&self, consumer: &PageId) -> DataResult<BTreeSet<TableName>> {
        let rtxn = self.read_txn()?;
        let mut tables = BTreeSet::new();
        for key in self.prefix_keys(&rtxn, self.deps, &keys::page_prefix(consumer))? {
            let (_, table) = keys::decode_page_table_key(&key)
                .ok_or_else(|| corrupt("deps", "undecodable key"))?;
            tables.insert(table);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_reopen_keeps_records_and_edges() {
        let dir = TempDir::new().unwrap();
        let table = TableName::from_key("Employees");
        let page = PageId::new(0, "Roster");
        let consumer = PageId::new(0, "Report");
        {
            let store = LmdbStore::open(dir.path(), 16, 3).unwrap();
            store.apply_schema_updates().unwrap();
            store
                .replace_page_records(&table, &page, &[row(&["Alice"]), row(&["Bob"])])
                .unwrap();
            store.record_dependency(&consumer, &table).unwrap();
        }

        let store = LmdbStore::open(dir.path(), 16, 3).unwrap();
        let records = store.select(&table, &RecordQuery::all()).unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].fields, row(&["Bob", "", ""]));
        assert!(store.dependents_of(&table).unwrap().contains(&consumer));
    }

    #[test]
    fn test_pages_sharing_a_title_prefix_stay_apart() {
        let dir = TempDir::new().unwrap();
        let store = LmdbStore::open(dir.path(), 16, 1).unwrap();
        let table = TableName::from_key("T");
        store
            .replace_page_records(&table, &PageId::new(0, "Ab"), &[row(&["x"])])
            .unwrap();
        store
            .replace_page_records(&table, &PageId::new(0, "Abc"), &[row(&["y"])])
            .unwrap();
        store.delete_page_records(&PageId::new(0, "Ab"), None).unwrap();

        let records = store.select(&table, &RecordQuery::all()).unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].page.title, "Abc");
    }

    #[test]
    fn test_corrupt_value_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = LmdbStore::open(dir.path(), 16, 1).unwrap();
        let table = TableName::from_key("T");
        let page = PageId::new(0, "P");
        store.replace_page_records(&table, &page, &[row(&["x"])]).unwrap();

        let mut wtxn = store.env.write_txn().unwrap();
        store
            .records
            .put(&mut wtxn, &keys::record_key(&table, &page, 1), b"not json")
            .unwrap();
        wtxn.commit().unwrap();

        let err = store.select(&table, &RecordQuery::all()).unwrap_err();
        assert!(matches!(err, DataError::Storage(StorageError::Corrupt { .. })));
    }
}
