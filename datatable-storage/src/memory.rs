//! In-memory store for tests and single-process hosts without a storage
//! path.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use datatable_core::{
    DataResult, PageId, QueryDescriptor, Record, RecordQuery, ScanWindow, StorageError, TableInfo,
    TableName, ViewRow,
};

use crate::scan::{Scope, ViewBuilder};
use crate::{normalize_row, sequence_of, DependencyTracker, PageRows, RecordStore};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<TableName, TableInfo>,
    /// table -> page -> padded rows in sequence order.
    records: BTreeMap<TableName, BTreeMap<PageId, Vec<Vec<String>>>>,
    deps: BTreeMap<PageId, BTreeSet<TableName>>,
    deps_by_table: BTreeMap<TableName, BTreeSet<PageId>>,
}

impl State {
    fn register(&mut self, table: &TableName) -> bool {
        if self.tables.contains_key(table) {
            return false;
        }
        self.tables.insert(
            table.clone(),
            TableInfo {
                name: table.clone(),
                registered_at: Utc::now(),
            },
        );
        true
    }

    fn remove_rows(&mut self, table: &TableName, page: &PageId) -> usize {
        let Some(pages) = self.records.get_mut(table) else {
            return 0;
        };
        let removed = pages.remove(page).map(|rows| rows.len()).unwrap_or(0);
        if pages.is_empty() {
            self.records.remove(table);
        }
        removed
    }

    fn put_rows(&mut self, table: &TableName, page: &PageId, rows: Vec<Vec<String>>) {
        self.register(table);
        self.remove_rows(table, page);
        if !rows.is_empty() {
            self.records
                .entry(table.clone())
                .or_default()
                .insert(page.clone(), rows);
        }
    }

    fn owned_tables(&self, page: &PageId) -> BTreeSet<TableName> {
        self.records
            .iter()
            .filter(|(_, pages)| pages.contains_key(page))
            .map(|(table, _)| table.clone())
            .collect()
    }
}

/// In-memory [`RecordStore`] and [`DependencyTracker`].
///
/// Writes validate every row before touching state, so a failed write
/// leaves the store unchanged.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    slots: usize,
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create an empty store whose tables have `slots` data slots.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StorageError> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StorageError> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn normalize(&self, table: &TableName, rows: &[Vec<String>]) -> Result<Vec<Vec<String>>, StorageError> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                sequence_of(table, i)?;
                normalize_row(table, i, row, self.slots)
            })
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn register_if_absent(&self, table: &TableName) -> DataResult<bool> {
        Ok(self.write()?.register(table))
    }

    fn table_exists(&self, table: &TableName) -> DataResult<bool> {
        Ok(self.read()?.tables.contains_key(table))
    }

    fn tables(&self) -> DataResult<Vec<TableInfo>> {
        Ok(self.read()?.tables.values().cloned().collect())
    }

    fn replace_page_records(
        &self,
        table: &TableName,
        page: &PageId,
        rows: &[Vec<String>],
    ) -> DataResult<usize> {
        let rows = self.normalize(table, rows)?;
        let written = rows.len();
        self.write()?.put_rows(table, page, rows);
        tracing::debug!(table = %table, page = %page, rows = written, "Replaced page records");
        Ok(written)
    }

    fn replace_page(&self, page: &PageId, rows: &PageRows) -> DataResult<BTreeSet<TableName>> {
        let mut staged = Vec::with_capacity(rows.len());
        for (table, table_rows) in rows {
            staged.push((table, self.normalize(table, table_rows)?));
        }

        let mut state = self.write()?;
        let mut touched: BTreeSet<TableName> = state
            .owned_tables(page)
            .into_iter()
            .filter(|t| !rows.contains_key(t))
            .collect();
        for table in &touched {
            state.remove_rows(table, page);
        }
        for (table, table_rows) in staged {
            state.put_rows(table, page, table_rows);
            touched.insert(table.clone());
        }
        Ok(touched)
    }

    fn delete_page_records(&self, page: &PageId, table: Option<&TableName>) -> DataResult<usize> {
        let mut state = self.write()?;
        let tables = match table {
            Some(t) => BTreeSet::from([t.clone()]),
            None => state.owned_tables(page),
        };
        Ok(tables.iter().map(|t| state.remove_rows(t, page)).sum())
    }

    fn tables_for_page(&self, page: &PageId) -> DataResult<BTreeSet<TableName>> {
        Ok(self.read()?.owned_tables(page))
    }

    fn select(&self, table: &TableName, query: &RecordQuery) -> DataResult<Option<Vec<Record>>> {
        let state = self.read()?;
        if !state.tables.contains_key(table) {
            return Ok(None);
        }
        let mut records: Vec<Record> = state
            .records
            .get(table)
            .into_iter()
            .flat_map(|pages| pages.iter())
            .flat_map(|(page, rows)| {
                rows.iter().enumerate().map(move |(i, fields)| Record {
                    table: table.clone(),
                    page: page.clone(),
                    sequence: i as u32 + 1,
                    fields: fields.clone(),
                })
            })
            .filter(|record| query.matches(record))
            .collect();
        query.sort(&mut records);
        Ok(Some(records))
    }

    fn scan(&self, descriptor: &QueryDescriptor, window: &ScanWindow) -> DataResult<Vec<ViewRow>> {
        let state = self.read()?;
        let mut builder = ViewBuilder::new(descriptor);
        let tables: Vec<(&TableName, &BTreeMap<PageId, Vec<Vec<String>>>)> = match builder.scope() {
            Scope::Nothing => Vec::new(),
            Scope::All => state.records.iter().collect(),
            Scope::Table(t) => state.records.get_key_value(t).into_iter().collect(),
        };

        for (table, pages) in tables {
            for (page, rows) in pages {
                if builder.page().is_some_and(|p| p != page) {
                    continue;
                }
                if !builder.wants_records() {
                    builder.count(table, page, rows.len() as u64);
                    continue;
                }
                for (i, fields) in rows.iter().enumerate() {
                    builder.push(Record {
                        table: table.clone(),
                        page: page.clone(),
                        sequence: i as u32 + 1,
                        fields: fields.clone(),
                    });
                }
            }
        }
        Ok(window.apply(builder.finish()))
    }
}

impl DependencyTracker for MemoryStore {
    fn record_dependency(&self, consumer: &PageId, table: &TableName) -> DataResult<bool> {
        let mut state = self.write()?;
        let added = state
            .deps
            .entry(consumer.clone())
            .or_default()
            .insert(table.clone());
        state
            .deps_by_table
            .entry(table.clone())
            .or_default()
            .insert(consumer.clone());
        Ok(added)
    }

    fn reset_dependencies(&self, consumer: &PageId) -> DataResult<usize> {
        let mut state = self.write()?;
        let tables = state.deps.remove(consumer).unwrap_or_default();
        for table in &tables {
            if let Some(consumers) = state.deps_by_table.get_mut(table) {
                consumers.remove(consumer);
                if consumers.is_empty() {
                    state.deps_by_table.remove(table);
                }
            }
        }
        Ok(tables.len())
    }

    fn dependents_of(&self, table: &TableName) -> DataResult<BTreeSet<PageId>> {
        Ok(self
            .read()?
            .deps_by_table
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    fn dependencies_of(&self, consumer: &PageId) -> DataResult<BTreeSet<TableName>> {
        Ok(self.read()?.deps.get(consumer).cloned().unwrap_or_default())
    }
}
