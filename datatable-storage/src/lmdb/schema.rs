//! Schema evolution for the LMDB layout.
//!
//! Version 1 stored dependency edges only by consumer. Version 2 adds the
//! `deps_by_table` reverse index so invalidation does not scan every edge.
//! Version 3 adds `data_index` and `page_counts`, the browsing view orders.

use std::collections::BTreeMap;

use datatable_core::DataResult;
use heed::{RoTxn, RwTxn};

use super::{keys, txn_err, LmdbStore, LmdbStoreError, EMPTY};
use crate::SchemaUpdate;

/// Layout version written by this build.
pub const SCHEMA_VERSION: u32 = 3;

const VERSION_KEY: &[u8] = b"schema_version";

pub(super) fn read_version(store: &LmdbStore, txn: &RoTxn<'_>) -> Result<Option<u32>, LmdbStoreError> {
    match store.meta.get(txn, VERSION_KEY).map_err(txn_err)? {
        None => Ok(None),
        Some(bytes) => {
            let raw: [u8; 4] = bytes.try_into().map_err(|_| LmdbStoreError::Corrupt {
                database: "meta",
                reason: format!("schema version has {} bytes", bytes.len()),
            })?;
            Ok(Some(u32::from_be_bytes(raw)))
        }
    }
}

/// Create or upgrade the store layout. Running it again is a no-op.
///
/// A store without a version is new if it holds no data and is treated
/// as version 1 otherwise.
pub fn apply_schema_updates(store: &LmdbStore) -> DataResult<SchemaUpdate> {
    let mut wtxn = store.env.write_txn().map_err(txn_err)?;

    let found = match read_version(store, &wtxn)? {
        Some(version) => version,
        None => {
            let empty = store.records.is_empty(&wtxn).map_err(txn_err)?
                && store.deps.is_empty(&wtxn).map_err(txn_err)?
                && store.tables.is_empty(&wtxn).map_err(txn_err)?;
            if empty {
                write_version(store, &mut wtxn, SCHEMA_VERSION)?;
                wtxn.commit().map_err(txn_err)?;
                tracing::info!(version = SCHEMA_VERSION, "Created store layout");
                return Ok(SchemaUpdate::Created {
                    version: SCHEMA_VERSION,
                });
            }
            1
        }
    };

    if found > SCHEMA_VERSION {
        return Err(LmdbStoreError::SchemaVersion { found }.into());
    }
    if found == SCHEMA_VERSION {
        return Ok(SchemaUpdate::Current { version: found });
    }

    let edges = if found < 2 {
        rebuild_reverse_deps(store, &mut wtxn)?
    } else {
        0
    };
    let indexed = if found < 3 {
        rebuild_view_indexes(store, &mut wtxn)?
    } else {
        0
    };
    write_version(store, &mut wtxn, SCHEMA_VERSION)?;
    wtxn.commit().map_err(txn_err)?;

    tracing::info!(from = found, to = SCHEMA_VERSION, edges, indexed, "Upgraded store layout");
    Ok(SchemaUpdate::Upgraded {
        from: found,
        to: SCHEMA_VERSION,
    })
}

/// 1 -> 2: rebuild the reverse dependency index from the forward edges.
fn rebuild_reverse_deps(store: &LmdbStore, wtxn: &mut RwTxn<'_>) -> Result<usize, LmdbStoreError> {
    store.deps_by_table.clear(wtxn).map_err(txn_err)?;
    let mut edges = Vec::new();
    for entry in store.deps.iter(wtxn).map_err(txn_err)? {
        let (key, _) = entry.map_err(txn_err)?;
        let (consumer, table) =
            keys::decode_page_table_key(key).ok_or_else(|| LmdbStoreError::Corrupt {
                database: "deps",
                reason: "undecodable key".to_string(),
            })?;
        edges.push(keys::table_page_key(&table, &consumer));
    }
    for key in &edges {
        store.deps_by_table.put(wtxn, key, EMPTY).map_err(txn_err)?;
    }
    Ok(edges.len())
}

/// 2 -> 3: rebuild the view indexes from the stored records.
fn rebuild_view_indexes(store: &LmdbStore, wtxn: &mut RwTxn<'_>) -> Result<usize, LmdbStoreError> {
    store.data_index.clear(wtxn).map_err(txn_err)?;
    store.page_counts.clear(wtxn).map_err(txn_err)?;

    let mut index = Vec::new();
    let mut counts: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
    for entry in store.records.iter(wtxn).map_err(txn_err)? {
        let (key, value) = entry.map_err(txn_err)?;
        let record = LmdbStore::decode_record(key, value)?;
        index.push(keys::data_index_key(
            &record.table,
            record.field(1),
            &record.page,
            record.sequence,
        ));
        *counts
            .entry(keys::page_count_key(&record.table, &record.page))
            .or_default() += 1;
    }
    for key in &index {
        store.data_index.put(wtxn, key, EMPTY).map_err(txn_err)?;
    }
    for (key, count) in &counts {
        store
            .page_counts
            .put(wtxn, key, &count.to_be_bytes())
            .map_err(txn_err)?;
    }
    Ok(index.len())
}

fn write_version(
    store: &LmdbStore,
    wtxn: &mut RwTxn<'_>,
    version: u32,
) -> Result<(), LmdbStoreError> {
    store
        .meta
        .put(wtxn, VERSION_KEY, &version.to_be_bytes())
        .map_err(txn_err)
}
