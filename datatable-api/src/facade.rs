//! Query facade: the one read path used by select directives and the
//! scripting layer. Every select records a dependency edge for the page
//! being rendered, whether or not the table exists.

use datatable_core::{PageId, Record, TableName};
use datatable_storage::{DataStore, SchemaRegistry};

use crate::error::{HostError, HostResult};

/// Per-request render state: the consumer page and its expensive-call
/// budget.
#[derive(Debug, Clone)]
pub struct RenderContext {
    consumer: PageId,
    expensive_count: u32,
    expensive_limit: u32,
}

impl RenderContext {
    pub fn new(consumer: PageId, expensive_limit: u32) -> Self {
        Self::resume(consumer, 0, expensive_limit)
    }

    /// Continue a budget that already spent `expensive_count` calls.
    pub fn resume(consumer: PageId, expensive_count: u32, expensive_limit: u32) -> Self {
        Self {
            consumer,
            expensive_count,
            expensive_limit,
        }
    }

    /// Page whose render issues the selects.
    pub fn consumer(&self) -> &PageId {
        &self.consumer
    }

    pub fn expensive_count(&self) -> u32 {
        self.expensive_count
    }

    /// Count one expensive call. Fails once the limit has been used up.
    pub fn charge_expensive(&mut self) -> HostResult<()> {
        if self.expensive_count >= self.expensive_limit {
            tracing::warn!(
                consumer = %self.consumer,
                limit = self.expensive_limit,
                "Expensive operation limit reached"
            );
            return Err(HostError::ExpensiveLimit {
                limit: self.expensive_limit,
            });
        }
        self.expensive_count += 1;
        Ok(())
    }
}

/// Select plus dependency recording over a [`DataStore`].
#[derive(Clone, Copy)]
pub struct QueryFacade<'a> {
    store: &'a dyn DataStore,
    registry: &'a SchemaRegistry,
}

impl<'a> QueryFacade<'a> {
    pub fn new(store: &'a dyn DataStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    /// Records of `table` matching the fragments, or `None` if the table
    /// was never registered. The edge `(consumer, table)` is recorded even
    /// when the table is missing or the fragments are malformed.
    pub fn select(
        &self,
        ctx: &RenderContext,
        table: &TableName,
        filter: Option<&str>,
        order: Option<&str>,
    ) -> HostResult<Option<Vec<Record>>> {
        let result =
            self.store
                .select_fragments(table, self.registry, filter, order);
        self.store.record_dependency(ctx.consumer(), table)?;

        let records = result.inspect_err(|e| {
            tracing::warn!(table = %table, consumer = %ctx.consumer(), error = %e, "Select failed");
        })?;
        tracing::debug!(
            table = %table,
            consumer = %ctx.consumer(),
            found = records.is_some(),
            rows = records.as_ref().map_or(0, Vec::len),
            "Selected records"
        );
        Ok(records)
    }
}
