//! Host hooks: edit completion, page deletion, render and schema updates.
//!
//! [`DataTableHost`] owns the configuration, the schema registry, the
//! extractor and the store, and is the only place where the hooks are
//! sequenced.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use datatable_core::{
    DataError, DataResult, DataTableConfig, ExtractError, PageId, StorageError, TableName, NS_MAIN,
};
use datatable_extract::Extractor;
use datatable_storage::{DataStore, LmdbStore, MemoryStore, SchemaRegistry, SchemaUpdate};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::facade::{QueryFacade, RenderContext};
use crate::render::{error_text, render_selection};
use crate::script::{script_select, ScriptValue};

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of processing a saved page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOutcome {
    /// Tables whose rows for the page were written or removed.
    pub tables: BTreeSet<TableName>,
    /// Rows written.
    pub records: usize,
    /// Directives skipped as invalid, one message each.
    pub skipped: Vec<String>,
    /// Consumer pages whose renders read a touched table.
    pub invalidated: BTreeSet<PageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub removed: usize,
    pub invalidated: BTreeSet<PageId>,
}

/// Output of one select directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSelect {
    pub line: usize,
    pub column: usize,
    pub table: Option<TableName>,
    pub wikitext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutcome {
    /// Page content with each select directive replaced by its output.
    pub content: String,
    pub selects: Vec<RenderedSelect>,
    /// Tables the render read.
    pub dependencies: BTreeSet<TableName>,
}

// ============================================================================
// HOST
// ============================================================================

pub struct DataTableHost {
    config: DataTableConfig,
    registry: SchemaRegistry,
    extractor: Extractor,
    store: Arc<dyn DataStore>,
    /// Expensive calls spent per consumer since its last render.
    expensive_spent: Mutex<BTreeMap<PageId, u32>>,
}

impl DataTableHost {
    pub fn new(config: DataTableConfig, store: Arc<dyn DataStore>) -> DataResult<Self> {
        config.validate()?;
        let registry = SchemaRegistry::from_config(&config)?;
        let extractor = Extractor::from_config(&config);
        Ok(Self {
            config,
            registry,
            extractor,
            store,
            expensive_spent: Mutex::new(BTreeMap::new()),
        })
    }

    /// Open the configured store: LMDB when a storage path is set,
    /// in-memory otherwise.
    pub fn open(config: DataTableConfig) -> DataResult<Self> {
        let store: Arc<dyn DataStore> = match &config.storage.path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Opening LMDB store");
                Arc::new(LmdbStore::open(
                    path,
                    config.storage.map_size_mb,
                    config.data_slots,
                )?)
            }
            None => {
                tracing::info!("No storage path configured, using in-memory store");
                Arc::new(MemoryStore::new(config.data_slots))
            }
        };
        Self::new(config, store)
    }

    pub fn config(&self) -> &DataTableConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn facade(&self) -> QueryFacade<'_> {
        QueryFacade::new(self.store.as_ref(), &self.registry)
    }

    /// Parse a host-supplied page title.
    pub fn page(&self, title: &str) -> HostResult<PageId> {
        self.registry
            .rules()
            .parse(title, NS_MAIN)
            .map_err(|reason| HostError::InvalidPage {
                title: title.to_string(),
                reason,
            })
    }

    /// Schema-evolution hook.
    pub fn apply_schema_updates(&self) -> HostResult<SchemaUpdate> {
        let update = self.store.apply_schema_updates()?;
        tracing::info!(?update, "Applied schema updates");
        Ok(update)
    }

    // Counters stay valid if a holder panicked.
    fn spent(&self) -> MutexGuard<'_, BTreeMap<PageId, u32>> {
        self.expensive_spent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dependents_of_all<'t>(
        &self,
        tables: impl IntoIterator<Item = &'t TableName>,
    ) -> HostResult<BTreeSet<PageId>> {
        let mut pages = BTreeSet::new();
        for table in tables {
            pages.extend(self.store.dependents_of(table)?);
        }
        Ok(pages)
    }

    /// Edit-completion hook: extract the page's rows and replace what the
    /// page stored before. Bad directives are skipped; a storage failure
    /// aborts with the previous rows intact.
    pub fn on_edit_complete(&self, page: &PageId, content: &str) -> HostResult<EditOutcome> {
        let extraction = self.extractor.extract_page(content);
        if !extraction.skipped.is_empty() {
            tracing::warn!(
                page = %page,
                skipped = extraction.skipped.len(),
                "Some directives were skipped"
            );
        }

        let tables = self
            .store
            .replace_page(page, &extraction.tables)
            .inspect_err(|e| tracing::error!(page = %page, error = %e, "Failed to store page records"))?;
        let invalidated = self.dependents_of_all(&tables)?;
        let records = extraction.record_count();

        tracing::info!(
            page = %page,
            tables = tables.len(),
            records,
            invalidated = invalidated.len(),
            "Stored page records"
        );
        Ok(EditOutcome {
            tables,
            records,
            skipped: extraction.skipped,
            invalidated,
        })
    }

    /// Delete hook: drop the page's rows and its own dependency edges.
    pub fn on_page_delete(&self, page: &PageId) -> HostResult<DeleteOutcome> {
        let tables = self.store.tables_for_page(page)?;
        let removed = self
            .store
            .delete_page_records(page, None)
            .inspect_err(|e| tracing::error!(page = %page, error = %e, "Failed to delete page records"))?;
        self.store.reset_dependencies(page)?;
        self.spent().remove(page);
        let invalidated = self.dependents_of_all(&tables)?;

        tracing::info!(page = %page, removed, invalidated = invalidated.len(), "Deleted page records");
        Ok(DeleteOutcome {
            removed,
            invalidated,
        })
    }

    /// Render hook: reset the page's edges, then evaluate every select
    /// directive in order. A bad directive renders an error message in
    /// place; storage failures abort the render.
    pub fn render(&self, page: &PageId, content: &str) -> HostResult<RenderOutcome> {
        self.store.reset_dependencies(page)?;
        self.spent().remove(page);
        let ctx = RenderContext::new(page.clone(), self.config.expensive_limit);
        let facade = self.facade();

        let mut rendered = String::with_capacity(content.len());
        let mut copied = 0;
        let mut selects = Vec::new();
        let mut dependencies = BTreeSet::new();

        for item in self.extractor.selects(content) {
            let directive = match item {
                Ok(directive) => directive,
                Err(e) => {
                    tracing::warn!(page = %page, error = %e, "Skipping select directive");
                    let (line, column) = match &e {
                        ExtractError::MalformedDirective { line, column, .. } => (*line, *column),
                        _ => (0, 0),
                    };
                    selects.push(RenderedSelect {
                        line,
                        column,
                        table: None,
                        wikitext: error_text(&e.to_string()),
                    });
                    continue;
                }
            };

            dependencies.insert(directive.table.clone());
            let wikitext = match facade.select(
                &ctx,
                &directive.table,
                directive.filter.as_deref(),
                directive.order.as_deref(),
            ) {
                Ok(records) => render_selection(
                    &directive.table,
                    self.registry.columns_for(&directive.table),
                    records.as_deref(),
                    self.registry.rules(),
                    &self.config.data_classes,
                ),
                Err(HostError::Data(e)) if !is_fatal(&e) => error_text(&e.to_string()),
                Err(e) => return Err(e),
            };

            let span = directive.span;
            if span.start >= copied {
                rendered.push_str(&content[copied..span.start]);
                rendered.push_str(&wikitext);
                copied = span.end;
            }
            selects.push(RenderedSelect {
                line: span.line,
                column: span.column,
                table: Some(directive.table),
                wikitext,
            });
        }
        rendered.push_str(&content[copied..]);

        tracing::debug!(page = %page, selects = selects.len(), tables = dependencies.len(), "Rendered page");
        Ok(RenderOutcome {
            content: rendered,
            selects,
            dependencies,
        })
    }

    /// Scripting hook. Every call is charged to the consumer page's
    /// expensive budget, which only a new render of that page resets.
    pub fn script_select(
        &self,
        page: &PageId,
        table: &str,
        filter: Option<&str>,
        order: Option<&str>,
    ) -> HostResult<ScriptValue> {
        let mut spent = self.spent();
        let used = spent.get(page).copied().unwrap_or(0);
        let mut ctx = RenderContext::resume(page.clone(), used, self.config.expensive_limit);
        let result = script_select(&self.facade(), &mut ctx, table, filter, order);
        spent.insert(page.clone(), ctx.expensive_count());
        result
    }
}

/// Query errors are the author's; anything else from storage is not.
fn is_fatal(err: &DataError) -> bool {
    !matches!(err, DataError::Storage(StorageError::InvalidQuery { .. }))
}
