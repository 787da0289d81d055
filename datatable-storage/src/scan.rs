//! Projection of stored records into browsing view rows.
//!
//! Both stores feed their records through [`ViewBuilder`], so the three
//! view shapes are computed the same way regardless of backend.

use std::collections::{BTreeMap, BTreeSet};

use datatable_core::{PageId, PageSummary, QueryDescriptor, Record, TableName, TableSummary, ViewRow};

pub(crate) struct ViewBuilder<'a> {
    descriptor: &'a QueryDescriptor,
    tables: BTreeMap<TableName, (BTreeSet<PageId>, u64)>,
    pages: BTreeMap<PageId, u64>,
    rows: Vec<ViewRow>,
}

impl<'a> ViewBuilder<'a> {
    pub(crate) fn new(descriptor: &'a QueryDescriptor) -> Self {
        Self {
            descriptor,
            tables: BTreeMap::new(),
            pages: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    /// The one table whose records matter, if the view is scoped.
    pub(crate) fn scope(&self) -> Scope<'a> {
        match self.descriptor {
            QueryDescriptor::Tables => Scope::All,
            QueryDescriptor::Pages { table: None } => Scope::Nothing,
            QueryDescriptor::Pages { table: Some(t) } => Scope::Table(t),
            QueryDescriptor::Data { table, .. } => Scope::Table(table),
        }
    }

    /// Page filter of the data view.
    pub(crate) fn page(&self) -> Option<&'a PageId> {
        match self.descriptor {
            QueryDescriptor::Data { page, .. } => page.as_ref(),
            _ => None,
        }
    }

    /// Account for `count` records of `table` owned by `page` without
    /// materializing them. Only meaningful for the aggregate views.
    pub(crate) fn count(&mut self, table: &TableName, page: &PageId, count: u64) {
        if count == 0 {
            return;
        }
        match self.descriptor {
            QueryDescriptor::Tables => {
                let entry = self.tables.entry(table.clone()).or_default();
                entry.0.insert(page.clone());
                entry.1 += count;
            }
            QueryDescriptor::Pages { table: Some(t) } if t == table => {
                *self.pages.entry(page.clone()).or_default() += count;
            }
            _ => {}
        }
    }

    /// Whether the view needs full records rather than counts.
    pub(crate) fn wants_records(&self) -> bool {
        matches!(self.descriptor, QueryDescriptor::Data { .. })
    }

    pub(crate) fn push(&mut self, record: Record) {
        match self.descriptor {
            QueryDescriptor::Data {
                table,
                page,
                data_from,
            } => {
                if &record.table != table {
                    return;
                }
                if page.as_ref().is_some_and(|p| p != &record.page) {
                    return;
                }
                if data_from
                    .as_deref()
                    .is_some_and(|from| record.field(1) < from)
                {
                    return;
                }
                self.rows.push(ViewRow::Data(record));
            }
            _ => {
                let (table, page) = (record.table.clone(), record.page.clone());
                self.count(&table, &page, 1);
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<ViewRow> {
        match self.descriptor {
            QueryDescriptor::Tables => self
                .tables
                .into_iter()
                .map(|(table, (pages, records))| {
                    ViewRow::Table(TableSummary {
                        table,
                        pages: pages.len() as u64,
                        records,
                    })
                })
                .collect(),
            QueryDescriptor::Pages { .. } => self
                .pages
                .into_iter()
                .map(|(page, records)| ViewRow::Page(PageSummary { page, records }))
                .collect(),
            QueryDescriptor::Data { .. } => self.rows,
        }
    }
}

pub(crate) enum Scope<'a> {
    All,
    Nothing,
    Table(&'a TableName),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(table: &str, page: &str, seq: u32, first: &str) -> Record {
        Record {
            table: TableName::from_key(table),
            page: PageId::new(0, page),
            sequence: seq,
            fields: vec![first.to_string()],
        }
    }

    fn feed(descriptor: &QueryDescriptor) -> Vec<ViewRow> {
        let mut builder = ViewBuilder::new(descriptor);
        for r in [
            record("Employees", "Roster", 1, "Alice"),
            record("Employees", "Roster", 2, "Bob"),
            record("Employees", "Annex", 1, "Carol"),
            record("Offices", "Roster", 1, "Kampala"),
        ] {
            builder.push(r);
        }
        builder.finish()
    }

    #[test]
    fn test_tables_view_counts() {
        let rows = feed(&QueryDescriptor::Tables);
        assert_eq!(
            rows,
            vec![
                ViewRow::Table(TableSummary {
                    table: TableName::from_key("Employees"),
                    pages: 2,
                    records: 3
                }),
                ViewRow::Table(TableSummary {
                    table: TableName::from_key("Offices"),
                    pages: 1,
                    records: 1
                }),
            ]
        );
    }

    #[test]
    fn test_pages_view_scoped_and_guarded() {
        let rows = feed(&QueryDescriptor::Pages {
            table: Some(TableName::from_key("Employees")),
        });
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&ViewRow::Page(PageSummary {
            page: PageId::new(0, "Roster"),
            records: 2
        })));

        assert!(feed(&QueryDescriptor::Pages { table: None }).is_empty());
    }

    #[test]
    fn test_data_view_filters() {
        let rows = feed(&QueryDescriptor::Data {
            table: TableName::from_key("Employees"),
            page: Some(PageId::new(0, "Roster")),
            data_from: Some("B".to_string()),
        });
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index_key(), "Bob");
    }
}
