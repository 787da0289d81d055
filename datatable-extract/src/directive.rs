//! Directive interpretation: data rows and select requests.

use std::collections::BTreeMap;

use datatable_core::{DataTableConfig, ExtractError, TableName, TitleRules};
use serde::{Deserialize, Serialize};

use crate::scanner::{DirectiveKind, DirectiveScanner, RawDirective, Span};
use crate::split::{clean_value, split_args};

/// One data directive: a record for `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirective {
    pub table: TableName,
    pub values: Vec<String>,
    pub span: Span,
}

/// One select directive: a render-time read of `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectDirective {
    pub table: TableName,
    pub filter: Option<String>,
    pub order: Option<String>,
    pub span: Span,
}

/// Rows extracted from one page, grouped by table in occurrence order,
/// plus the occurrences that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub tables: BTreeMap<TableName, Vec<Vec<String>>>,
    pub skipped: Vec<String>,
}

impl PageExtraction {
    /// Total number of extracted records.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Markup extractor configured with the directive tags, separator and
/// title rules of the content instance.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: TitleRules,
    data_tag: String,
    select_tag: String,
    separator: String,
    data_slots: usize,
}

impl Extractor {
    pub fn new(
        rules: TitleRules,
        data_tag: impl Into<String>,
        select_tag: impl Into<String>,
        separator: impl Into<String>,
        data_slots: usize,
    ) -> Self {
        Self {
            rules,
            data_tag: data_tag.into(),
            select_tag: select_tag.into(),
            separator: separator.into(),
            data_slots,
        }
    }

    pub fn from_config(config: &DataTableConfig) -> Self {
        Self::new(
            config.title_rules(),
            config.directive_tag.clone(),
            config.select_tag.clone(),
            config.field_separator.clone(),
            config.data_slots,
        )
    }

    pub fn rules(&self) -> &TitleRules {
        &self.rules
    }

    fn scanner<'a>(&'a self, content: &'a str) -> DirectiveScanner<'a> {
        DirectiveScanner::new(content, &self.data_tag, &self.select_tag)
    }

    /// Lazily extract data directives. Each occurrence yields one record or
    /// one page-local error.
    pub fn extract<'a>(
        &'a self,
        content: &'a str,
    ) -> impl Iterator<Item = Result<DataDirective, ExtractError>> + 'a {
        self.scanner(content).filter_map(move |raw| match raw {
            Ok(raw) if raw.kind == DirectiveKind::Data => Some(self.data_directive(&raw)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// Lazily extract select directives.
    pub fn selects<'a>(
        &'a self,
        content: &'a str,
    ) -> impl Iterator<Item = Result<SelectDirective, ExtractError>> + 'a {
        self.scanner(content).filter_map(move |raw| match raw {
            Ok(raw) if raw.kind == DirectiveKind::Select => Some(self.select_directive(&raw)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    }

    /// Extract every data directive of a page and group the rows by table.
    /// Bad occurrences are logged and skipped.
    pub fn extract_page(&self, content: &str) -> PageExtraction {
        let mut extraction = PageExtraction::default();
        for item in self.extract(content) {
            match item {
                Ok(directive) => extraction
                    .tables
                    .entry(directive.table)
                    .or_default()
                    .push(directive.values),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping data directive");
                    extraction.skipped.push(e.to_string());
                }
            }
        }
        extraction
    }

    fn data_directive(&self, raw: &RawDirective<'_>) -> Result<DataDirective, ExtractError> {
        let args = split_args(raw.body, &self.separator);
        let table = self.table(&args, raw)?;
        let values: Vec<String> = args[1..].iter().map(|a| clean_value(a)).collect();
        if values.len() > self.data_slots {
            return Err(malformed(
                raw,
                format!(
                    "{} values exceed the {} available data slots",
                    values.len(),
                    self.data_slots
                ),
            ));
        }
        Ok(DataDirective {
            table,
            values,
            span: raw.span,
        })
    }

    fn select_directive(&self, raw: &RawDirective<'_>) -> Result<SelectDirective, ExtractError> {
        let args = split_args(raw.body, &self.separator);
        if args.len() > 3 {
            return Err(malformed(raw, "expected at most table, filter and order".to_string()));
        }
        let table = self.table(&args, raw)?;
        let optional = |i: usize| {
            args.get(i)
                .map(|a| clean_value(a))
                .filter(|a| !a.is_empty())
        };
        Ok(SelectDirective {
            table,
            filter: optional(1),
            order: optional(2),
            span: raw.span,
        })
    }

    fn table(&self, args: &[&str], raw: &RawDirective<'_>) -> Result<TableName, ExtractError> {
        let name = args.first().map(|a| clean_value(a)).unwrap_or_default();
        if name.is_empty() {
            return Err(malformed(raw, "missing table name".to_string()));
        }
        self.rules.table_name(&name).inspect_err(|e| {
            tracing::warn!(
                line = raw.span.line,
                column = raw.span.column,
                error = %e,
                "Invalid table name in directive"
            );
        })
    }
}

fn malformed(raw: &RawDirective<'_>, reason: String) -> ExtractError {
    ExtractError::MalformedDirective {
        line: raw.span.line,
        column: raw.span.column,
        reason,
    }
}
