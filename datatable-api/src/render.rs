//! Wikitext output of select directives.

use datatable_core::{ColumnSet, Record, TableName, TitleRules};

/// Wikitext message used in place of a failed directive.
pub fn error_text(message: &str) -> String {
    format!("<strong class=\"error\">Data error: {}</strong>", message)
}

/// Render a select result as a wikitext table with a trailing page column.
///
/// Only slots up to the last one any record fills are shown. An empty
/// result renders nothing; a missing table renders a notice.
pub fn render_selection(
    table: &TableName,
    columns: &ColumnSet,
    records: Option<&[Record]>,
    rules: &TitleRules,
    classes: &[String],
) -> String {
    let Some(records) = records else {
        return format!("<span class=\"datatable-missing\">No data table named {}.</span>", table.text());
    };
    if records.is_empty() {
        return String::new();
    }

    let width = records
        .iter()
        .filter_map(|r| r.fields.iter().rposition(|f| !f.is_empty()))
        .max()
        .map_or(1, |last| last + 1);

    let mut out = format!("{{| class=\"{}\"\n!", classes.join(" "));
    for i in 1..=width {
        out.push(' ');
        out.push_str(columns.label(i).unwrap_or_default());
        out.push_str(" !!");
    }
    out.push_str(" Page\n");

    for record in records {
        out.push_str("|-\n|");
        for i in 1..=width {
            out.push(' ');
            out.push_str(record.field(i));
            out.push_str(" ||");
        }
        out.push_str(&format!(" [[{}]]\n", rules.page_text(&record.page)));
    }
    out.push_str("|}\n");
    out
}
