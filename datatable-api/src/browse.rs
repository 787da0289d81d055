//! Browsing endpoints: the tables, pages and data views as HTML.
//!
//! - `GET /tables[/<from>]`
//! - `GET /pages[/<table>[//<from page>]]`
//! - `GET /data[/<table>[//<page>[//<data from>]]]`
//!
//! Path parameters take precedence over the `tablename`, `pagename` and
//! `data` query parameters. `limit`, `offset` (a continuation cursor) and
//! `dir` control paging.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use datatable_core::{Cursor, Direction, PageId, QueryDescriptor, TableName, ViewRow};
use datatable_pager::{IndexPager, PageRequest, ResultPage};
use serde::Deserialize;

use crate::error::{ApiError, HostResult};
use crate::hooks::DataTableHost;
use crate::state::AppState;

// ============================================================================
// PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Tables,
    Pages,
    Data,
}

impl View {
    pub fn path(self) -> &'static str {
        match self {
            View::Tables => "/tables",
            View::Pages => "/pages",
            View::Data => "/data",
        }
    }

    fn title(self) -> &'static str {
        match self {
            View::Tables => "Data tables",
            View::Pages => "Data pages",
            View::Data => "Data records",
        }
    }

    /// Number of path parameters the view takes.
    fn arity(self) -> usize {
        match self {
            View::Tables => 1,
            View::Pages => 2,
            View::Data => 3,
        }
    }
}

/// Query string of a browsing request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseParams {
    pub tablename: Option<String>,
    pub pagename: Option<String>,
    pub data: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub dir: Option<String>,
}

/// Parameters after merging the path into the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selection {
    tablename: String,
    pagename: String,
    data: String,
    limit: Option<usize>,
    cursor: Option<Cursor>,
    direction: Direction,
}

impl Selection {
    fn merge(view: View, par: Option<&str>, separator: &str, params: BrowseParams) -> Self {
        let parts: Vec<&str> = match par {
            Some(par) if !separator.is_empty() => par.splitn(view.arity(), separator).collect(),
            Some(par) => vec![par],
            None => Vec::new(),
        };
        let pick = |i: usize, fallback: Option<String>| {
            parts
                .get(i)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.map(|f| f.trim().to_string()).unwrap_or_default())
        };

        Self {
            tablename: pick(0, params.tablename),
            pagename: pick(1, params.pagename),
            data: pick(2, params.data),
            limit: params.limit.and_then(|l| l.trim().parse().ok()),
            cursor: params.offset.as_deref().and_then(Cursor::decode),
            direction: Direction::from_param(params.dir.as_deref()),
        }
    }
}

/// Descriptor and window of the request, or `None` when the view needs a
/// table and none was given.
fn plan(
    host: &DataTableHost,
    view: View,
    selection: &Selection,
) -> HostResult<Option<(QueryDescriptor, PageRequest)>> {
    let table = if selection.tablename.is_empty() {
        None
    } else {
        Some(host.registry().table_name(&selection.tablename)?)
    };
    let page = if selection.pagename.is_empty() || view == View::Tables {
        None
    } else {
        Some(host.page(&selection.pagename)?)
    };

    let mut request = PageRequest {
        from: None,
        cursor: selection.cursor.clone(),
        limit: selection.limit,
        direction: selection.direction,
    };

    let descriptor = match view {
        View::Tables => {
            request.from = table.map(|t| t.key().to_string());
            QueryDescriptor::Tables
        }
        View::Pages => {
            request.from = page.map(|p| p.title);
            QueryDescriptor::Pages { table }
        }
        View::Data => {
            let Some(table) = table else {
                return Ok(None);
            };
            QueryDescriptor::Data {
                table,
                page,
                data_from: Some(selection.data.clone()).filter(|d| !d.is_empty()),
            }
        }
    };
    Ok(Some((descriptor, request)))
}

// ============================================================================
// HTML
// ============================================================================

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn render_page(title: &str, content: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{content}</body>\n</html>\n"
    ))
}

fn error_html(message: &str) -> String {
    format!("<div class=\"error\">Data error: {}</div>\n", escape_html(message))
}

fn input(name: &str, label: &str, size: usize, value: &str) -> String {
    format!(
        "<label for=\"{name}\">{label}</label>&#160;<input type=\"text\" name=\"{name}\" id=\"{name}\" size=\"{size}\" value=\"{}\">\n",
        escape_html(value)
    )
}

fn form(view: View, selection: &Selection, limit: usize) -> String {
    let mut fields = String::new();
    match view {
        View::Tables => fields.push_str(&input("tablename", "Tables from:", 25, &selection.tablename)),
        View::Pages => {
            fields.push_str(&input("tablename", "Table:", 25, &selection.tablename));
            fields.push_str(&input("pagename", "Pages from:", 25, &selection.pagename));
        }
        View::Data => {
            fields.push_str(&input("data", "Data from:", 20, &selection.data));
            fields.push_str(&input("tablename", "Table:", 20, &selection.tablename));
            fields.push_str(&input("pagename", "Page:", 20, &selection.pagename));
        }
    }
    fields.push_str(&input("limit", "Limit:", 5, &limit.to_string()));

    let option = |dir: Direction| {
        let selected = if selection.direction == dir { " selected" } else { "" };
        format!("<option value=\"{0}\"{1}>{0}</option>", dir.as_param(), selected)
    };
    fields.push_str(&format!(
        "<select name=\"dir\">{}{}</select>\n",
        option(Direction::Ascending),
        option(Direction::Descending)
    ));

    format!(
        "<form method=\"get\" action=\"{}\"><fieldset>\n{}<input type=\"submit\" value=\"Go\">\n</fieldset></form>\n",
        view.path(),
        fields
    )
}

fn nav_href(view: View, selection: &Selection, cursor: &Cursor, direction: Direction, limit: usize) -> String {
    let mut query = Vec::new();
    for (key, value) in [
        ("tablename", &selection.tablename),
        ("pagename", &selection.pagename),
        ("data", &selection.data),
    ] {
        if !value.is_empty() {
            query.push(format!("{}={}", key, urlencoding::encode(value)));
        }
    }
    query.push(format!("limit={}", limit));
    query.push(format!("offset={}", cursor.encode()));
    query.push(format!("dir={}", direction.as_param()));
    format!("{}?{}", view.path(), query.join("&amp;"))
}

fn navigation(view: View, selection: &Selection, page: &ResultPage) -> String {
    let link = |cursor: &Option<Cursor>, direction: Direction, label: &str| match cursor {
        Some(cursor) => format!(
            "<a href=\"{}\">{}</a>",
            nav_href(view, selection, cursor, direction, page.limit),
            label
        ),
        None => label.to_string(),
    };
    format!(
        "<p class=\"datatable-nav\">({}) ({})</p>\n",
        link(&page.previous, page.direction.reverse(), "previous"),
        link(&page.next, page.direction, "next")
    )
}

fn data_href(host: &DataTableHost, table: &TableName, page: &PageId) -> String {
    format!(
        "/data/{}{}{}",
        urlencoding::encode(table.key()),
        host.config().page_par_separator,
        urlencoding::encode(&host.registry().rules().page_text(page))
    )
}

fn rows_html(host: &DataTableHost, descriptor: &QueryDescriptor, page: &ResultPage) -> String {
    let rules = host.registry().rules();
    let mut out = String::new();

    match descriptor {
        QueryDescriptor::Tables | QueryDescriptor::Pages { .. } => {
            for positioned in page.positioned() {
                if positioned.first {
                    out.push_str("<ul>\n");
                }
                match positioned.row {
                    ViewRow::Table(summary) => out.push_str(&format!(
                        "<li><a href=\"/pages/{}\">{}</a>: pages={}, records={}</li>\n",
                        urlencoding::encode(summary.table.key()),
                        escape_html(&summary.table.text()),
                        summary.pages,
                        summary.records
                    )),
                    ViewRow::Page(summary) => {
                        let text = escape_html(&rules.page_text(&summary.page));
                        match descriptor {
                            QueryDescriptor::Pages { table: Some(table) } => out.push_str(&format!(
                                "<li><a href=\"{}\">{}</a>: records={}</li>\n",
                                data_href(host, table, &summary.page),
                                text,
                                summary.records
                            )),
                            _ => out.push_str(&format!("<li>{}: records={}</li>\n", text, summary.records)),
                        }
                    }
                    ViewRow::Data(_) => {}
                }
                if positioned.last {
                    out.push_str("</ul>\n");
                }
            }
        }
        QueryDescriptor::Data { table, .. } => {
            let columns = host.registry().columns_for(table);
            for positioned in page.positioned() {
                if positioned.first {
                    out.push_str(&format!(
                        "<table class=\"{}\">\n<tr>\n",
                        escape_html(&host.config().data_classes.join(" "))
                    ));
                    for label in columns.labels() {
                        out.push_str(&format!("<th>{}</th>\n", escape_html(label)));
                    }
                    out.push_str("<th>Page</th>\n</tr>\n");
                }
                if let ViewRow::Data(record) = positioned.row {
                    out.push_str("<tr>\n");
                    for i in 1..=columns.len() {
                        out.push_str(&format!("<td>{}</td>\n", escape_html(record.field(i))));
                    }
                    out.push_str(&format!(
                        "<td><a href=\"{}\">{}</a></td>\n</tr>\n",
                        data_href(host, table, &record.page),
                        escape_html(&rules.page_text(&record.page))
                    ));
                }
                if positioned.last {
                    out.push_str("</table>\n");
                }
            }
        }
    }
    out
}

fn page_body(host: &DataTableHost, view: View, selection: &Selection) -> HostResult<String> {
    let Some((descriptor, request)) = plan(host, view, selection)? else {
        return Ok(String::new());
    };
    let pager = IndexPager::from_config(host.store(), host.config());
    let page = pager.fetch_page(&descriptor, &request)?;

    let nav = navigation(view, selection, &page);
    let mut body = nav.clone();
    body.push_str(&rows_html(host, &descriptor, &page));
    body.push_str(&nav);
    Ok(body)
}

// ============================================================================
// HANDLERS
// ============================================================================

fn browse(state: &AppState, view: View, par: Option<&str>, params: BrowseParams) -> Response {
    let host = state.host.as_ref();
    let selection = Selection::merge(view, par, &host.config().page_par_separator, params);
    let pager = IndexPager::from_config(host.store(), host.config());
    let mut content = form(view, &selection, pager.clamp_limit(selection.limit));

    let status = match page_body(host, view, &selection) {
        Ok(body) => {
            content.push_str(&body);
            StatusCode::OK
        }
        Err(e) => {
            let err = ApiError::from(e);
            tracing::warn!(view = view.path(), error = %err, "Browse request failed");
            content.push_str(&error_html(&err.message));
            err.status_code()
        }
    };
    (status, render_page(view.title(), &content)).into_response()
}

/// GET /tables
pub async fn tables_root(State(state): State<AppState>, Query(params): Query<BrowseParams>) -> Response {
    browse(&state, View::Tables, None, params)
}

/// GET /tables/*par
pub async fn tables_par(
    State(state): State<AppState>,
    Path(par): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Response {
    browse(&state, View::Tables, Some(&par), params)
}

/// GET /pages
pub async fn pages_root(State(state): State<AppState>, Query(params): Query<BrowseParams>) -> Response {
    browse(&state, View::Pages, None, params)
}

/// GET /pages/*par
pub async fn pages_par(
    State(state): State<AppState>,
    Path(par): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Response {
    browse(&state, View::Pages, Some(&par), params)
}

/// GET /data
pub async fn data_root(State(state): State<AppState>, Query(params): Query<BrowseParams>) -> Response {
    browse(&state, View::Data, None, params)
}

/// GET /data/*par
pub async fn data_par(
    State(state): State<AppState>,
    Path(par): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Response {
    browse(&state, View::Data, Some(&par), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tablename: &str, pagename: &str) -> BrowseParams {
        BrowseParams {
            tablename: Some(tablename.to_string()),
            pagename: Some(pagename.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_path_takes_precedence() {
        let selection = Selection::merge(
            View::Data,
            Some("Employees//Roster"),
            "//",
            params("Offices", "Annex"),
        );
        assert_eq!(selection.tablename, "Employees");
        assert_eq!(selection.pagename, "Roster");
        assert_eq!(selection.data, "");
    }

    #[test]
    fn test_empty_path_parts_fall_back() {
        let selection = Selection::merge(View::Data, Some("//Roster//Smith"), "//", params("Offices", ""));
        assert_eq!(selection.tablename, "Offices");
        assert_eq!(selection.pagename, "Roster");
        assert_eq!(selection.data, "Smith");
    }

    #[test]
    fn test_tables_view_takes_whole_path() {
        let selection = Selection::merge(View::Tables, Some("A//B"), "//", BrowseParams::default());
        assert_eq!(selection.tablename, "A//B");
    }

    #[test]
    fn test_paging_params() {
        let cursor = Cursor {
            value: "Bob".to_string(),
            after: datatable_core::NaturalId::Table(TableName::from_key("T")),
        };
        let selection = Selection::merge(
            View::Tables,
            None,
            "//",
            BrowseParams {
                limit: Some("20".to_string()),
                offset: Some(cursor.encode()),
                dir: Some("desc".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(selection.limit, Some(20));
        assert_eq!(selection.cursor, Some(cursor));
        assert_eq!(selection.direction, Direction::Descending);

        let garbage = Selection::merge(
            View::Tables,
            None,
            "//",
            BrowseParams {
                limit: Some("lots".to_string()),
                offset: Some("zz".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(garbage.limit, None);
        assert_eq!(garbage.cursor, None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href='x'>&</a>"), "&lt;a href=&#x27;x&#x27;&gt;&amp;&lt;/a&gt;");
    }
}
