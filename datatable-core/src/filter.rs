//! Structured filter and order expressions for record selection.
//!
//! Callers never hand raw predicate text to the store. A filter fragment is
//! parsed into a conjunction of `(field, operator, literal)` clauses and an
//! order fragment into a list of whitelisted sort keys; both are resolved
//! against the table's [`ColumnSet`] before they reach storage.
//!
//! ```text
//! filter := clause ( AND clause )*
//! clause := field op literal
//! op     := = | != | <> | < | <= | > | >= | ~ | ^=
//! order  := field [ASC|DESC] ( , field [ASC|DESC] )*
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{ColumnSet, QueryError, Record, TitleRules};

/// Field a clause or sort key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// 1-based generic data slot.
    Data(usize),
    /// Source page, compared by its key form (`12:Staff_list` for a page
    /// outside the main namespace).
    Page,
    /// Position of the record among its page's rows.
    Sequence,
}

impl Field {
    /// Resolve a user-supplied field name.
    pub fn resolve(name: &str, columns: &ColumnSet) -> Result<Self, QueryError> {
        if let Some(index) = columns.resolve(name) {
            return Ok(Field::Data(index));
        }
        match name.to_ascii_lowercase().as_str() {
            "page" | "page_title" => Ok(Field::Page),
            "sequence" => Ok(Field::Sequence),
            _ => Err(QueryError::UnknownField {
                field: name.to_string(),
            }),
        }
    }

    fn value(&self, record: &Record) -> String {
        match self {
            Field::Data(i) => record.field(*i).to_string(),
            Field::Page => record.page.to_string(),
            Field::Sequence => record.sequence.to_string(),
        }
    }
}

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Contains substring
    Contains,
    /// Starts with
    Prefix,
}

impl FilterOperator {
    fn parse(op: &str, position: usize) -> Result<Self, QueryError> {
        match op {
            "=" | "==" => Ok(FilterOperator::Eq),
            "!=" | "<>" => Ok(FilterOperator::Ne),
            ">" => Ok(FilterOperator::Gt),
            "<" => Ok(FilterOperator::Lt),
            ">=" => Ok(FilterOperator::Gte),
            "<=" => Ok(FilterOperator::Lte),
            "~" => Ok(FilterOperator::Contains),
            "^=" => Ok(FilterOperator::Prefix),
            other => Err(QueryError::UnknownOperator {
                operator: other.to_string(),
                position,
            }),
        }
    }
}

/// One `(field, operator, literal)` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpr {
    pub field: Field,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterExpr {
    /// Create a new filter expression.
    pub fn new(field: Field, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }

    /// Create an equality filter.
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Evaluate against a record. Comparison is textual, except that the
    /// sequence compares numerically when the literal is a number.
    pub fn matches(&self, record: &Record) -> bool {
        let ordering = match (self.field, self.value.parse::<u32>()) {
            (Field::Sequence, Ok(n)) => record.sequence.cmp(&n),
            _ => self.field.value(record).as_str().cmp(self.literal().as_str()),
        };
        match self.operator {
            FilterOperator::Eq => ordering == Ordering::Equal,
            FilterOperator::Ne => ordering != Ordering::Equal,
            FilterOperator::Gt => ordering == Ordering::Greater,
            FilterOperator::Lt => ordering == Ordering::Less,
            FilterOperator::Gte => ordering != Ordering::Less,
            FilterOperator::Lte => ordering != Ordering::Greater,
            FilterOperator::Contains => self.field.value(record).contains(self.literal().as_str()),
            FilterOperator::Prefix => self.field.value(record).starts_with(self.literal().as_str()),
        }
    }

    // Page keys use underscores.
    fn literal(&self) -> String {
        match self.field {
            Field::Page => self.value.replace(' ', "_"),
            _ => self.value.clone(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key of an order fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: Field,
    pub direction: SortDirection,
}

/// A resolved selection: conjunction of filters plus ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filters: Vec<FilterExpr>,
    pub order: Vec<SortKey>,
}

impl RecordQuery {
    /// Query that selects everything in default order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse optional filter and order fragments against a column set.
    /// Blank fragments are treated as absent.
    pub fn parse(
        filter: Option<&str>,
        order: Option<&str>,
        columns: &ColumnSet,
    ) -> Result<Self, QueryError> {
        let filters = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(text) => parse_filter(text, columns)?,
            None => Vec::new(),
        };
        let order = match order.map(str::trim).filter(|o| !o.is_empty()) {
            Some(text) => parse_order(text, columns)?,
            None => Vec::new(),
        };
        Ok(Self { filters, order })
    }

    /// Rewrite page literals from title text, e.g. `Help:Staff list`, to
    /// the key form records are compared in. Substring clauses keep their
    /// text; a literal that is not a valid title stays as written.
    pub fn resolve_pages(mut self, rules: &TitleRules) -> Self {
        for clause in &mut self.filters {
            if clause.field != Field::Page || clause.operator == FilterOperator::Contains {
                continue;
            }
            if let Ok(page) = rules.page(&clause.value) {
                clause.value = page.to_string();
            }
        }
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, field: Field, direction: SortDirection) -> Self {
        self.order.push(SortKey { field, direction });
        self
    }

    /// True when every clause holds.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Sort by the requested keys, then by source page and sequence so the
    /// result order is total.
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            for key in &self.order {
                let ord = compare_field(key.field, a, b);
                let ord = match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.page.cmp(&b.page).then(a.sequence.cmp(&b.sequence))
        });
    }
}

fn compare_field(field: Field, a: &Record, b: &Record) -> Ordering {
    match field {
        Field::Data(i) => a.field(i).cmp(b.field(i)),
        Field::Page => a.page.cmp(&b.page),
        Field::Sequence => a.sequence.cmp(&b.sequence),
    }
}

// ============================================================================
// FRAGMENT PARSING
// ============================================================================

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
    }

    fn word(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn operator(&mut self) -> Result<FilterOperator, QueryError> {
        self.skip_ws();
        let start = self.pos;
        let rest = self.rest();
        let len = rest
            .find(|c: char| !matches!(c, '=' | '!' | '<' | '>' | '~' | '^'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.unexpected());
        }
        self.pos += len;
        FilterOperator::parse(&rest[..len], start)
    }

    fn literal(&mut self) -> Result<String, QueryError> {
        self.skip_ws();
        let start = self.pos;
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, quote @ ('\'' | '"'))) => {
                let mut value = String::new();
                let mut iter = rest[1..].char_indices().peekable();
                while let Some((i, c)) = iter.next() {
                    if c == quote {
                        // A doubled quote stands for the quote itself.
                        if matches!(iter.peek(), Some((_, next)) if *next == quote) {
                            value.push(quote);
                            iter.next();
                            continue;
                        }
                        self.pos += 1 + i + c.len_utf8();
                        return Ok(value);
                    }
                    value.push(c);
                }
                Err(QueryError::UnterminatedLiteral { position: start })
            }
            Some(_) => {
                let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
                self.pos += len;
                Ok(rest[..len].to_string())
            }
            None => Err(self.unexpected()),
        }
    }

    fn unexpected(&self) -> QueryError {
        let found: String = self.rest().chars().take(16).collect();
        QueryError::UnexpectedInput {
            position: self.pos,
            found: if found.is_empty() {
                "end of input".to_string()
            } else {
                found
            },
        }
    }
}

fn parse_filter(text: &str, columns: &ColumnSet) -> Result<Vec<FilterExpr>, QueryError> {
    let mut scanner = Scanner::new(text);
    let mut filters = Vec::new();
    loop {
        let name = scanner.word().ok_or_else(|| scanner.unexpected())?;
        let field = Field::resolve(name, columns)?;
        let operator = scanner.operator()?;
        let value = scanner.literal()?;
        filters.push(FilterExpr::new(field, operator, value));

        if scanner.at_end() {
            return Ok(filters);
        }
        match scanner.word() {
            Some(w) if w.eq_ignore_ascii_case("and") => continue,
            _ => return Err(scanner.unexpected()),
        }
    }
}

fn parse_order(text: &str, columns: &ColumnSet) -> Result<Vec<SortKey>, QueryError> {
    let mut keys = Vec::new();
    for part in text.split(',') {
        let mut words = part.split_whitespace();
        let name = words.next().ok_or_else(|| QueryError::UnexpectedInput {
            position: 0,
            found: part.to_string(),
        })?;
        let field = Field::resolve(name, columns).map_err(|_| QueryError::UnsortableField {
            field: name.to_string(),
        })?;
        let direction = match words.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(QueryError::UnexpectedInput {
                    position: 0,
                    found: other.to_string(),
                })
            }
        };
        if let Some(extra) = words.next() {
            return Err(QueryError::UnexpectedInput {
                position: 0,
                found: extra.to_string(),
            });
        }
        keys.push(SortKey { field, direction });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageId, TableName};
    use std::collections::BTreeMap;

    fn columns() -> ColumnSet {
        ColumnSet::new(3, &["Name".to_string(), "City".to_string()])
    }

    fn record(page: &str, seq: u32, name: &str, city: &str) -> Record {
        Record {
            table: TableName::from_key("Employees"),
            page: PageId::new(0, page),
            sequence: seq,
            fields: vec![name.to_string(), city.to_string(), String::new()],
        }
    }

    #[test]
    fn test_parse_single_clause() {
        let q = RecordQuery::parse(Some("City = 'Kampala'"), None, &columns()).unwrap();
        assert_eq!(q.filters, vec![FilterExpr::eq(Field::Data(2), "Kampala")]);
        assert!(q.order.is_empty());
    }

    #[test]
    fn test_parse_conjunction_and_bare_literal() {
        let q = RecordQuery::parse(
            Some("name ^= A and data_2 != Nairobi AND sequence <= 3"),
            None,
            &columns(),
        )
        .unwrap();
        assert_eq!(q.filters.len(), 3);
        assert_eq!(q.filters[0].operator, FilterOperator::Prefix);
        assert_eq!(q.filters[1].field, Field::Data(2));
        assert_eq!(q.filters[2].field, Field::Sequence);
    }

    #[test]
    fn test_parse_doubled_quote() {
        let q = RecordQuery::parse(Some("Name = 'O''Brien'"), None, &columns()).unwrap();
        assert_eq!(q.filters[0].value, "O'Brien");
    }

    #[test]
    fn test_parse_errors() {
        let cols = columns();
        assert!(matches!(
            RecordQuery::parse(Some("Salary > 10"), None, &cols),
            Err(QueryError::UnknownField { .. })
        ));
        assert!(matches!(
            RecordQuery::parse(Some("Name =< 'x'"), None, &cols),
            Err(QueryError::UnknownOperator { .. })
        ));
        assert!(matches!(
            RecordQuery::parse(Some("Name = 'x"), None, &cols),
            Err(QueryError::UnterminatedLiteral { .. })
        ));
        assert!(matches!(
            RecordQuery::parse(Some("Name = x OR City = y"), None, &cols),
            Err(QueryError::UnexpectedInput { .. })
        ));
        assert!(matches!(
            RecordQuery::parse(None, Some("1=1; DROP"), &cols),
            Err(QueryError::UnsortableField { .. })
        ));
    }

    #[test]
    fn test_blank_fragments_are_absent() {
        let q = RecordQuery::parse(Some("  "), Some(""), &columns()).unwrap();
        assert_eq!(q, RecordQuery::all());
    }

    #[test]
    fn test_matches() {
        let q = RecordQuery::parse(Some("City ~ amp AND sequence > 1"), None, &columns()).unwrap();
        assert!(!q.matches(&record("Roster", 1, "Alice", "Kampala")));
        assert!(q.matches(&record("Roster", 2, "Carol", "Kampala")));
        assert!(!q.matches(&record("Roster", 3, "Bob", "Nairobi")));
    }

    #[test]
    fn test_page_literal_uses_key_form() {
        let q = RecordQuery::parse(Some("page = 'Staff list'"), None, &columns()).unwrap();
        assert!(q.matches(&record("Staff_list", 1, "A", "B")));
    }

    #[test]
    fn test_namespaced_page_literal_resolves_through_rules() {
        let mut names = BTreeMap::new();
        names.insert("Help".to_string(), 12);
        let rules = TitleRules::new(&names, true, 0);
        let mut staff = record("Staff", 1, "A", "B");
        staff.page = PageId::new(12, "Staff");

        let unresolved = RecordQuery::parse(Some("page = 'Help:Staff'"), None, &columns()).unwrap();
        assert!(!unresolved.matches(&staff));

        let q = unresolved.resolve_pages(&rules);
        assert!(q.matches(&staff));
        assert!(!q.matches(&record("Staff", 1, "A", "B")));

        let q = RecordQuery::parse(Some("page ^= 'help:St'"), None, &columns())
            .unwrap()
            .resolve_pages(&rules);
        assert!(q.matches(&staff));

        let q = RecordQuery::parse(Some("page = 'Roster'"), None, &columns())
            .unwrap()
            .resolve_pages(&rules);
        assert!(q.matches(&record("Roster", 1, "A", "B")));
    }

    #[test]
    fn test_sort_with_default_tiebreak() {
        let mut rows = vec![
            record("B", 1, "Zed", "Kampala"),
            record("A", 2, "Amy", "Nairobi"),
            record("A", 1, "Bob", "Kampala"),
        ];
        RecordQuery::all().sort(&mut rows);
        let order: Vec<_> = rows.iter().map(|r| (r.page.title.clone(), r.sequence)).collect();
        assert_eq!(order, vec![("A".into(), 1), ("A".into(), 2), ("B".into(), 1)]);

        let q = RecordQuery::parse(None, Some("City desc, Name"), &columns()).unwrap();
        q.sort(&mut rows);
        let names: Vec<_> = rows.iter().map(|r| r.field(1).to_string()).collect();
        assert_eq!(names, vec!["Amy", "Bob", "Zed"]);
    }
}
