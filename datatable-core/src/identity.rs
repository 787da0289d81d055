//! Page and table identity.
//!
//! A table is addressable as a page, so table names go through the same
//! title normalization and validation as page titles.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ExtractError;

/// Main (unprefixed) namespace id.
pub const NS_MAIN: i32 = 0;

/// Maximum length of a title key in bytes.
pub const MAX_TITLE_BYTES: usize = 255;

static ILLEGAL_TITLE_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[#<>\[\]|{}\x00-\x1f\x7f\x{FFFD}]").expect("static title regex")
});

/// Identity of a content page: namespace id plus title in key form
/// (underscores instead of spaces).
///
/// Ordering is by namespace, then title key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    pub namespace: i32,
    pub title: String,
}

impl PageId {
    /// Build a page id from an already-normalized title key.
    pub fn new(namespace: i32, title: impl Into<String>) -> Self {
        Self {
            namespace,
            title: title.into(),
        }
    }

    /// Title with spaces instead of underscores.
    pub fn title_text(&self) -> String {
        self.title.replace('_', " ")
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == NS_MAIN {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}:{}", self.namespace, self.title)
        }
    }
}

/// Canonical name of a data table, in key form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Wrap a key that was produced by [`TitleRules::table_name`] earlier,
    /// e.g. when decoding stored rows.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key form, as stored.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Display form with spaces.
    pub fn text(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Title normalization rules of the host content platform.
#[derive(Debug, Clone)]
pub struct TitleRules {
    /// Lower-cased namespace name (spaces) -> id.
    by_name: BTreeMap<String, i32>,
    /// Id -> canonical namespace name (spaces).
    by_id: BTreeMap<i32, String>,
    capital_links: bool,
    table_namespace: i32,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self::new(&BTreeMap::new(), true, NS_MAIN)
    }
}

impl TitleRules {
    pub fn new(namespaces: &BTreeMap<String, i32>, capital_links: bool, table_namespace: i32) -> Self {
        let mut by_name = BTreeMap::new();
        let mut by_id = BTreeMap::new();
        for (name, id) in namespaces {
            let canonical = collapse_spaces(&name.replace('_', " "));
            if canonical.is_empty() {
                continue;
            }
            by_name.insert(canonical.to_lowercase(), *id);
            by_id.entry(*id).or_insert(canonical);
        }
        Self {
            by_name,
            by_id,
            capital_links,
            table_namespace,
        }
    }

    /// Parse a user-supplied title. An unprefixed title lands in
    /// `default_namespace`; a leading colon forces the main namespace.
    pub fn parse(&self, text: &str, default_namespace: i32) -> Result<PageId, String> {
        let mut rest = collapse_spaces(&text.replace('_', " "));
        let mut namespace = default_namespace;

        if let Some(stripped) = rest.strip_prefix(':') {
            rest = stripped.trim_start().to_string();
            namespace = NS_MAIN;
        } else if let Some((prefix, after)) = rest.split_once(':') {
            if let Some(id) = self.by_name.get(&prefix.trim().to_lowercase()) {
                namespace = *id;
                rest = after.trim_start().to_string();
            }
        }

        if rest.is_empty() {
            return Err("empty title".to_string());
        }
        if rest.starts_with(':') {
            return Err("title starts with a colon".to_string());
        }
        if let Some(m) = ILLEGAL_TITLE_CHARS.find(&rest) {
            return Err(format!("illegal character {:?}", m.as_str()));
        }
        if is_relative_path(&rest) {
            return Err("relative path segment".to_string());
        }
        if rest.contains("~~~") {
            return Err("contains signature marker".to_string());
        }
        if rest.len() > MAX_TITLE_BYTES {
            return Err(format!("longer than {} bytes", MAX_TITLE_BYTES));
        }

        if self.capital_links {
            rest = capitalize_first(&rest);
        }

        Ok(PageId::new(namespace, rest.replace(' ', "_")))
    }

    /// Parse a page title, defaulting to the main namespace.
    pub fn page(&self, text: &str) -> Result<PageId, String> {
        self.parse(text, NS_MAIN)
    }

    /// Resolve a short table name to its canonical key. Titles outside the
    /// table namespace keep their namespace prefix in the key; a main
    /// namespace title keeps a bare leading colon, as in `:Foo`, so it
    /// resolves back to itself and never meets the table namespace's `Foo`.
    pub fn table_name(&self, raw: &str) -> Result<TableName, ExtractError> {
        let page = self
            .parse(raw, self.table_namespace)
            .map_err(|reason| ExtractError::InvalidTableName {
                name: raw.to_string(),
                reason,
            })?;
        if page.namespace == self.table_namespace {
            Ok(TableName(page.title))
        } else if page.namespace == NS_MAIN {
            Ok(TableName(format!(":{}", page.title)))
        } else {
            let prefix = self.namespace_name(page.namespace).replace(' ', "_");
            Ok(TableName(format!("{}:{}", prefix, page.title)))
        }
    }

    /// Canonical name of a namespace; unknown ids render as the number.
    pub fn namespace_name(&self, namespace: i32) -> String {
        if namespace == NS_MAIN {
            return String::new();
        }
        self.by_id
            .get(&namespace)
            .cloned()
            .unwrap_or_else(|| namespace.to_string())
    }

    /// Full text form of a page, e.g. `Help:Data tables`.
    pub fn page_text(&self, page: &PageId) -> String {
        if page.namespace == NS_MAIN {
            page.title_text()
        } else {
            format!("{}:{}", self.namespace_name(page.namespace), page.title_text())
        }
    }
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_relative_path(s: &str) -> bool {
    s == "."
        || s == ".."
        || s.starts_with("./")
        || s.starts_with("../")
        || s.contains("/./")
        || s.contains("/../")
        || s.ends_with("/.")
        || s.ends_with("/..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> TitleRules {
        let mut ns = BTreeMap::new();
        ns.insert("Help".to_string(), 12);
        ns.insert("Data_set".to_string(), 100);
        TitleRules::new(&ns, true, NS_MAIN)
    }

    #[test]
    fn test_parse_normalizes_spaces_and_case() {
        let page = rules().page("  employee   roster_list ").unwrap();
        assert_eq!(page, PageId::new(0, "Employee_roster_list"));
        assert_eq!(page.title_text(), "Employee roster list");
    }

    #[test]
    fn test_parse_resolves_namespace_prefix() {
        let page = rules().page("help:data tables").unwrap();
        assert_eq!(page.namespace, 12);
        assert_eq!(page.title, "Data_tables");

        let page = rules().page("Data set:Kampala").unwrap();
        assert_eq!(page.namespace, 100);
    }

    #[test]
    fn test_unknown_prefix_stays_in_title() {
        let page = rules().page("Foo:Bar").unwrap();
        assert_eq!(page.namespace, 0);
        assert_eq!(page.title, "Foo:Bar");
    }

    #[test]
    fn test_leading_colon_forces_main() {
        let page = rules().parse(":Help", 12).unwrap();
        assert_eq!(page.namespace, 0);
        assert_eq!(page.title, "Help");
    }

    #[test]
    fn test_rejects_invalid_titles() {
        let r = rules();
        for bad in ["", "   ", "a|b", "x#y", "[[z]]", "{{t}}", "../up", "a/./b", "..", "sig~~~", "Help::x"] {
            assert!(r.page(bad).is_err(), "expected {bad:?} to be rejected");
        }
        let long = "a".repeat(MAX_TITLE_BYTES + 1);
        assert!(r.page(&long).is_err());
    }

    #[test]
    fn test_capital_links_off_keeps_case() {
        let r = TitleRules::new(&BTreeMap::new(), false, NS_MAIN);
        assert_eq!(r.page("iPhone").unwrap().title, "iPhone");
    }

    #[test]
    fn test_table_name_resolution() {
        let r = rules();
        let t = r.table_name("employees").unwrap();
        assert_eq!(t.key(), "Employees");

        let t = r.table_name("help:staff list").unwrap();
        assert_eq!(t.key(), "Help:Staff_list");
        assert_eq!(t.text(), "Help:Staff list");

        let err = r.table_name("bad|name").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidTableName { .. }));
    }

    #[test]
    fn test_table_name_in_main_namespace_outside_table_namespace() {
        let mut names = BTreeMap::new();
        names.insert("Data".to_string(), 3000);
        let r = TitleRules::new(&names, true, 3000);

        assert_eq!(r.table_name("Foo").unwrap().key(), "Foo");
        assert_eq!(r.table_name("Data:Foo").unwrap().key(), "Foo");

        let main = r.table_name(":foo").unwrap();
        assert_eq!(main.key(), ":Foo");
        assert_eq!(r.table_name(main.key()).unwrap(), main);
        assert_ne!(main, r.table_name("Foo").unwrap());
    }

    #[test]
    fn test_page_text() {
        let r = rules();
        assert_eq!(r.page_text(&PageId::new(12, "Data_tables")), "Help:Data tables");
        assert_eq!(r.page_text(&PageId::new(0, "Roster")), "Roster");
        assert_eq!(r.page_text(&PageId::new(7, "X")), "7:X");
    }
}
