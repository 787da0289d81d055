//! Configuration types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DataError, DataResult, TitleRules};

/// Per-table display configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Display labels of the generic slots, in slot order.
    pub columns: Vec<String>,
}

/// LMDB storage settings. An absent path selects the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub map_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            map_size_mb: 256,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTableConfig {
    /// Number of generic text slots per record.
    pub data_slots: usize,
    /// Labels used when a table has no override.
    pub default_columns: Vec<String>,
    /// Per-table label overrides, keyed by table name as written.
    pub tables: BTreeMap<String, TableConfig>,

    pub directive_tag: String,
    pub select_tag: String,
    pub field_separator: String,

    pub table_namespace: i32,
    pub namespaces: BTreeMap<String, i32>,
    pub capital_links: bool,

    pub page_par_separator: String,
    pub data_classes: Vec<String>,
    pub default_page_size: usize,
    pub max_page_size: usize,

    /// Expensive operations allowed per request.
    pub expensive_limit: u32,

    pub storage: StorageConfig,
}

impl Default for DataTableConfig {
    fn default() -> Self {
        Self {
            data_slots: 10,
            default_columns: Vec::new(),
            tables: BTreeMap::new(),
            directive_tag: "data".to_string(),
            select_tag: "dataselect".to_string(),
            field_separator: "|".to_string(),
            table_namespace: 0,
            namespaces: BTreeMap::new(),
            capital_links: true,
            page_par_separator: "//".to_string(),
            data_classes: vec!["wikitable".to_string(), "sortable".to_string()],
            default_page_size: 50,
            max_page_size: 5000,
            expensive_limit: 500,
            storage: StorageConfig::default(),
        }
    }
}

impl DataTableConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> DataResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| {
            DataError::Config(ConfigError::InvalidValue {
                field: "config".to_string(),
                value: String::new(),
                reason: e.message().to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DataError::Config(ConfigError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.data_slots == 0 {
            return Err(invalid("data_slots", "0", "data_slots must be greater than 0"));
        }

        if self.default_columns.len() > self.data_slots {
            return Err(invalid(
                "default_columns",
                &self.default_columns.len().to_string(),
                "more labels than data_slots",
            ));
        }

        for (name, table) in &self.tables {
            if table.columns.len() > self.data_slots {
                return Err(invalid(
                    &format!("tables.{}.columns", name),
                    &table.columns.len().to_string(),
                    "more labels than data_slots",
                ));
            }
        }

        for (field, value) in [
            ("directive_tag", &self.directive_tag),
            ("select_tag", &self.select_tag),
            ("field_separator", &self.field_separator),
            ("page_par_separator", &self.page_par_separator),
        ] {
            if value.trim().is_empty() {
                return Err(DataError::Config(ConfigError::MissingRequired {
                    field: field.to_string(),
                }));
            }
        }

        if self.directive_tag == self.select_tag {
            return Err(invalid(
                "select_tag",
                &self.select_tag,
                "select_tag must differ from directive_tag",
            ));
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                &self.default_page_size.to_string(),
                "default_page_size must be between 1 and max_page_size",
            ));
        }

        if self.storage.map_size_mb == 0 {
            return Err(invalid(
                "storage.map_size_mb",
                "0",
                "map_size_mb must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn title_rules(&self) -> TitleRules {
        TitleRules::new(&self.namespaces, self.capital_links, self.table_namespace)
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> DataError {
    DataError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
