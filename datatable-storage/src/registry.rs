//! Schema registry: table name validation and configured column sets.

use std::collections::BTreeMap;

use datatable_core::{
    ColumnSet, ConfigError, DataError, DataResult, DataTableConfig, ExtractError, QueryError,
    RecordQuery, TableName, TitleRules,
};

/// Column sets resolved once from configuration. Columns are generic
/// slots; labels are display metadata only.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    rules: TitleRules,
    slots: usize,
    default_columns: ColumnSet,
    overrides: BTreeMap<TableName, ColumnSet>,
}

impl SchemaRegistry {
    pub fn from_config(config: &DataTableConfig) -> DataResult<Self> {
        let rules = config.title_rules();
        let mut overrides = BTreeMap::new();
        for (name, table) in &config.tables {
            let key = rules.table_name(name).map_err(|e| {
                DataError::Config(ConfigError::InvalidValue {
                    field: format!("tables.{}", name),
                    value: name.clone(),
                    reason: e.to_string(),
                })
            })?;
            overrides.insert(key, ColumnSet::new(config.data_slots, &table.columns));
        }
        Ok(Self {
            rules,
            slots: config.data_slots,
            default_columns: ColumnSet::new(config.data_slots, &config.default_columns),
            overrides,
        })
    }

    /// Number of generic data slots every table has.
    pub fn data_slots(&self) -> usize {
        self.slots
    }

    pub fn rules(&self) -> &TitleRules {
        &self.rules
    }

    /// Resolve and validate a user-supplied table name.
    pub fn table_name(&self, raw: &str) -> Result<TableName, ExtractError> {
        self.rules.table_name(raw)
    }

    /// Ordered column labels of a table.
    pub fn columns_for(&self, table: &TableName) -> &ColumnSet {
        self.overrides.get(table).unwrap_or(&self.default_columns)
    }

    /// Parse filter and order fragments against the table's columns, with
    /// page literals resolved through the title rules.
    pub fn query_for(
        &self,
        table: &TableName,
        filter: Option<&str>,
        order: Option<&str>,
    ) -> Result<RecordQuery, QueryError> {
        Ok(RecordQuery::parse(filter, order, self.columns_for(table))?.resolve_pages(&self.rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datatable_core::{Field, TableConfig};

    fn config() -> DataTableConfig {
        let mut config = DataTableConfig {
            data_slots: 4,
            default_columns: vec!["Key".into(), "Value".into()],
            ..Default::default()
        };
        config.namespaces.insert("Help".into(), 12);
        config.tables.insert(
            "employees".into(),
            TableConfig {
                columns: vec!["Name".into(), "City".into()],
            },
        );
        config.tables.insert(
            "Help:Staff list".into(),
            TableConfig {
                columns: vec!["Person".into()],
            },
        );
        config
    }

    #[test]
    fn test_columns_for_uses_normalized_keys() {
        let registry = SchemaRegistry::from_config(&config()).unwrap();
        assert_eq!(registry.data_slots(), 4);

        let cols = registry.columns_for(&TableName::from_key("Employees"));
        assert_eq!(cols.labels(), &["Name", "City", "data_3", "data_4"]);

        let cols = registry.columns_for(&TableName::from_key("Help:Staff_list"));
        assert_eq!(cols.label(1), Some("Person"));

        let cols = registry.columns_for(&TableName::from_key("Other"));
        assert_eq!(cols.labels(), &["Key", "Value", "data_3", "data_4"]);
    }

    #[test]
    fn test_invalid_configured_table_name() {
        let mut config = config();
        config.tables.insert("Bad|Name".into(), TableConfig::default());
        let err = SchemaRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, DataError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_query_for_resolves_labels() {
        let registry = SchemaRegistry::from_config(&config()).unwrap();
        let table = registry.table_name("employees").unwrap();
        let query = registry
            .query_for(&table, Some("City = Kampala"), Some("Name desc"))
            .unwrap();
        assert_eq!(query.filters[0].field, Field::Data(2));
        assert_eq!(query.order[0].field, Field::Data(1));

        assert!(registry.query_for(&table, Some("Person = x"), None).is_err());
    }
}
