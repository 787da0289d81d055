//! Scripting entry point: `select(table, where, order_by)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::HostResult;
use crate::facade::{QueryFacade, RenderContext};

/// Value handed back to a script.
///
/// Serializes as `false` for a missing table, and otherwise as an object
/// keyed `"1"`, `"2"`, ... whose entries map column labels to values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Missing(bool),
    Records(BTreeMap<usize, BTreeMap<String, String>>),
}

impl ScriptValue {
    pub fn missing() -> Self {
        ScriptValue::Missing(false)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ScriptValue::Missing(_))
    }

    /// Number of records; zero for a missing table.
    pub fn len(&self) -> usize {
        match self {
            ScriptValue::Missing(_) => 0,
            ScriptValue::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Charge one expensive call, then select through the facade.
pub fn script_select(
    facade: &QueryFacade<'_>,
    ctx: &mut RenderContext,
    table: &str,
    filter: Option<&str>,
    order: Option<&str>,
) -> HostResult<ScriptValue> {
    ctx.charge_expensive()?;
    let table = facade.registry().table_name(table)?;
    let columns = facade.registry().columns_for(&table);

    let value = match facade.select(ctx, &table, filter, order)? {
        None => ScriptValue::missing(),
        Some(records) => ScriptValue::Records(
            records
                .iter()
                .enumerate()
                .map(|(i, record)| (i + 1, record.to_named(columns)))
                .collect(),
        ),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use datatable_core::PageId;
    use datatable_storage::{MemoryStore, RecordStore, SchemaRegistry};
    use datatable_test_utils::fixtures::{employees, employees_config, roster, roster_rows};

    fn setup() -> (MemoryStore, SchemaRegistry) {
        let store = MemoryStore::new(4);
        store.replace_page_records(&employees(), &roster(), &roster_rows()).unwrap();
        (store, SchemaRegistry::from_config(&employees_config()).unwrap())
    }

    #[test]
    fn test_records_are_one_indexed_by_label() {
        let (store, registry) = setup();
        let facade = QueryFacade::new(&store, &registry);
        let mut ctx = RenderContext::new(PageId::new(0, "Module:Staff"), 10);

        let value = script_select(&facade, &mut ctx, "employees", None, Some("Name DESC")).unwrap();
        let ScriptValue::Records(records) = &value else {
            panic!("expected records, got {:?}", value);
        };
        assert_eq!(records.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(records[&1]["Name"], "Bob");
        assert_eq!(records[&2]["City"], "Kampala");

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["1"]["Name"], "Bob");
    }

    #[test]
    fn test_missing_table_is_false() {
        let (store, registry) = setup();
        let facade = QueryFacade::new(&store, &registry);
        let mut ctx = RenderContext::new(PageId::new(0, "Module:Staff"), 10);

        let value = script_select(&facade, &mut ctx, "Nothing here", None, None).unwrap();
        assert!(value.is_missing());
        assert_eq!(serde_json::to_value(&value).unwrap(), serde_json::json!(false));
    }

    #[test]
    fn test_every_call_is_expensive() {
        let (store, registry) = setup();
        let facade = QueryFacade::new(&store, &registry);
        let mut ctx = RenderContext::new(PageId::new(0, "Module:Staff"), 1);

        script_select(&facade, &mut ctx, "Employees", None, None).unwrap();
        let err = script_select(&facade, &mut ctx, "Employees", None, None).unwrap_err();
        assert!(matches!(err, HostError::ExpensiveLimit { limit: 1 }));
    }
}
