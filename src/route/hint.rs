use serde_json::Value;
use std::collections::BTreeMap;

/// Sharding values supplied by the caller instead of read from predicates.
///
/// Passed explicitly to every routing call; nothing is kept in thread locals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HintValueContext {
    database_values: BTreeMap<String, Vec<Value>>,
    table_values: BTreeMap<String, Vec<Value>>,
    data_source_name: Option<String>,
}

impl HintValueContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database_value(&mut self, logic_table: &str, value: Value) {
        self.database_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    pub fn add_table_value(&mut self, logic_table: &str, value: Value) {
        self.table_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    /// Preferred data source for statements that route to a single one.
    pub fn set_data_source_name(&mut self, name: impl Into<String>) {
        self.data_source_name = Some(name.into());
    }

    pub fn database_values(&self, logic_table: &str) -> &[Value] {
        self.database_values
            .get(&logic_table.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn table_values(&self, logic_table: &str) -> &[Value] {
        self.table_values
            .get(&logic_table.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn data_source_name(&self) -> Option<&str> {
        self.data_source_name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.database_values.is_empty()
            && self.table_values.is_empty()
            && self.data_source_name.is_none()
    }

    pub fn clear(&mut self) {
        self.database_values.clear();
        self.table_values.clear();
        self.data_source_name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_are_keyed_case_insensitively() {
        let mut hint = HintValueContext::new();
        hint.add_database_value("T_ORDER", json!(1));
        hint.add_table_value("t_order", json!(2));
        hint.add_table_value("t_order", json!(3));
        hint.set_data_source_name("ds_1");

        assert_eq!(hint.database_values("t_order"), &[json!(1)]);
        assert_eq!(hint.table_values("T_Order"), &[json!(2), json!(3)]);
        assert!(hint.table_values("t_user").is_empty());
        assert_eq!(hint.data_source_name(), Some("ds_1"));

        hint.clear();
        assert!(hint.is_empty());
    }
}
