use crate::error::{ShardError, ShardResult};
use crate::rule::algorithm::ShardingStrategy;
use crate::rule::data_node::DataNode;
use std::collections::BTreeSet;

/// Placement and strategies of one logical sharding table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRule {
    logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    database_strategy: Option<ShardingStrategy>,
    table_strategy: Option<ShardingStrategy>,
}

impl TableRule {
    pub fn new(logic_table: impl Into<String>, actual_data_nodes: Vec<DataNode>) -> ShardResult<Self> {
        let logic_table = logic_table.into();
        if actual_data_nodes.is_empty() {
            return Err(ShardError::config(format!(
                "Table '{}' has no actual data nodes",
                logic_table
            )));
        }
        let mut seen = BTreeSet::new();
        for node in &actual_data_nodes {
            let key = (
                node.data_source.to_ascii_lowercase(),
                node.table.to_ascii_lowercase(),
            );
            if !seen.insert(key) {
                return Err(ShardError::config(format!(
                    "Table '{}' lists data node '{}' twice",
                    logic_table, node
                )));
            }
        }

        Ok(Self {
            logic_table,
            actual_data_nodes,
            database_strategy: None,
            table_strategy: None,
        })
    }

    pub fn with_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    pub fn with_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    pub fn logic_table(&self) -> &str {
        &self.logic_table
    }

    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    /// Explicit database strategy, `None` falls back to the rule default.
    pub fn database_strategy(&self) -> Option<&ShardingStrategy> {
        self.database_strategy.as_ref()
    }

    /// Explicit table strategy, `None` falls back to the rule default.
    pub fn table_strategy(&self) -> Option<&ShardingStrategy> {
        self.table_strategy.as_ref()
    }

    /// Data sources in first-appearance order.
    pub fn data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for node in &self.actual_data_nodes {
            if !names.iter().any(|n| n == &node.data_source) {
                names.push(node.data_source.clone());
            }
        }
        names
    }

    /// Actual tables on `data_source`, in configured order.
    pub fn actual_tables(&self, data_source: &str) -> Vec<String> {
        self.actual_data_nodes
            .iter()
            .filter(|n| n.data_source.eq_ignore_ascii_case(data_source))
            .map(|n| n.table.clone())
            .collect()
    }

    pub fn actual_table_index(&self, data_source: &str, actual_table: &str) -> Option<usize> {
        self.actual_tables(data_source)
            .iter()
            .position(|t| t.eq_ignore_ascii_case(actual_table))
    }

    pub fn contains_data_node(&self, data_source: &str, actual_table: &str) -> bool {
        self.actual_data_nodes
            .iter()
            .any(|n| n.matches(data_source, actual_table))
    }

    pub fn is_on_data_source(&self, data_source: &str) -> bool {
        self.actual_data_nodes
            .iter()
            .any(|n| n.data_source.eq_ignore_ascii_case(data_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(names: &[&str]) -> Vec<DataNode> {
        names.iter().map(|n| DataNode::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_actual_tables_per_data_source() {
        let rule = TableRule::new(
            "t_order",
            nodes(&["ds_0.t_order_0", "ds_0.t_order_1", "ds_1.t_order_0"]),
        )
        .unwrap();
        assert_eq!(rule.data_source_names(), vec!["ds_0", "ds_1"]);
        assert_eq!(rule.actual_tables("ds_0"), vec!["t_order_0", "t_order_1"]);
        assert_eq!(rule.actual_table_index("ds_0", "T_ORDER_1"), Some(1));
        assert!(rule.contains_data_node("ds_1", "t_order_0"));
        assert!(!rule.contains_data_node("ds_1", "t_order_1"));
    }

    #[test]
    fn test_rejects_empty_or_duplicate_nodes() {
        assert!(TableRule::new("t", Vec::new()).is_err());
        assert!(TableRule::new("t", nodes(&["ds.t_0", "DS.T_0"])).is_err());
    }
}
