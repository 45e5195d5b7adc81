use crate::rule::DataNode;
use serde::Serialize;
use std::collections::BTreeSet;

/// Logical name paired with the actual name it routes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }
}

/// One physical target: a data source plus the actual table of every
/// logical table the statement references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: BTreeSet<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source: impl Into<String>) -> Self {
        let data_source = data_source.into();
        Self {
            data_source_mapper: RouteMapper::new(data_source.clone(), data_source),
            table_mappers: BTreeSet::new(),
        }
    }

    pub fn with_table(mut self, logic_table: impl Into<String>, actual_table: impl Into<String>) -> Self {
        self.add_table(logic_table, actual_table);
        self
    }

    pub fn add_table(&mut self, logic_table: impl Into<String>, actual_table: impl Into<String>) {
        self.table_mappers
            .insert(RouteMapper::new(logic_table, actual_table));
    }

    pub fn data_source_name(&self) -> &str {
        &self.data_source_mapper.actual_name
    }

    pub fn actual_table(&self, logic_table: &str) -> Option<&str> {
        self.table_mappers
            .iter()
            .find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
            .map(|m| m.actual_name.as_str())
    }

    pub fn contains_data_node(&self, node: &DataNode, logic_table: &str) -> bool {
        self.data_source_name().eq_ignore_ascii_case(&node.data_source)
            && self
                .actual_table(logic_table)
                .is_some_and(|t| t.eq_ignore_ascii_case(&node.table))
    }
}

/// Result of routing one statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RouteContext {
    route_units: Vec<RouteUnit>,
    /// Data nodes each INSERT row routed to, in row order.
    original_data_nodes: Vec<Vec<DataNode>>,
    logic_tables: Vec<String>,
}

impl RouteContext {
    pub fn new(logic_tables: Vec<String>) -> Self {
        Self {
            logic_tables,
            ..Default::default()
        }
    }

    /// Append a unit unless an equal one is already present.
    pub fn add_unit(&mut self, unit: RouteUnit) {
        if !self.route_units.contains(&unit) {
            self.route_units.push(unit);
        }
    }

    pub fn route_units(&self) -> &[RouteUnit] {
        &self.route_units
    }

    pub(crate) fn route_units_mut(&mut self) -> &mut Vec<RouteUnit> {
        &mut self.route_units
    }

    pub fn original_data_nodes(&self) -> &[Vec<DataNode>] {
        &self.original_data_nodes
    }

    pub(crate) fn push_original_data_nodes(&mut self, nodes: Vec<DataNode>) {
        self.original_data_nodes.push(nodes);
    }

    pub fn logic_tables(&self) -> &[String] {
        &self.logic_tables
    }

    pub fn is_single_routing(&self) -> bool {
        self.route_units.len() == 1
    }

    /// Distinct data sources in unit order.
    pub fn actual_data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for unit in &self.route_units {
            if !names.iter().any(|n| n == unit.data_source_name()) {
                names.push(unit.data_source_name().to_string());
            }
        }
        names
    }
}
