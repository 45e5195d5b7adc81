//! Parameter list rewriting, kept in lock-step with SQL token rewriting.

use crate::route::RouteContext;
use crate::statement::{InsertStatementContext, SqlStatementContext};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Flat parameters with replacements keyed by original index.
///
/// Replacements apply to every unit; removals differ per unit and are
/// passed in when the unit's list is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StandardParameterBuilder {
    original: Vec<Value>,
    replaced: BTreeMap<usize, Value>,
}

impl StandardParameterBuilder {
    pub fn new(original: Vec<Value>) -> Self {
        Self {
            original,
            ..Default::default()
        }
    }

    pub fn add_replaced_parameter(&mut self, index: usize, value: Value) {
        self.replaced.insert(index, value);
    }

    pub fn original(&self) -> &[Value] {
        &self.original
    }

    pub fn parameters(&self) -> Vec<Value> {
        self.parameters_without(&BTreeSet::new())
    }

    /// Parameters with the original indexes in `removed` left out.
    pub fn parameters_without(&self, removed: &BTreeSet<usize>) -> Vec<Value> {
        self.original
            .iter()
            .enumerate()
            .filter(|(index, _)| !removed.contains(index))
            .map(|(index, value)| self.replaced.get(&index).unwrap_or(value).clone())
            .collect()
    }
}

/// Parameters of a multi-row INSERT split into generic parts and one group per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupedParameterBuilder {
    before: Vec<Value>,
    groups: Vec<Vec<Value>>,
    after: Vec<Value>,
}

impl GroupedParameterBuilder {
    pub fn new(original: &[Value], insert: &InsertStatementContext) -> Self {
        let pick = |indexes: &[usize]| -> Vec<Value> {
            indexes
                .iter()
                .filter_map(|i| original.get(*i).cloned())
                .collect()
        };
        Self {
            before: pick(&insert.before_parameters),
            groups: insert.rows.iter().map(|r| pick(&r.parameter_indexes)).collect(),
            after: pick(&insert.after_parameters),
        }
    }

    pub fn groups(&self) -> &[Vec<Value>] {
        &self.groups
    }

    /// Every parameter, in original order.
    pub fn parameters(&self) -> Vec<Value> {
        self.parameters_for(0..self.groups.len())
    }

    /// Generic parameters around the groups of the given rows.
    pub fn parameters_for(&self, rows: impl IntoIterator<Item = usize>) -> Vec<Value> {
        let mut out = self.before.clone();
        for row in rows {
            if let Some(group) = self.groups.get(row) {
                out.extend(group.iter().cloned());
            }
        }
        out.extend(self.after.iter().cloned());
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBuilder {
    Standard(StandardParameterBuilder),
    Grouped(GroupedParameterBuilder),
}

impl ParameterBuilder {
    /// Builder for a statement, with pagination markers already revised
    /// when the statement is spread over several units.
    pub fn new(context: &SqlStatementContext, route: &RouteContext, parameters: &[Value]) -> Self {
        if let Some(insert) = context.as_insert() {
            return ParameterBuilder::Grouped(GroupedParameterBuilder::new(parameters, insert));
        }

        let mut builder = StandardParameterBuilder::new(parameters.to_vec());
        if !route.is_single_routing() {
            rewrite_pagination_parameters(context, &mut builder);
        }
        ParameterBuilder::Standard(builder)
    }

    pub fn parameters(&self) -> Vec<Value> {
        match self {
            ParameterBuilder::Standard(builder) => builder.parameters(),
            ParameterBuilder::Grouped(builder) => builder.parameters(),
        }
    }
}

fn rewrite_pagination_parameters(context: &SqlStatementContext, builder: &mut StandardParameterBuilder) {
    let Some(select) = context.as_select() else {
        return;
    };
    let Some(pagination) = &select.pagination else {
        return;
    };
    if let Some(index) = pagination.offset.and_then(|v| v.parameter_index) {
        builder.add_replaced_parameter(index, Value::from(0));
    }
    if let (Some(index), Some(revised)) = (
        pagination.row_count.and_then(|v| v.parameter_index),
        pagination.revised_row_count(select),
    ) {
        builder.add_replaced_parameter(index, Value::from(revised));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::bind;
    use serde_json::json;

    #[test]
    fn test_standard_replacements_and_removals() {
        let mut builder = StandardParameterBuilder::new(vec![json!(1), json!(2), json!(3)]);
        builder.add_replaced_parameter(2, json!(30));
        assert_eq!(builder.parameters(), vec![json!(1), json!(2), json!(30)]);
        assert_eq!(
            builder.parameters_without(&BTreeSet::from([0, 1])),
            vec![json!(30)]
        );
        assert_eq!(builder.original(), &[json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_grouped_reconstructs_original() {
        let parameters = vec![json!(1), json!("a"), json!(2), json!("b"), json!("dup")];
        let context = bind(
            "INSERT INTO t_order (order_id, name) VALUES (?, ?), (?, ?) ON DUPLICATE KEY UPDATE name = ?",
            &parameters,
        )
        .unwrap();
        let builder = GroupedParameterBuilder::new(&parameters, context.as_insert().unwrap());

        assert_eq!(builder.groups(), &[vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
        assert_eq!(builder.parameters(), parameters);
        assert_eq!(
            builder.parameters_for([1]),
            vec![json!(2), json!("b"), json!("dup")]
        );
    }
}
