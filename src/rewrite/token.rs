use crate::error::{ShardError, ShardResult};
use crate::route::RouteUnit;
use crate::rule::DataNode;
use crate::statement::DerivedProjection;
use shardsql_parser::{QuoteCharacter, Span};

/// One VALUES row and the data nodes it was routed to.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertValuesRow {
    pub text: String,
    pub data_nodes: Vec<DataNode>,
}

/// One item of a sharding column IN list.
#[derive(Debug, Clone, PartialEq)]
pub struct InPredicateItem {
    pub text: String,
    /// Parameter markers inside the item.
    pub parameter_indexes: Vec<usize>,
    /// Data nodes the value routes to; `None` when it could not be routed.
    pub data_nodes: Option<Vec<DataNode>>,
}

impl InPredicateItem {
    fn routes_to(&self, unit: &RouteUnit, logic_table: &str) -> bool {
        match &self.data_nodes {
            Some(nodes) => nodes.iter().any(|n| unit.contains_data_node(n, logic_table)),
            None => true,
        }
    }
}

/// A rewrite anchored at a span of the original SQL.
///
/// A zero-width span is an insertion point.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlToken {
    Table {
        span: Span,
        logic_table: String,
        quote: QuoteCharacter,
    },
    Projections {
        span: Span,
        derived: Vec<DerivedProjection>,
    },
    PaginationOffset {
        span: Span,
        revised: i64,
    },
    PaginationRowCount {
        span: Span,
        revised: i64,
    },
    InsertValues {
        span: Span,
        logic_table: String,
        rows: Vec<InsertValuesRow>,
    },
    Index {
        span: Span,
        index: String,
        quote: QuoteCharacter,
        logic_table: String,
    },
    /// Items of an IN list on a sharding column, narrowed per unit.
    InPredicate {
        span: Span,
        logic_table: String,
        items: Vec<InPredicateItem>,
    },
}

fn actual_table<'u>(unit: &'u RouteUnit, logic_table: &str) -> ShardResult<&'u str> {
    unit.actual_table(logic_table).ok_or_else(|| {
        ShardError::InternalConsistency(format!(
            "no actual table for '{}' in route unit on '{}'",
            logic_table,
            unit.data_source_name()
        ))
    })
}

impl SqlToken {
    pub fn span(&self) -> Span {
        match self {
            SqlToken::Table { span, .. }
            | SqlToken::Projections { span, .. }
            | SqlToken::PaginationOffset { span, .. }
            | SqlToken::PaginationRowCount { span, .. }
            | SqlToken::InsertValues { span, .. }
            | SqlToken::Index { span, .. }
            | SqlToken::InPredicate { span, .. } => *span,
        }
    }

    pub fn to_text(&self, unit: &RouteUnit) -> ShardResult<String> {
        match self {
            SqlToken::Table {
                logic_table, quote, ..
            } => Ok(quote.wrap(actual_table(unit, logic_table)?)),
            SqlToken::Projections { derived, .. } => {
                let mut out = String::new();
                for projection in derived {
                    let expression = projection
                        .expression
                        .render(|t| actual_table(unit, t).map(str::to_string))?;
                    out.push_str(&format!(", {} AS {}", expression, projection.alias));
                }
                Ok(out)
            }
            SqlToken::PaginationOffset { revised, .. }
            | SqlToken::PaginationRowCount { revised, .. } => Ok(revised.to_string()),
            SqlToken::InsertValues {
                logic_table, rows, ..
            } => {
                let texts: Vec<&str> = rows
                    .iter()
                    .filter(|row| {
                        row.data_nodes
                            .iter()
                            .any(|node| unit.contains_data_node(node, logic_table))
                    })
                    .map(|row| row.text.as_str())
                    .collect();
                if texts.is_empty() {
                    return Err(ShardError::InternalConsistency(format!(
                        "no insert row routes to '{}'",
                        unit.data_source_name()
                    )));
                }
                Ok(texts.join(", "))
            }
            SqlToken::Index {
                index,
                quote,
                logic_table,
                ..
            } => Ok(quote.wrap(&format!(
                "{}_{}",
                index,
                actual_table(unit, logic_table)?
            ))),
            SqlToken::InPredicate {
                logic_table, items, ..
            } => {
                let kept = retained_items(items, unit, logic_table);
                let texts: Vec<&str> = items
                    .iter()
                    .zip(&kept)
                    .filter(|(_, keep)| **keep)
                    .map(|(item, _)| item.text.as_str())
                    .collect();
                Ok(texts.join(", "))
            }
        }
    }

    /// Original parameter indexes this token drops for `unit`.
    pub fn removed_parameters(&self, unit: &RouteUnit) -> Vec<usize> {
        match self {
            SqlToken::InPredicate {
                logic_table, items, ..
            } => {
                let kept = retained_items(items, unit, logic_table);
                items
                    .iter()
                    .zip(kept)
                    .filter(|(_, keep)| !keep)
                    .flat_map(|(item, _)| item.parameter_indexes.iter().copied())
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Items routed to `unit`; every item when none is, so the list never empties.
fn retained_items(items: &[InPredicateItem], unit: &RouteUnit, logic_table: &str) -> Vec<bool> {
    let kept: Vec<bool> = items.iter().map(|i| i.routes_to(unit, logic_table)).collect();
    if kept.iter().any(|k| *k) {
        kept
    } else {
        vec![true; items.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_and_index_text() {
        let unit = RouteUnit::new("ds_0").with_table("t_order", "t_order_1");
        let table = SqlToken::Table {
            span: Span::new(0, 7),
            logic_table: "t_order".to_string(),
            quote: QuoteCharacter::Backtick,
        };
        assert_eq!(table.to_text(&unit).unwrap(), "`t_order_1`");

        let index = SqlToken::Index {
            span: Span::new(0, 6),
            index: "idx_id".to_string(),
            quote: QuoteCharacter::None,
            logic_table: "t_order".to_string(),
        };
        assert_eq!(index.to_text(&unit).unwrap(), "idx_id_t_order_1");
    }

    #[test]
    fn test_missing_mapper_is_internal_error() {
        let unit = RouteUnit::new("ds_0");
        let table = SqlToken::Table {
            span: Span::new(0, 7),
            logic_table: "t_order".to_string(),
            quote: QuoteCharacter::None,
        };
        assert!(matches!(
            table.to_text(&unit),
            Err(ShardError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_in_predicate_narrowed_per_unit() {
        let item = |text: &str, index: usize, node: Option<&str>| InPredicateItem {
            text: text.to_string(),
            parameter_indexes: vec![index],
            data_nodes: node.map(|n| vec![DataNode::parse(n).unwrap()]),
        };
        let token = SqlToken::InPredicate {
            span: Span::new(0, 7),
            logic_table: "t_order".to_string(),
            items: vec![
                item("?", 1, Some("ds_0.t_order_1")),
                item("?", 2, Some("ds_0.t_order_0")),
                item("?", 3, None),
            ],
        };

        let unit = RouteUnit::new("ds_0").with_table("t_order", "t_order_0");
        assert_eq!(token.to_text(&unit).unwrap(), "?, ?");
        assert_eq!(token.removed_parameters(&unit), vec![1]);

        let elsewhere = RouteUnit::new("ds_1").with_table("t_order", "t_order_0");
        assert_eq!(token.to_text(&elsewhere).unwrap(), "?");
        assert_eq!(token.removed_parameters(&elsewhere), vec![1, 2]);
    }

    #[test]
    fn test_in_predicate_keeps_everything_when_nothing_routes_here() {
        let token = SqlToken::InPredicate {
            span: Span::new(0, 4),
            logic_table: "t_order".to_string(),
            items: vec![
                InPredicateItem {
                    text: "1".to_string(),
                    parameter_indexes: Vec::new(),
                    data_nodes: Some(vec![DataNode::new("ds_0", "t_order_1")]),
                },
                InPredicateItem {
                    text: "3".to_string(),
                    parameter_indexes: Vec::new(),
                    data_nodes: Some(vec![DataNode::new("ds_0", "t_order_1")]),
                },
            ],
        };
        let unit = RouteUnit::new("ds_0").with_table("t_order", "t_order_0");
        assert_eq!(token.to_text(&unit).unwrap(), "1, 3");
        assert!(token.removed_parameters(&unit).is_empty());
    }

    #[test]
    fn test_insert_values_keep_routed_rows() {
        let unit = RouteUnit::new("ds_1").with_table("t_order", "t_order_0");
        let token = SqlToken::InsertValues {
            span: Span::new(0, 0),
            logic_table: "t_order".to_string(),
            rows: vec![
                InsertValuesRow {
                    text: "(1, 'a')".to_string(),
                    data_nodes: vec![DataNode::new("ds_1", "t_order_0")],
                },
                InsertValuesRow {
                    text: "(2, 'b')".to_string(),
                    data_nodes: vec![DataNode::new("ds_0", "t_order_0")],
                },
                InsertValuesRow {
                    text: "(3, 'c')".to_string(),
                    data_nodes: vec![DataNode::new("ds_1", "t_order_0")],
                },
            ],
        };
        assert_eq!(token.to_text(&unit).unwrap(), "(1, 'a'), (3, 'c')");
    }
}
