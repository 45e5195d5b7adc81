//! Sharding value extraction from predicate trees.
//!
//! Extraction fails open: anything that cannot be proven to constrain a
//! sharding column yields [`Extracted::Absent`], which routes to every target.

use crate::error::ShardResult;
use crate::route::value::{ColumnValues, ShardingValue, ValueRange};
use crate::rule::ShardingRule;
use crate::statement::insert::constant_value;
use crate::statement::SqlStatementContext;
use serde_json::Value;
use shardsql_parser::{BinaryOperator, Expr, ExprKind};

/// Outcome of extracting one column from a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The predicate does not constrain the column.
    Absent,
    /// No row can satisfy the predicate.
    AlwaysFalse,
    Value(ShardingValue),
}

impl Extracted {
    fn and(self, other: Extracted) -> Extracted {
        match (self, other) {
            (Extracted::AlwaysFalse, _) | (_, Extracted::AlwaysFalse) => Extracted::AlwaysFalse,
            (Extracted::Absent, other) | (other, Extracted::Absent) => other,
            (Extracted::Value(a), Extracted::Value(b)) => match a.intersect(&b) {
                Some(value) => Extracted::Value(value),
                None => Extracted::AlwaysFalse,
            },
        }
    }

    fn or(self, other: Extracted) -> Extracted {
        match (self, other) {
            (Extracted::AlwaysFalse, other) | (other, Extracted::AlwaysFalse) => other,
            (Extracted::Absent, _) | (_, Extracted::Absent) => Extracted::Absent,
            (Extracted::Value(a), Extracted::Value(b)) => match a.union(&b) {
                Some(value) => Extracted::Value(value),
                None => Extracted::Absent,
            },
        }
    }
}

pub struct ShardingValueExtractor<'a> {
    context: &'a SqlStatementContext,
    rule: &'a ShardingRule,
    parameters: &'a [Value],
}

impl<'a> ShardingValueExtractor<'a> {
    pub fn new(
        context: &'a SqlStatementContext,
        rule: &'a ShardingRule,
        parameters: &'a [Value],
    ) -> Self {
        Self {
            context,
            rule,
            parameters,
        }
    }

    /// Constraint on `table.column` implied by all WHERE and ON conditions.
    pub fn extract(&self, table: &str, column: &str) -> ShardResult<Extracted> {
        let mut result = Extracted::Absent;
        for condition in self.context.where_conditions() {
            result = result.and(self.extract_expr(condition, table, column)?);
        }
        Ok(result)
    }

    /// Values of every sharding column of `table`; `None` when the
    /// predicate can never hold.
    pub fn column_values(&self, table: &str) -> ShardResult<Option<ColumnValues>> {
        let mut values = ColumnValues::new();
        for column in self.rule.sharding_columns(table) {
            match self.extract(table, &column)? {
                Extracted::Absent => {}
                Extracted::AlwaysFalse => return Ok(None),
                Extracted::Value(value) => {
                    values.insert(column, value);
                }
            }
        }
        Ok(Some(values))
    }

    /// Values of every sharding column of `table` for one INSERT row.
    pub fn insert_row_values(&self, table: &str, row: usize) -> ColumnValues {
        let mut values = ColumnValues::new();
        let Some(insert) = self.context.as_insert() else {
            return values;
        };
        for column in self.rule.sharding_columns(table) {
            if let Some(value) = insert.value_of(row, &column) {
                values.insert(
                    column.clone(),
                    ShardingValue::list(column, vec![value.clone()]),
                );
            }
        }
        values
    }

    fn extract_expr(&self, expr: &Expr, table: &str, column: &str) -> ShardResult<Extracted> {
        match &expr.kind {
            ExprKind::Nested(inner) => self.extract_expr(inner, table, column),
            ExprKind::Binary {
                left,
                op: BinaryOperator::And,
                right,
            } => Ok(self
                .extract_expr(left, table, column)?
                .and(self.extract_expr(right, table, column)?)),
            ExprKind::Binary {
                left,
                op: BinaryOperator::Or,
                right,
            } => Ok(self
                .extract_expr(left, table, column)?
                .or(self.extract_expr(right, table, column)?)),
            ExprKind::Binary { left, op, right } => {
                let (op, operand) = if self.is_column(left, table, column) {
                    (*op, right)
                } else if self.is_column(right, table, column) {
                    (op.flip(), left)
                } else {
                    return Ok(Extracted::Absent);
                };
                let Some(value) = self.constant(operand)? else {
                    return Ok(Extracted::Absent);
                };
                let range = match op {
                    BinaryOperator::Eq => {
                        return Ok(Extracted::Value(ShardingValue::list(column, vec![value])))
                    }
                    BinaryOperator::Lt => ValueRange::less_than(value),
                    BinaryOperator::LtEq => ValueRange::at_most(value),
                    BinaryOperator::Gt => ValueRange::greater_than(value),
                    BinaryOperator::GtEq => ValueRange::at_least(value),
                    _ => return Ok(Extracted::Absent),
                };
                Ok(Extracted::Value(ShardingValue::range(column, range)))
            }
            ExprKind::InList {
                expr: target,
                list,
                negated: false,
            } if self.is_column(target, table, column) => {
                let mut values = Vec::with_capacity(list.len());
                for item in list {
                    match self.constant(item)? {
                        Some(value) => values.push(value),
                        None => return Ok(Extracted::Absent),
                    }
                }
                Ok(Extracted::Value(ShardingValue::list(column, values)))
            }
            ExprKind::Between {
                expr: target,
                low,
                high,
                negated: false,
            } if self.is_column(target, table, column) => {
                match (self.constant(low)?, self.constant(high)?) {
                    (Some(low), Some(high)) => Ok(Extracted::Value(ShardingValue::range(
                        column,
                        ValueRange::closed(low, high),
                    ))),
                    _ => Ok(Extracted::Absent),
                }
            }
            _ => Ok(Extracted::Absent),
        }
    }

    fn is_column(&self, expr: &Expr, table: &str, column: &str) -> bool {
        let Some(column_ref) = expr.as_column() else {
            return false;
        };
        column_ref.name.eq_ignore_case(column)
            && self
                .context
                .tables()
                .find_table_name(column_ref, self.rule)
                .is_some_and(|t| t.eq_ignore_ascii_case(table))
    }

    /// Literal or bound parameter; NULL never identifies a shard.
    fn constant(&self, expr: &Expr) -> ShardResult<Option<Value>> {
        Ok(constant_value(expr, self.parameters)?.filter(|v| !v.is_null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShardError;
    use crate::rule::{DataNode, ShardingStrategy, StandardAlgorithm, TableRule};
    use crate::statement::bind;
    use serde_json::json;

    fn rule() -> ShardingRule {
        let nodes = (0..2).map(|i| DataNode::new("ds_0", format!("t_order_{}", i))).collect();
        ShardingRule::builder()
            .table_rule(TableRule::new("t_order", nodes).unwrap().with_table_strategy(
                ShardingStrategy::Standard {
                    column: "order_id".to_string(),
                    precise: StandardAlgorithm::Mod { sharding_count: 2 },
                    range: None,
                },
            ))
            .build()
            .unwrap()
    }

    fn extract(sql: &str, parameters: &[Value]) -> ShardResult<Extracted> {
        let rule = rule();
        let context = bind(sql, parameters)?;
        ShardingValueExtractor::new(&context, &rule, parameters).extract("t_order", "order_id")
    }

    fn list(values: Vec<Value>) -> Extracted {
        Extracted::Value(ShardingValue::list("order_id", values))
    }

    #[test]
    fn test_equality_and_in() {
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id = ?", &[json!(7)]).unwrap(),
            list(vec![json!(7)])
        );
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id IN (1, 2, 2)", &[]).unwrap(),
            list(vec![json!(1), json!(2)])
        );
        assert_eq!(
            extract("SELECT * FROM t_order o WHERE o.order_id = 3", &[]).unwrap(),
            list(vec![json!(3)])
        );
    }

    #[test]
    fn test_ranges_and_flipped_operands() {
        assert_eq!(
            extract("SELECT * FROM t_order WHERE 5 < order_id", &[]).unwrap(),
            Extracted::Value(ShardingValue::range(
                "order_id",
                ValueRange::greater_than(json!(5))
            ))
        );
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id BETWEEN 1 AND 3", &[]).unwrap(),
            Extracted::Value(ShardingValue::range(
                "order_id",
                ValueRange::closed(json!(1), json!(3))
            ))
        );
    }

    #[test]
    fn test_and_intersects() {
        assert_eq!(
            extract(
                "SELECT * FROM t_order WHERE order_id IN (1, 2, 3) AND order_id >= 2",
                &[]
            )
            .unwrap(),
            list(vec![json!(2), json!(3)])
        );
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id = 1 AND order_id = 2", &[]).unwrap(),
            Extracted::AlwaysFalse
        );
    }

    #[test]
    fn test_or_unions_or_fails_open() {
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id = 1 OR order_id = 2", &[]).unwrap(),
            list(vec![json!(1), json!(2)])
        );
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id = 1 OR status = 'x'", &[]).unwrap(),
            Extracted::Absent
        );
        assert_eq!(
            extract("SELECT * FROM t_order WHERE order_id = 1 OR order_id > 5", &[]).unwrap(),
            Extracted::Absent
        );
    }

    #[test]
    fn test_unsupported_predicates_are_absent() {
        for sql in [
            "SELECT * FROM t_order WHERE order_id <> 1",
            "SELECT * FROM t_order WHERE NOT order_id = 1",
            "SELECT * FROM t_order WHERE order_id NOT IN (1, 2)",
            "SELECT * FROM t_order WHERE order_id LIKE '1%'",
            "SELECT * FROM t_order WHERE order_id IS NULL",
            "SELECT * FROM t_order WHERE ABS(order_id) = 1",
            "SELECT * FROM t_order WHERE order_id = user_id",
            "SELECT * FROM t_order WHERE order_id IN (SELECT order_id FROM t_order_item)",
        ] {
            assert_eq!(extract(sql, &[]).unwrap(), Extracted::Absent, "{}", sql);
        }
    }

    #[test]
    fn test_parameter_out_of_range() {
        let err = extract("SELECT * FROM t_order WHERE order_id = ?", &[]).unwrap_err();
        assert!(matches!(
            err,
            ShardError::ParameterIndexOutOfRange { index: 0, count: 0 }
        ));
    }
}
