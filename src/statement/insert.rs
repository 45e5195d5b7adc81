use crate::error::{ShardError, ShardResult};
use serde_json::Value;
use shardsql_parser::{Expr, ExprKind, InsertStatement, Literal, Span};

/// One VALUES row with its resolved column values.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRowContext {
    /// Row text including the parentheses.
    pub span: Span,
    /// Value per inserted column; `None` when the expression is not a constant.
    pub values: Vec<Option<Value>>,
    /// Ordinals of the parameter markers inside this row.
    pub parameter_indexes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatementContext {
    pub statement: InsertStatement,
    /// Lower-cased column list.
    pub columns: Vec<String>,
    pub rows: Vec<InsertRowContext>,
    /// Parameters ahead of the first row.
    pub before_parameters: Vec<usize>,
    /// Parameters after the last row, such as ON DUPLICATE KEY UPDATE.
    pub after_parameters: Vec<usize>,
}

impl InsertStatementContext {
    pub fn new(statement: InsertStatement, parameters: &[Value]) -> ShardResult<Self> {
        let columns: Vec<String> = statement
            .columns
            .iter()
            .map(|c| c.value.to_ascii_lowercase())
            .collect();

        let mut rows = Vec::with_capacity(statement.values.len());
        for row in &statement.values {
            if !columns.is_empty() && row.exprs.len() != columns.len() {
                return Err(ShardError::UnsupportedStatement(format!(
                    "insert row has {} values for {} columns",
                    row.exprs.len(),
                    columns.len()
                )));
            }
            let values = row
                .exprs
                .iter()
                .map(|e| constant_value(e, parameters))
                .collect::<ShardResult<Vec<_>>>()?;
            let mut parameter_indexes = Vec::new();
            for expr in &row.exprs {
                collect_parameters(expr, &mut parameter_indexes);
            }
            rows.push(InsertRowContext {
                span: row.span,
                values,
                parameter_indexes,
            });
        }

        let first_row = rows.iter().flat_map(|r| r.parameter_indexes.iter()).min().copied();
        let mut outside = Vec::new();
        for assignment in &statement.on_duplicate_key_update {
            collect_parameters(&assignment.value, &mut outside);
        }
        let (before_parameters, after_parameters): (Vec<usize>, Vec<usize>) = outside
            .into_iter()
            .partition(|index| first_row.is_some_and(|first| *index < first));

        Ok(Self {
            statement,
            columns,
            rows,
            before_parameters,
            after_parameters,
        })
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn value_of(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.values.get(index)?.as_ref()
    }

    /// Span from the first row's `(` to the last row's `)`.
    pub fn values_span(&self) -> Option<Span> {
        let first = self.rows.first()?;
        let last = self.rows.last()?;
        Some(first.span.merge(last.span))
    }
}

pub(crate) fn collect_parameters(expr: &Expr, out: &mut Vec<usize>) {
    expr.visit(&mut |e| {
        if let ExprKind::Parameter(index) = e.kind {
            out.push(index);
        }
    });
}

/// Constant value of an expression: a literal or a bound parameter.
pub(crate) fn constant_value(expr: &Expr, parameters: &[Value]) -> ShardResult<Option<Value>> {
    match &expr.kind {
        ExprKind::Literal(literal) => Ok(Some(literal_value(literal))),
        ExprKind::Parameter(index) => parameters
            .get(*index)
            .cloned()
            .map(Some)
            .ok_or(ShardError::ParameterIndexOutOfRange {
                index: *index,
                count: parameters.len(),
            }),
        ExprKind::Nested(inner) => constant_value(inner, parameters),
        _ => Ok(None),
    }
}

pub(crate) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(n) => Value::from(*n),
        Literal::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shardsql_parser::{parse, Statement};

    fn context(sql: &str, parameters: &[Value]) -> ShardResult<InsertStatementContext> {
        let Statement::Insert(insert) = parse(sql).unwrap() else {
            panic!("not an insert");
        };
        InsertStatementContext::new(insert, parameters)
    }

    #[test]
    fn test_rows_and_parameter_groups() {
        let sql = "INSERT INTO t_order (order_id, user_id, status) VALUES (?, ?, 'new'), (?, 11, ?) ON DUPLICATE KEY UPDATE status = ?";
        let ctx = context(
            sql,
            &[json!(1), json!(10), json!(2), json!("paid"), json!("dup")],
        )
        .unwrap();

        assert_eq!(ctx.columns, vec!["order_id", "user_id", "status"]);
        assert_eq!(ctx.rows[0].parameter_indexes, vec![0, 1]);
        assert_eq!(ctx.rows[1].parameter_indexes, vec![2, 3]);
        assert!(ctx.before_parameters.is_empty());
        assert_eq!(ctx.after_parameters, vec![4]);

        assert_eq!(ctx.value_of(0, "USER_ID"), Some(&json!(10)));
        assert_eq!(ctx.value_of(1, "user_id"), Some(&json!(11)));
        assert_eq!(ctx.value_of(0, "status"), Some(&json!("new")));
        assert_eq!(
            ctx.values_span().unwrap().text(sql),
            "(?, ?, 'new'), (?, 11, ?)"
        );
    }

    #[test]
    fn test_non_constant_values() {
        let ctx = context("INSERT INTO t (id, at) VALUES (1, NOW())", &[]).unwrap();
        assert_eq!(ctx.value_of(0, "at"), None);
        assert_eq!(ctx.value_of(0, "missing"), None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            context("INSERT INTO t (id) VALUES (?)", &[]),
            Err(ShardError::ParameterIndexOutOfRange { index: 0, count: 0 })
        ));
        assert!(matches!(
            context("INSERT INTO t (id, name) VALUES (1)", &[]),
            Err(ShardError::UnsupportedStatement(_))
        ));
    }
}
