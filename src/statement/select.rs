//! Select statement context: derived projections and pagination.

use crate::error::{ShardError, ShardResult};
use crate::route::value::value_as_i64;
use crate::statement::tables::TablesContext;
use serde_json::Value;
use shardsql_parser::{
    ExprKind, Literal, LimitValue, LimitValueKind, OrderByItem, Projection, QuoteCharacter,
    SelectStatement, Span, AggregationType,
};

/// SQL text with holes where a logical table name must be substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePiece {
    Text(String),
    Table {
        logic_table: String,
        quote: QuoteCharacter,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlTemplate {
    pieces: Vec<TemplatePiece>,
}

impl SqlTemplate {
    /// Template of the source text under `span`.
    pub fn from_span(sql: &str, span: Span, tables: &TablesContext) -> Self {
        let mut pieces = Vec::new();
        let mut cursor = span.start;
        for reference in tables.references().iter().filter(|r| span.contains(&r.span)) {
            if reference.span.start < cursor {
                continue;
            }
            if reference.span.start > cursor {
                pieces.push(TemplatePiece::Text(
                    Span::new(cursor, reference.span.start).text(sql).to_string(),
                ));
            }
            pieces.push(TemplatePiece::Table {
                logic_table: reference.logic_table.clone(),
                quote: reference.quote,
            });
            cursor = reference.span.stop;
        }
        if cursor < span.stop {
            pieces.push(TemplatePiece::Text(Span::new(cursor, span.stop).text(sql).to_string()));
        }
        Self { pieces }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            pieces: vec![TemplatePiece::Text(text.into())],
        }
    }

    pub fn push_text(&mut self, text: &str) {
        self.pieces.push(TemplatePiece::Text(text.to_string()));
    }

    pub fn append(&mut self, other: &SqlTemplate) {
        self.pieces.extend(other.pieces.iter().cloned());
    }

    /// Render with `actual` mapping a logical table to its actual name.
    pub fn render<F>(&self, mut actual: F) -> ShardResult<String>
    where
        F: FnMut(&str) -> ShardResult<String>,
    {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                TemplatePiece::Text(text) => out.push_str(text),
                TemplatePiece::Table { logic_table, quote } => {
                    out.push_str(&quote.wrap(&actual(logic_table)?))
                }
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    AvgCount,
    AvgSum,
    OrderBy,
    GroupBy,
}

/// A projection appended to the select list so results can be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedProjection {
    pub kind: DerivedKind,
    pub alias: String,
    pub expression: SqlTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationValue {
    pub span: Span,
    pub value: i64,
    pub parameter_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationContext {
    pub offset: Option<PaginationValue>,
    pub row_count: Option<PaginationValue>,
}

impl PaginationContext {
    pub fn actual_offset(&self) -> i64 {
        self.offset.map(|v| v.value).unwrap_or(0)
    }

    /// Row count every shard must return so the merged page is complete.
    pub fn revised_row_count(&self, select: &SelectStatementContext) -> Option<i64> {
        let row_count = self.row_count?;
        if select.is_max_row_count() {
            Some(i32::MAX as i64)
        } else {
            Some(self.actual_offset().saturating_add(row_count.value))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatementContext {
    pub statement: SelectStatement,
    pub derived_projections: Vec<DerivedProjection>,
    pub pagination: Option<PaginationContext>,
    pub contains_subquery: bool,
}

impl SelectStatementContext {
    pub fn new(
        sql: &str,
        statement: SelectStatement,
        tables: &TablesContext,
        parameters: &[Value],
        contains_subquery: bool,
    ) -> ShardResult<Self> {
        let derived_projections = derive_projections(sql, &statement, tables);
        let pagination = match &statement.limit {
            Some(limit) => Some(PaginationContext {
                offset: limit
                    .offset
                    .map(|v| pagination_value(v, parameters))
                    .transpose()?,
                row_count: limit
                    .row_count
                    .map(|v| pagination_value(v, parameters))
                    .transpose()?,
            }),
            None => None,
        };

        Ok(Self {
            statement,
            derived_projections,
            pagination,
            contains_subquery,
        })
    }

    pub fn has_aggregation(&self) -> bool {
        self.statement
            .projections
            .items
            .iter()
            .any(|p| matches!(p, Projection::Aggregation { .. }))
    }

    pub fn is_same_group_by_and_order_by(&self) -> bool {
        let select = &self.statement;
        select.order_by.is_empty()
            || (select.group_by.len() == select.order_by.len()
                && select
                    .group_by
                    .iter()
                    .zip(&select.order_by)
                    .all(|(g, o)| g.descending == o.descending && same_item(g, o)))
    }

    fn is_max_row_count(&self) -> bool {
        !self.statement.group_by.is_empty() && !self.is_same_group_by_and_order_by()
    }

    /// Nothing to merge beyond concatenating rows.
    pub fn is_plain(&self) -> bool {
        let select = &self.statement;
        !self.contains_subquery
            && !select.distinct
            && select.group_by.is_empty()
            && select.order_by.is_empty()
            && select.limit.is_none()
            && !self.has_aggregation()
    }
}

fn same_item(a: &OrderByItem, b: &OrderByItem) -> bool {
    match (a.expr.as_column(), b.expr.as_column()) {
        (Some(a), Some(b)) => {
            a.name.eq_ignore_case(&b.name.value)
                && match (&a.owner, &b.owner) {
                    (Some(x), Some(y)) => x.eq_ignore_case(&y.value),
                    _ => true,
                }
        }
        _ => false,
    }
}

fn pagination_value(value: LimitValue, parameters: &[Value]) -> ShardResult<PaginationValue> {
    match value.kind {
        LimitValueKind::Literal(n) => Ok(PaginationValue {
            span: value.span,
            value: n,
            parameter_index: None,
        }),
        LimitValueKind::Parameter(index) => {
            let parameter = parameters
                .get(index)
                .ok_or(ShardError::ParameterIndexOutOfRange {
                    index,
                    count: parameters.len(),
                })?;
            let n = value_as_i64(parameter).ok_or_else(|| {
                ShardError::InvalidShardingValue(format!(
                    "pagination parameter {} is not an integer: {}",
                    index, parameter
                ))
            })?;
            Ok(PaginationValue {
                span: value.span,
                value: n,
                parameter_index: Some(index),
            })
        }
    }
}

/// Whitespace-free lower-cased text, used to compare expressions.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn derive_projections(
    sql: &str,
    select: &SelectStatement,
    tables: &TablesContext,
) -> Vec<DerivedProjection> {
    let mut derived = Vec::new();

    let mut avg_index = 0usize;
    for projection in &select.projections.items {
        let Projection::Aggregation {
            function: AggregationType::Avg,
            distinct,
            argument: Some(argument),
            ..
        } = projection
        else {
            continue;
        };
        let argument = SqlTemplate::from_span(sql, argument.span, tables);
        for (kind, function, prefix) in [
            (DerivedKind::AvgCount, "COUNT", "AVG_DERIVED_COUNT_"),
            (DerivedKind::AvgSum, "SUM", "AVG_DERIVED_SUM_"),
        ] {
            let mut expression = SqlTemplate::text(format!(
                "{}({}",
                function,
                if *distinct { "DISTINCT " } else { "" }
            ));
            expression.append(&argument);
            expression.push_text(")");
            derived.push(DerivedProjection {
                kind,
                alias: format!("{}{}", prefix, avg_index),
                expression,
            });
        }
        avg_index += 1;
    }

    let mut appended: Vec<String> = Vec::new();
    for (items, kind, prefix) in [
        (&select.order_by, DerivedKind::OrderBy, "ORDER_BY_DERIVED_"),
        (&select.group_by, DerivedKind::GroupBy, "GROUP_BY_DERIVED_"),
    ] {
        let mut index = 0usize;
        for item in items {
            let text = normalize(item.expr.span.text(sql));
            if appended.contains(&text) || is_projected(sql, select, tables, item) {
                continue;
            }
            appended.push(text);
            derived.push(DerivedProjection {
                kind,
                alias: format!("{}{}", prefix, index),
                expression: SqlTemplate::from_span(sql, item.expr.span, tables),
            });
            index += 1;
        }
    }

    derived
}

/// Whether the select list already returns the value of an ORDER BY or GROUP BY item.
fn is_projected(
    sql: &str,
    select: &SelectStatement,
    tables: &TablesContext,
    item: &OrderByItem,
) -> bool {
    // positional reference such as ORDER BY 1
    if matches!(item.expr.kind, ExprKind::Literal(Literal::Integer(_))) {
        return true;
    }

    let item_text = normalize(item.expr.span.text(sql));
    select.projections.items.iter().any(|projection| {
        if projection
            .alias()
            .is_some_and(|alias| normalize(&alias.value) == item_text)
        {
            return true;
        }
        match (projection, item.expr.as_column()) {
            (Projection::Star { owner: None, .. }, _) => true,
            (Projection::Star { owner: Some(owner), .. }, Some(column)) => match &column.owner {
                Some(column_owner) => column_owner.eq_ignore_case(&owner.value),
                None => tables.table_names().len() == 1,
            },
            (Projection::Column { column: projected, .. }, Some(column)) => {
                projected.name.eq_ignore_case(&column.name.value)
                    && match (&projected.owner, &column.owner) {
                        (Some(a), Some(b)) => a.eq_ignore_case(&b.value),
                        _ => true,
                    }
            }
            (projection, _) => {
                let span = match projection {
                    Projection::Expression { expr, .. } => expr.span,
                    other => other.span(),
                };
                normalize(span.text(sql)) == item_text
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::tables::TableCollector;
    use serde_json::json;
    use shardsql_parser::{parse, Statement};

    fn context(sql: &str, parameters: &[Value]) -> SelectStatementContext {
        let Statement::Select(select) = parse(sql).unwrap() else {
            panic!("not a select");
        };
        let mut collector = TableCollector::default();
        collector.select(&select);
        let contains_subquery = collector.contains_subquery;
        let tables = collector.into_context();
        SelectStatementContext::new(sql, select, &tables, parameters, contains_subquery).unwrap()
    }

    fn render(template: &SqlTemplate) -> String {
        template.render(|t| Ok(format!("{}_0", t))).unwrap()
    }

    #[test]
    fn test_avg_derives_count_and_sum() {
        let ctx = context("SELECT AVG(t_order.price) FROM t_order", &[]);
        let derived: Vec<(String, String)> = ctx
            .derived_projections
            .iter()
            .map(|d| (render(&d.expression), d.alias.clone()))
            .collect();
        assert_eq!(
            derived,
            vec![
                ("COUNT(t_order_0.price)".to_string(), "AVG_DERIVED_COUNT_0".to_string()),
                ("SUM(t_order_0.price)".to_string(), "AVG_DERIVED_SUM_0".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_by_derivation() {
        let ctx = context("SELECT order_id FROM t_order ORDER BY user_id, order_id", &[]);
        assert_eq!(ctx.derived_projections.len(), 1);
        assert_eq!(ctx.derived_projections[0].alias, "ORDER_BY_DERIVED_0");
        assert_eq!(render(&ctx.derived_projections[0].expression), "user_id");

        let ctx = context("SELECT * FROM t_order ORDER BY user_id", &[]);
        assert!(ctx.derived_projections.is_empty());

        let ctx = context("SELECT order_id AS oid FROM t_order ORDER BY oid", &[]);
        assert!(ctx.derived_projections.is_empty());
    }

    #[test]
    fn test_group_by_not_derived_twice() {
        let ctx = context(
            "SELECT COUNT(*) FROM t_order GROUP BY user_id ORDER BY user_id",
            &[],
        );
        let aliases: Vec<&str> = ctx
            .derived_projections
            .iter()
            .map(|d| d.alias.as_str())
            .collect();
        assert_eq!(aliases, vec!["ORDER_BY_DERIVED_0"]);
        assert!(ctx.is_same_group_by_and_order_by());
    }

    #[test]
    fn test_pagination_resolution() {
        let ctx = context(
            "SELECT * FROM t_order ORDER BY order_id LIMIT ?, ?",
            &[json!(10), json!(5)],
        );
        let pagination = ctx.pagination.unwrap();
        assert_eq!(pagination.actual_offset(), 10);
        assert_eq!(pagination.revised_row_count(&ctx), Some(15));
        assert_eq!(pagination.offset.unwrap().parameter_index, Some(0));

        let ctx = context(
            "SELECT user_id, COUNT(*) FROM t_order GROUP BY user_id ORDER BY COUNT(*) LIMIT 5",
            &[],
        );
        let pagination = ctx.pagination.unwrap();
        assert_eq!(pagination.revised_row_count(&ctx), Some(i32::MAX as i64));
    }

    #[test]
    fn test_pagination_parameter_out_of_range() {
        let Statement::Select(select) = parse("SELECT * FROM t LIMIT ?").unwrap() else {
            panic!("not a select");
        };
        let err = SelectStatementContext::new(
            "SELECT * FROM t LIMIT ?",
            select,
            &TablesContext::default(),
            &[],
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShardError::ParameterIndexOutOfRange { index: 0, count: 0 }
        ));
    }

    #[test]
    fn test_plain_select() {
        assert!(context("SELECT * FROM t_order WHERE user_id = 1", &[]).is_plain());
        assert!(!context("SELECT DISTINCT user_id FROM t_order", &[]).is_plain());
        assert!(!context("SELECT COUNT(*) FROM t_order", &[]).is_plain());
    }
}
