//! Token generators, one per clause kind.

use crate::error::{ShardError, ShardResult};
use crate::rewrite::token::{InPredicateItem, InsertValuesRow, SqlToken};
use crate::route::engine::route_table;
use crate::route::{ColumnValues, HintValueContext, RouteContext, ShardingValue};
use crate::rule::ShardingRule;
use crate::statement::insert::{collect_parameters, constant_value};
use crate::statement::{BoundStatement, PaginationValue, SqlStatementContext};
use serde_json::Value;
use shardsql_parser::{BinaryOperator, Expr, ExprKind, Span};

/// Everything a generator reads.
pub struct TokenInput<'a> {
    pub context: &'a SqlStatementContext,
    pub route: &'a RouteContext,
    pub rule: &'a ShardingRule,
    pub parameters: &'a [Value],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenGenerator {
    Table,
    Projections,
    PaginationOffset,
    PaginationRowCount,
    InsertValues,
    Index,
    InPredicate,
}

impl TokenGenerator {
    pub const ALL: [TokenGenerator; 7] = [
        TokenGenerator::Table,
        TokenGenerator::Projections,
        TokenGenerator::PaginationOffset,
        TokenGenerator::PaginationRowCount,
        TokenGenerator::InsertValues,
        TokenGenerator::Index,
        TokenGenerator::InPredicate,
    ];

    pub fn is_applicable(&self, input: &TokenInput<'_>) -> bool {
        let (context, route) = (input.context, input.route);
        match self {
            TokenGenerator::Table => !context.tables().references().is_empty(),
            TokenGenerator::Projections => context
                .as_select()
                .is_some_and(|s| !s.derived_projections.is_empty()),
            TokenGenerator::PaginationOffset => {
                !route.is_single_routing()
                    && literal_pagination(context, |p| p.offset).is_some()
            }
            TokenGenerator::PaginationRowCount => {
                !route.is_single_routing()
                    && literal_pagination(context, |p| p.row_count).is_some()
            }
            TokenGenerator::InsertValues => context
                .as_insert()
                .is_some_and(|i| !i.rows.is_empty() && !route.original_data_nodes().is_empty()),
            TokenGenerator::Index => matches!(
                context.statement(),
                BoundStatement::Ddl(ddl) if ddl.index.is_some()
            ) && !context.tables().is_empty(),
            TokenGenerator::InPredicate => {
                !route.is_single_routing()
                    && context
                        .as_select()
                        .is_some_and(|s| s.statement.where_clause.is_some())
            }
        }
    }

    pub fn generate(&self, input: &TokenInput<'_>) -> ShardResult<Vec<SqlToken>> {
        let (context, route) = (input.context, input.route);
        let tokens = match self {
            TokenGenerator::Table => context
                .tables()
                .references()
                .iter()
                .map(|r| SqlToken::Table {
                    span: r.span,
                    logic_table: r.logic_table.clone(),
                    quote: r.quote,
                })
                .collect(),
            TokenGenerator::Projections => match context.as_select() {
                Some(select) => vec![SqlToken::Projections {
                    span: Span::point(select.statement.projections.span.stop),
                    derived: select.derived_projections.clone(),
                }],
                None => Vec::new(),
            },
            TokenGenerator::PaginationOffset => literal_pagination(context, |p| p.offset)
                .map(|value| SqlToken::PaginationOffset {
                    span: value.span,
                    revised: 0,
                })
                .into_iter()
                .collect(),
            TokenGenerator::PaginationRowCount => {
                let revised = context.as_select().and_then(|select| {
                    select
                        .pagination
                        .as_ref()
                        .and_then(|p| p.revised_row_count(select))
                });
                match (literal_pagination(context, |p| p.row_count), revised) {
                    (Some(value), Some(revised)) => vec![SqlToken::PaginationRowCount {
                        span: value.span,
                        revised,
                    }],
                    _ => Vec::new(),
                }
            }
            TokenGenerator::InsertValues => match (context.as_insert(), context.tables().table_names().first()) {
                (Some(insert), Some(logic_table)) => match insert.values_span() {
                    Some(span) => vec![SqlToken::InsertValues {
                        span,
                        logic_table: logic_table.clone(),
                        rows: insert
                            .rows
                            .iter()
                            .zip(route.original_data_nodes())
                            .map(|(row, nodes)| InsertValuesRow {
                                text: row.span.text(context.sql()).to_string(),
                                data_nodes: nodes.clone(),
                            })
                            .collect(),
                    }],
                    None => Vec::new(),
                },
                _ => Vec::new(),
            },
            TokenGenerator::Index => match (context.statement(), context.tables().table_names().first()) {
                (BoundStatement::Ddl(ddl), Some(logic_table)) => ddl
                    .index
                    .iter()
                    .map(|index| SqlToken::Index {
                        span: index.span,
                        index: index.value.clone(),
                        quote: index.quote,
                        logic_table: logic_table.clone(),
                    })
                    .collect(),
                _ => Vec::new(),
            },
            TokenGenerator::InPredicate => {
                let mut lists = Vec::new();
                if let Some(condition) = context
                    .as_select()
                    .and_then(|s| s.statement.where_clause.as_ref())
                {
                    collect_in_lists(condition, &mut lists);
                }
                let mut tokens = Vec::new();
                for list in lists {
                    tokens.extend(in_predicate_token(input, list)?);
                }
                tokens
            }
        };
        Ok(tokens)
    }
}

/// A pagination value written as a literal; markers are rewritten through
/// the parameters instead.
fn literal_pagination<F>(context: &SqlStatementContext, pick: F) -> Option<PaginationValue>
where
    F: Fn(&crate::statement::PaginationContext) -> Option<PaginationValue>,
{
    let pagination = context.as_select()?.pagination.as_ref()?;
    pick(pagination).filter(|value| value.parameter_index.is_none())
}

/// Non-negated IN lists with several items, reached through AND/OR only.
fn collect_in_lists<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match &expr.kind {
        ExprKind::InList {
            list,
            negated: false,
            ..
        } if list.len() > 1 => out.push(expr),
        ExprKind::Binary {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right,
        } => {
            collect_in_lists(left, out);
            collect_in_lists(right, out);
        }
        ExprKind::Nested(inner) => collect_in_lists(inner, out),
        _ => {}
    }
}

/// Token for `column IN (...)` on a sharding column; `None` unless every
/// item is a non-null constant.
fn in_predicate_token(input: &TokenInput<'_>, expr: &Expr) -> ShardResult<Option<SqlToken>> {
    let ExprKind::InList { expr: target, list, .. } = &expr.kind else {
        return Ok(None);
    };
    let Some(column) = target.as_column() else {
        return Ok(None);
    };
    let Some(logic_table) = input.context.tables().find_table_name(column, input.rule) else {
        return Ok(None);
    };
    let Some(table_rule) = input.rule.table_rule(&logic_table) else {
        return Ok(None);
    };
    let column_name = column.name.value.to_ascii_lowercase();
    if !input.rule.is_sharding_column(&logic_table, &column_name) {
        return Ok(None);
    }

    let hint = HintValueContext::new();
    let mut items = Vec::with_capacity(list.len());
    for item in list {
        let Some(value) = constant_value(item, input.parameters)?.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let mut values = ColumnValues::new();
        values.insert(
            column_name.clone(),
            ShardingValue::list(column_name.clone(), vec![value]),
        );
        // a value no node accepts matches no unit; one that cannot be routed matches all
        let data_nodes = match route_table(input.rule, table_rule, &values, &hint) {
            Ok(nodes) => Some(nodes),
            Err(ShardError::RouteNotFound(_)) => Some(Vec::new()),
            Err(_) => None,
        };
        let mut parameter_indexes = Vec::new();
        collect_parameters(item, &mut parameter_indexes);
        items.push(InPredicateItem {
            text: item.span.text(input.context.sql()).to_string(),
            parameter_indexes,
            data_nodes,
        });
    }

    let (Some(first), Some(last)) = (list.first(), list.last()) else {
        return Ok(None);
    };
    Ok(Some(SqlToken::InPredicate {
        span: first.span.merge(last.span),
        logic_table,
        items,
    }))
}

/// Tokens of every applicable generator, unsorted.
pub fn generate_tokens(input: &TokenInput<'_>) -> ShardResult<Vec<SqlToken>> {
    let mut tokens = Vec::new();
    for generator in TokenGenerator::ALL {
        if generator.is_applicable(input) {
            tokens.extend(generator.generate(input)?);
        }
    }
    Ok(tokens)
}
