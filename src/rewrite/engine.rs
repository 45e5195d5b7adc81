use crate::error::{ShardError, ShardResult};
use crate::execution::ExecutionUnit;
use crate::rewrite::generator::{generate_tokens, TokenInput};
use crate::rewrite::parameter::ParameterBuilder;
use crate::rewrite::token::SqlToken;
use crate::route::{RouteContext, RouteUnit};
use crate::rule::ShardingRule;
use crate::statement::SqlStatementContext;
use serde_json::Value;
use shardsql_parser::Span;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// Rewrites a logical statement into one SQL per route unit.
pub struct SqlRewriteEngine<'a> {
    context: &'a SqlStatementContext,
    route: &'a RouteContext,
    rule: &'a ShardingRule,
}

impl<'a> SqlRewriteEngine<'a> {
    pub fn new(context: &'a SqlStatementContext, route: &'a RouteContext, rule: &'a ShardingRule) -> Self {
        Self {
            context,
            route,
            rule,
        }
    }

    pub fn rewrite(&self, parameters: &[Value]) -> ShardResult<Vec<ExecutionUnit>> {
        let input = TokenInput {
            context: self.context,
            route: self.route,
            rule: self.rule,
            parameters,
        };
        let tokens = arrange_tokens(generate_tokens(&input)?)?;
        let builder = ParameterBuilder::new(self.context, self.route, parameters);

        let mut units = Vec::new();
        if self.is_union_all_candidate() {
            for data_source in self.route.actual_data_source_names() {
                let group: Vec<&RouteUnit> = self
                    .route
                    .route_units()
                    .iter()
                    .filter(|u| u.data_source_name() == data_source)
                    .collect();
                let mut sqls = Vec::with_capacity(group.len());
                let mut merged = Vec::new();
                for unit in &group {
                    sqls.push(self.render(&tokens, unit)?);
                    merged.extend(self.parameters_for(&builder, &tokens, unit));
                }
                push_unique(&mut units, ExecutionUnit::new(data_source, sqls.join(" UNION ALL "), merged));
            }
        } else {
            for unit in self.route.route_units() {
                let sql = self.render(&tokens, unit)?;
                let parameters = self.parameters_for(&builder, &tokens, unit);
                push_unique(
                    &mut units,
                    ExecutionUnit::new(unit.data_source_name(), sql, parameters),
                );
            }
        }

        debug!("Rewrote statement into {} execution unit(s)", units.len());
        Ok(units)
    }

    /// Plain selects with several units on one data source are sent as one UNION ALL.
    fn is_union_all_candidate(&self) -> bool {
        self.rule.props().union_all_rewrite
            && self.context.as_select().is_some_and(|s| s.is_plain())
            && self.route.route_units().len() > self.route.actual_data_source_names().len()
    }

    fn render(&self, tokens: &[SqlToken], unit: &RouteUnit) -> ShardResult<String> {
        let sql = self.context.sql();
        let mut out = String::with_capacity(sql.len());
        let mut cursor = 0usize;
        for token in tokens {
            let span = token.span();
            out.push_str(Span::new(cursor, span.start).text(sql));
            out.push_str(&token.to_text(unit)?);
            cursor = span.stop;
        }
        out.push_str(Span::new(cursor, sql.len()).text(sql));
        Ok(out)
    }

    fn parameters_for(&self, builder: &ParameterBuilder, tokens: &[SqlToken], unit: &RouteUnit) -> Vec<Value> {
        match builder {
            ParameterBuilder::Standard(builder) => {
                let removed: BTreeSet<usize> = tokens
                    .iter()
                    .flat_map(|t| t.removed_parameters(unit))
                    .collect();
                builder.parameters_without(&removed)
            }
            // rows were not routed one by one, every unit gets all of them
            ParameterBuilder::Grouped(builder) if self.route.original_data_nodes().is_empty() => {
                builder.parameters()
            }
            ParameterBuilder::Grouped(builder) => {
                let logic_table = self
                    .context
                    .tables()
                    .table_names()
                    .first()
                    .map(String::as_str)
                    .unwrap_or_default();
                let rows = self
                    .route
                    .original_data_nodes()
                    .iter()
                    .enumerate()
                    .filter(|(_, nodes)| nodes.iter().any(|n| unit.contains_data_node(n, logic_table)))
                    .map(|(row, _)| row);
                builder.parameters_for(rows)
            }
        }
    }
}

fn push_unique(units: &mut Vec<ExecutionUnit>, unit: ExecutionUnit) {
    if !units.contains(&unit) {
        units.push(unit);
    }
}

/// Sort tokens by position, dropping tokens layered inside an enclosing one.
/// Partially overlapping tokens cannot both be applied.
pub fn arrange_tokens(mut tokens: Vec<SqlToken>) -> ShardResult<Vec<SqlToken>> {
    tokens.sort_by_key(|t| {
        let span = t.span();
        (span.start, !span.is_empty(), Reverse(span.stop))
    });

    let mut arranged: Vec<SqlToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let span = token.span();
        if let Some(previous) = arranged.last().map(SqlToken::span) {
            if span.start < previous.stop {
                if span.stop <= previous.stop {
                    continue;
                }
                return Err(ShardError::InternalConsistency(format!(
                    "tokens at {}..{} and {}..{} overlap",
                    previous.start, previous.stop, span.start, span.stop
                )));
            }
        }
        arranged.push(token);
    }
    Ok(arranged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardsql_parser::QuoteCharacter;

    fn table(start: usize, stop: usize) -> SqlToken {
        SqlToken::Table {
            span: Span::new(start, stop),
            logic_table: "t".to_string(),
            quote: QuoteCharacter::None,
        }
    }

    #[test]
    fn test_arrange_sorts_and_skips_contained() {
        let arranged = arrange_tokens(vec![table(20, 25), table(0, 10), table(2, 5)]).unwrap();
        let spans: Vec<Span> = arranged.iter().map(SqlToken::span).collect();
        assert_eq!(spans, vec![Span::new(0, 10), Span::new(20, 25)]);
    }

    #[test]
    fn test_arrange_rejects_partial_overlap() {
        let err = arrange_tokens(vec![table(0, 10), table(5, 15)]).unwrap_err();
        assert!(matches!(err, ShardError::InternalConsistency(_)));
    }

    #[test]
    fn test_insertion_point_before_token_is_kept() {
        let insertion = SqlToken::PaginationOffset {
            span: Span::point(10),
            revised: 0,
        };
        let arranged = arrange_tokens(vec![table(10, 15), insertion]).unwrap();
        assert_eq!(arranged.len(), 2);
        assert!(arranged[0].span().is_empty());
    }
}
