use crate::error::{ShardError, ShardResult};
use crate::route::engine::{route_table, RouteEngine, RouteInput};
use crate::route::extractor::{Extracted, ShardingValueExtractor};
use crate::route::value::{compare_values, ShardingValue};
use crate::rule::{DataNode, TableKind};
use crate::statement::insert::constant_value;
use crate::statement::{BoundStatement, DdlOperation};
use shardsql_parser::Statement;
use std::cmp::Ordering;

/// Pick the routing engine for a bound statement.
pub fn new_route_engine(input: &RouteInput<'_>) -> ShardResult<RouteEngine> {
    let rule = input.rule;
    let tables = input.context.tables().table_names();
    let sharding: Vec<String> = tables
        .iter()
        .filter(|t| rule.is_sharding_table(t))
        .cloned()
        .collect();

    match input.context.statement() {
        BoundStatement::Tcl(_) | BoundStatement::Dal(Statement::Set(_)) => {
            return Ok(RouteEngine::DatabaseBroadcast)
        }
        BoundStatement::Dal(_) => return Ok(RouteEngine::Unicast),
        BoundStatement::Ddl(ddl) => {
            if tables.is_empty() {
                // DROP INDEX without a table: the index may live anywhere
                return Ok(match ddl.operation {
                    DdlOperation::DropIndex => RouteEngine::DatabaseBroadcast,
                    _ => RouteEngine::Unicast,
                });
            }
            if !sharding.is_empty() {
                if sharding.len() > 1 && !rule.is_all_binding_tables(&sharding) {
                    return Err(ShardError::UnsupportedStatement(format!(
                        "DDL over unbound sharding tables {}",
                        sharding.join(", ")
                    )));
                }
                return Ok(RouteEngine::TableBroadcast {
                    logic_tables: sharding,
                });
            }
            if tables.iter().all(|t| rule.is_broadcast_table(t)) {
                return Ok(RouteEngine::DatabaseBroadcast);
            }
            return Ok(RouteEngine::Unconfigured);
        }
        BoundStatement::Select(_)
        | BoundStatement::Insert(_)
        | BoundStatement::Update(_)
        | BoundStatement::Delete(_) => {}
    }

    if tables.is_empty() {
        return Ok(RouteEngine::Unicast);
    }

    if sharding.is_empty() {
        if tables.iter().all(|t| rule.is_broadcast_table(t)) {
            return Ok(if input.context.is_write() {
                RouteEngine::DatabaseBroadcast
            } else {
                RouteEngine::Unicast
            });
        }
        return Ok(RouteEngine::Unconfigured);
    }

    check_sharding_key_update(input)?;
    check_duplicate_key_update(input)?;

    if input.context.as_insert().is_none() {
        let extractor = ShardingValueExtractor::new(input.context, rule, input.parameters);
        for table in &sharding {
            if extractor.column_values(table)?.is_none() {
                return Ok(RouteEngine::Unicast);
            }
        }
    }

    if sharding.len() == 1 || rule.is_all_binding_tables(&sharding) {
        Ok(RouteEngine::Standard {
            logic_tables: sharding,
        })
    } else {
        Ok(RouteEngine::Complex {
            logic_tables: sharding,
        })
    }
}

/// An UPDATE may only assign a sharding column the value WHERE already pins,
/// otherwise the row would belong to another shard.
fn check_sharding_key_update(input: &RouteInput<'_>) -> ShardResult<()> {
    let BoundStatement::Update(update) = input.context.statement() else {
        return Ok(());
    };
    let extractor = ShardingValueExtractor::new(input.context, input.rule, input.parameters);

    for assignment in &update.assignments {
        let Some(table) = input
            .context
            .tables()
            .find_table_name(&assignment.column, input.rule)
        else {
            continue;
        };
        if input.rule.classify(&table) != TableKind::Sharding
            || !input
                .rule
                .is_sharding_column(&table, &assignment.column.name.value)
        {
            continue;
        }

        let column = assignment.column.name.value.to_ascii_lowercase();
        let assigned = constant_value(&assignment.value, input.parameters)?;
        let pinned = match extractor.extract(&table, &column)? {
            Extracted::Value(ShardingValue::List { values, .. }) if values.len() == 1 => {
                values.into_iter().next()
            }
            _ => None,
        };
        let unchanged = matches!(
            (&assigned, &pinned),
            (Some(a), Some(p)) if compare_values(a, p) == Ordering::Equal
        );
        if !unchanged {
            return Err(ShardError::UnsupportedStatement(format!(
                "cannot update sharding column '{}' of table '{}'",
                column, table
            )));
        }
    }
    Ok(())
}

/// ON DUPLICATE KEY UPDATE may only assign a sharding column a value that
/// routes every row to the node it was inserted on.
fn check_duplicate_key_update(input: &RouteInput<'_>) -> ShardResult<()> {
    let Some(insert) = input.context.as_insert() else {
        return Ok(());
    };
    let Some(table) = input.context.tables().table_names().first() else {
        return Ok(());
    };
    let Some(table_rule) = input.rule.table_rule(table) else {
        return Ok(());
    };
    let extractor = ShardingValueExtractor::new(input.context, input.rule, input.parameters);

    for assignment in &insert.statement.on_duplicate_key_update {
        let column = assignment.column.name.value.to_ascii_lowercase();
        if !input.rule.is_sharding_column(table, &column) {
            continue;
        }
        // VALUES(col) and other expressions keep the inserted value
        let Some(assigned) = constant_value(&assignment.value, input.parameters)? else {
            continue;
        };

        for row in 0..insert.rows.len() {
            let values = extractor.insert_row_values(table, row);
            let mut updated = values.clone();
            updated.insert(
                column.clone(),
                ShardingValue::list(column.clone(), vec![assigned.clone()]),
            );
            let inserted = sorted(route_table(input.rule, table_rule, &values, input.hint)?);
            let moved = match route_table(input.rule, table_rule, &updated, input.hint) {
                Ok(nodes) => sorted(nodes) != inserted,
                Err(ShardError::RouteNotFound(_)) => true,
                Err(e) => return Err(e),
            };
            if moved {
                return Err(ShardError::UnsupportedStatement(format!(
                    "cannot update sharding column '{}' of table '{}' on duplicate key",
                    column, table
                )));
            }
        }
    }
    Ok(())
}

fn sorted(mut nodes: Vec<DataNode>) -> Vec<DataNode> {
    nodes.sort();
    nodes
}
