//! Routing engines.
//!
//! Every engine turns one bound statement into a [`RouteContext`]. Which
//! engine runs is decided by [`crate::route::factory`].

use crate::error::{ShardError, ShardResult};
use crate::route::context::{RouteContext, RouteUnit};
use crate::route::extractor::ShardingValueExtractor;
use crate::route::hint::HintValueContext;
use crate::route::value::ColumnValues;
use crate::rule::{DataNode, ShardingRule, TableKind, TableRule};
use crate::statement::SqlStatementContext;
use serde_json::Value;
use tracing::debug;

/// Everything an engine reads while routing one statement.
pub struct RouteInput<'a> {
    pub context: &'a SqlStatementContext,
    pub rule: &'a ShardingRule,
    pub parameters: &'a [Value],
    pub hint: &'a HintValueContext,
}

impl<'a> RouteInput<'a> {
    fn extractor(&self) -> ShardingValueExtractor<'a> {
        ShardingValueExtractor::new(self.context, self.rule, self.parameters)
    }

    fn logic_tables(&self) -> Vec<String> {
        self.context.tables().table_names().to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEngine {
    /// One sharding table, or sharding tables of a single binding group.
    Standard { logic_tables: Vec<String> },
    /// Independent sharding tables joined per data source.
    Complex { logic_tables: Vec<String> },
    /// Every storage unit, logical names kept.
    DatabaseBroadcast,
    /// Every data node of a sharding table.
    TableBroadcast { logic_tables: Vec<String> },
    /// Exactly one unit.
    Unicast,
    /// Tables no sharding rule covers, on their own data source.
    Unconfigured,
}

impl RouteEngine {
    pub fn name(&self) -> &'static str {
        match self {
            RouteEngine::Standard { .. } => "standard",
            RouteEngine::Complex { .. } => "complex",
            RouteEngine::DatabaseBroadcast => "database_broadcast",
            RouteEngine::TableBroadcast { .. } => "table_broadcast",
            RouteEngine::Unicast => "unicast",
            RouteEngine::Unconfigured => "unconfigured",
        }
    }

    pub fn route(&self, input: &RouteInput<'_>) -> ShardResult<RouteContext> {
        let mut route_context = RouteContext::new(input.logic_tables());
        match self {
            RouteEngine::Standard { logic_tables } => {
                route_standard(input, logic_tables, &mut route_context)?;
                attach_unsharded_tables(input, &mut route_context)?;
            }
            RouteEngine::Complex { logic_tables } => {
                route_complex(input, logic_tables, &mut route_context)?;
                attach_unsharded_tables(input, &mut route_context)?;
            }
            RouteEngine::DatabaseBroadcast => {
                for data_source in input.rule.storage_units() {
                    let mut unit = RouteUnit::new(data_source.clone());
                    for table in input.context.tables().table_names() {
                        unit.add_table(table.clone(), table.clone());
                    }
                    route_context.add_unit(unit);
                }
            }
            RouteEngine::TableBroadcast { logic_tables } => {
                route_table_broadcast(input, logic_tables, &mut route_context)?;
                attach_unsharded_tables(input, &mut route_context)?;
            }
            RouteEngine::Unicast => route_unicast(input, &mut route_context)?,
            RouteEngine::Unconfigured => {
                let data_source = input
                    .context
                    .tables()
                    .table_names()
                    .iter()
                    .find_map(|t| match input.rule.classify(t) {
                        TableKind::Single(ds) => Some(ds),
                        _ => None,
                    })
                    .or_else(|| input.rule.unconfigured_data_source().map(str::to_string))
                    .ok_or_else(|| {
                        ShardError::RouteNotFound(input.context.tables().table_names().join(","))
                    })?;
                route_context.add_unit(RouteUnit::new(data_source));
                attach_unsharded_tables(input, &mut route_context)?;
            }
        }

        if route_context.route_units().is_empty() {
            return Err(ShardError::RouteNotFound(
                input.context.tables().table_names().join(","),
            ));
        }
        debug!(
            "{} routing produced {} unit(s)",
            self.name(),
            route_context.route_units().len()
        );
        Ok(route_context)
    }
}

/// Data nodes of one sharding table for one condition.
pub(crate) fn route_table(
    rule: &ShardingRule,
    table_rule: &TableRule,
    values: &ColumnValues,
    hint: &HintValueContext,
) -> ShardResult<Vec<DataNode>> {
    let logic_table = table_rule.logic_table();
    let data_sources = rule.database_strategy(table_rule).do_sharding(
        &table_rule.data_source_names(),
        values,
        hint.database_values(logic_table),
    )?;

    let table_strategy = rule.table_strategy(table_rule);
    let mut nodes = Vec::new();
    for data_source in data_sources {
        let tables = table_strategy.do_sharding(
            &table_rule.actual_tables(&data_source),
            values,
            hint.table_values(logic_table),
        )?;
        nodes.extend(tables.into_iter().map(|t| DataNode::new(data_source.clone(), t)));
    }

    if nodes.is_empty() {
        return Err(ShardError::RouteNotFound(logic_table.to_string()));
    }
    Ok(nodes)
}

fn table_rule<'r>(rule: &'r ShardingRule, logic_table: &str) -> ShardResult<&'r TableRule> {
    rule.table_rule(logic_table)
        .ok_or_else(|| ShardError::RouteNotFound(logic_table.to_string()))
}

/// Nodes of a sharding table under the statement's WHERE conditions.
fn route_by_conditions(input: &RouteInput<'_>, logic_table: &str) -> ShardResult<Vec<DataNode>> {
    let rule = table_rule(input.rule, logic_table)?;
    // always-false predicates are sent to the unicast engine before this
    let values = input
        .extractor()
        .column_values(logic_table)?
        .unwrap_or_default();
    route_table(input.rule, rule, &values, input.hint)
}

/// Unit for `node` of `representative`, with every bound member alongside.
fn binding_unit(
    rule: &ShardingRule,
    representative: &str,
    members: &[String],
    node: &DataNode,
) -> ShardResult<RouteUnit> {
    let mut unit = RouteUnit::new(node.data_source.clone()).with_table(representative, node.table.clone());
    for member in members {
        if member.eq_ignore_ascii_case(representative) {
            continue;
        }
        let actual =
            rule.binding_actual_table(&node.data_source, member, representative, &node.table)?;
        unit.add_table(member.clone(), actual);
    }
    Ok(unit)
}

fn route_standard(
    input: &RouteInput<'_>,
    logic_tables: &[String],
    route_context: &mut RouteContext,
) -> ShardResult<()> {
    let Some(representative) = logic_tables.first() else {
        return Ok(());
    };

    if let Some(insert) = input.context.as_insert() {
        let rule = table_rule(input.rule, representative)?;
        let extractor = input.extractor();
        for row in 0..insert.rows.len() {
            let values = extractor.insert_row_values(representative, row);
            let nodes = route_table(input.rule, rule, &values, input.hint)?;
            if nodes.len() > 1 {
                return Err(ShardError::InsertRouteToMultipleNodes(representative.clone()));
            }
            for node in &nodes {
                route_context.add_unit(binding_unit(input.rule, representative, logic_tables, node)?);
            }
            route_context.push_original_data_nodes(nodes);
        }
        return Ok(());
    }

    for node in route_by_conditions(input, representative)? {
        route_context.add_unit(binding_unit(input.rule, representative, logic_tables, &node)?);
    }
    Ok(())
}

/// Groups tables by binding group, the first referenced member leading.
fn binding_clusters(rule: &ShardingRule, logic_tables: &[String]) -> Vec<Vec<String>> {
    let mut clusters: Vec<Vec<String>> = Vec::new();
    for table in logic_tables {
        let existing = rule.binding_group(table).and_then(|group| {
            clusters
                .iter_mut()
                .find(|cluster| cluster.first().is_some_and(|leader| group.contains(leader)))
        });
        match existing {
            Some(cluster) => cluster.push(table.clone()),
            None => clusters.push(vec![table.clone()]),
        }
    }
    clusters
}

fn route_complex(
    input: &RouteInput<'_>,
    logic_tables: &[String],
    route_context: &mut RouteContext,
) -> ShardResult<()> {
    let clusters = binding_clusters(input.rule, logic_tables);

    let mut routed: Vec<(Vec<String>, Vec<DataNode>)> = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let nodes = route_by_conditions(input, &cluster[0])?;
        routed.push((cluster, nodes));
    }

    // data sources every cluster reaches, in the first cluster's order
    let mut data_sources: Vec<String> = Vec::new();
    if let Some((_, first)) = routed.first() {
        for node in first {
            let shared = routed.iter().all(|(_, nodes)| {
                nodes
                    .iter()
                    .any(|n| n.data_source.eq_ignore_ascii_case(&node.data_source))
            });
            if shared
                && !data_sources
                    .iter()
                    .any(|ds| ds.eq_ignore_ascii_case(&node.data_source))
            {
                data_sources.push(node.data_source.clone());
            }
        }
    }
    if data_sources.is_empty() {
        return Err(ShardError::RouteNotFound(logic_tables.join(",")));
    }

    for data_source in &data_sources {
        let mut partial = vec![RouteUnit::new(data_source.clone())];
        for (cluster, nodes) in &routed {
            let mut next = Vec::new();
            for node in nodes.iter().filter(|n| n.data_source.eq_ignore_ascii_case(data_source)) {
                let bound = binding_unit(input.rule, &cluster[0], cluster, node)?;
                for unit in &partial {
                    let mut unit = unit.clone();
                    unit.table_mappers.extend(bound.table_mappers.iter().cloned());
                    next.push(unit);
                }
            }
            partial = next;
        }
        for unit in partial {
            route_context.add_unit(unit);
        }
    }
    Ok(())
}

fn route_table_broadcast(
    input: &RouteInput<'_>,
    logic_tables: &[String],
    route_context: &mut RouteContext,
) -> ShardResult<()> {
    let Some(representative) = logic_tables.first() else {
        return Ok(());
    };
    let rule = table_rule(input.rule, representative)?;
    for node in rule.actual_data_nodes() {
        route_context.add_unit(binding_unit(input.rule, representative, logic_tables, node)?);
    }
    Ok(())
}

/// Data sources holding every table of the statement, storage unit order.
fn common_data_sources(input: &RouteInput<'_>) -> Vec<String> {
    let mut candidates: Vec<String> = input.rule.storage_units().to_vec();
    for table in input.context.tables().table_names() {
        let hosts = input.rule.data_sources_of(table);
        candidates.retain(|ds| hosts.iter().any(|h| h.eq_ignore_ascii_case(ds)));
    }
    candidates
}

fn route_unicast(input: &RouteInput<'_>, route_context: &mut RouteContext) -> ShardResult<()> {
    let candidates = common_data_sources(input);
    let data_source = input
        .hint
        .data_source_name()
        .and_then(|preferred| candidates.iter().find(|c| c.eq_ignore_ascii_case(preferred)))
        .or_else(|| candidates.first())
        .ok_or_else(|| ShardError::RouteNotFound(input.context.tables().table_names().join(",")))?;

    let mut unit = RouteUnit::new(data_source.clone());
    for table in input.context.tables().table_names() {
        let actual = match input.rule.table_rule(table) {
            Some(rule) => rule
                .actual_tables(data_source)
                .into_iter()
                .next()
                .ok_or_else(|| ShardError::RouteNotFound(table.clone()))?,
            None => table.clone(),
        };
        unit.add_table(table.clone(), actual);
    }
    route_context.add_unit(unit);
    Ok(())
}

/// Map broadcast, single and unconfigured tables onto every unit, keeping
/// only units on a data source those tables live on.
fn attach_unsharded_tables(input: &RouteInput<'_>, route_context: &mut RouteContext) -> ShardResult<()> {
    for table in input.context.tables().table_names() {
        let pinned = match input.rule.classify(table) {
            TableKind::Sharding => continue,
            TableKind::Broadcast => None,
            TableKind::Single(ds) => Some(ds),
            TableKind::Unconfigured => input.rule.unconfigured_data_source().map(str::to_string),
        };

        let units = route_context.route_units_mut();
        if let Some(ds) = &pinned {
            units.retain(|u| u.data_source_name().eq_ignore_ascii_case(ds));
        } else {
            units.retain(|u| input.rule.has_storage_unit(u.data_source_name()));
        }
        if units.is_empty() {
            return Err(ShardError::RouteNotFound(table.clone()));
        }
        for unit in units.iter_mut() {
            unit.add_table(table.clone(), table.clone());
        }
    }
    Ok(())
}
