//! Common test utilities for routing and rewriting tests
//!
//! Provides shared helper functions for:
//! - Building the order/item sharding rule used across tests
//! - Planning statements through the kernel
//! - Flattening route and execution results for assertions

#![allow(dead_code)]

use serde_json::Value;
use shardsql::rule::inline::expand;
use shardsql::rule::{InlineExpression, StandardAlgorithm};
use shardsql::{
    DataNode, ExecutionContext, HintValueContext, RouterProps, ShardResult, ShardingKernel, ShardingRule,
    ShardingStrategy, TableRule,
};

pub fn nodes(expression: &str) -> Vec<DataNode> {
    expand(expression)
        .unwrap()
        .iter()
        .map(|n| DataNode::parse(n).unwrap())
        .collect()
}

pub fn inline(column: &str, expression: &str) -> ShardingStrategy {
    ShardingStrategy::Inline {
        column: column.to_string(),
        expression: InlineExpression::compile(expression).unwrap(),
        allow_range_query: false,
    }
}

pub fn modulo(column: &str, count: u64) -> ShardingStrategy {
    let algorithm = StandardAlgorithm::Mod {
        sharding_count: count,
    };
    ShardingStrategy::Standard {
        column: column.to_string(),
        precise: algorithm.clone(),
        range: Some(algorithm),
    }
}

/// `t_order` and `t_order_item` bound, sharded by `user_id % 2` then
/// `order_id % 2`; `t_user` sharded by database only; `t_config` broadcast;
/// `t_region` pinned to `ds_1`.
pub fn order_rule() -> ShardingRule {
    order_rule_with(RouterProps::default())
}

pub fn order_rule_with(props: RouterProps) -> ShardingRule {
    let table = |name: &str| {
        TableRule::new(name, nodes(&format!("ds_${{0..1}}.{}_${{0..1}}", name)))
            .unwrap()
            .with_database_strategy(inline("user_id", "ds_${user_id % 2}"))
            .with_table_strategy(modulo("order_id", 2))
    };

    ShardingRule::builder()
        .storage_units(["ds_0", "ds_1"])
        .table_rule(table("t_order"))
        .table_rule(table("t_order_item"))
        .table_rule(
            TableRule::new("t_user", nodes("ds_${0..1}.t_user"))
                .unwrap()
                .with_database_strategy(inline("user_id", "ds_${user_id % 2}")),
        )
        .binding_group(["t_order", "t_order_item"])
        .broadcast_table("t_config")
        .single_table("t_region", "ds_1")
        .props(props)
        .build()
        .unwrap()
}

pub fn kernel() -> ShardingKernel {
    ShardingKernel::new(order_rule())
}

pub fn plan(sql: &str, params: &[Value]) -> ShardResult<ExecutionContext> {
    kernel().plan(sql, params, &HintValueContext::new())
}

/// `(data source, actual table of `logic_table`)` per route unit.
pub fn routed(context: &ExecutionContext, logic_table: &str) -> Vec<(String, String)> {
    context
        .route_context
        .route_units()
        .iter()
        .map(|u| {
            (
                u.data_source_name().to_string(),
                u.actual_table(logic_table).unwrap_or("").to_string(),
            )
        })
        .collect()
}

/// `(data source, sql)` per execution unit.
pub fn sqls(context: &ExecutionContext) -> Vec<(String, String)> {
    context
        .execution_units
        .iter()
        .map(|u| (u.data_source.clone(), u.sql_unit.sql.clone()))
        .collect()
}

pub fn pair(data_source: &str, value: &str) -> (String, String) {
    (data_source.to_string(), value.to_string())
}
