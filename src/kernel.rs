use crate::config::RouterConfig;
use crate::error::ShardResult;
use crate::execution::ExecutionContext;
use crate::rewrite::SqlRewriteEngine;
use crate::route::{self, HintValueContext};
use crate::rule::{RuleStore, ShardingRule};
use crate::statement::{self, SqlStatementContext};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Entry point: bind, route and rewrite one logical statement.
#[derive(Debug)]
pub struct ShardingKernel {
    rules: Arc<RuleStore>,
}

impl ShardingKernel {
    pub fn new(rule: ShardingRule) -> Self {
        Self {
            rules: Arc::new(RuleStore::new(rule)),
        }
    }

    pub fn from_config(config: &RouterConfig) -> ShardResult<Self> {
        Ok(Self::new(config.build_rule()?))
    }

    /// Shared store, for storage unit changes made while statements run.
    pub fn rule_store(&self) -> Arc<RuleStore> {
        self.rules.clone()
    }

    pub fn plan(
        &self,
        sql: &str,
        parameters: &[Value],
        hint: &HintValueContext,
    ) -> ShardResult<ExecutionContext> {
        let context = statement::bind(sql, parameters)?;
        self.plan_bound(context, parameters, hint)
    }

    /// Route and rewrite a statement the caller already bound.
    pub fn plan_bound(
        &self,
        context: SqlStatementContext,
        parameters: &[Value],
        hint: &HintValueContext,
    ) -> ShardResult<ExecutionContext> {
        let rule = self.rules.snapshot();
        let route_context = route::route(&context, &rule, parameters, hint)?;
        let execution_units =
            SqlRewriteEngine::new(&context, &route_context, &rule).rewrite(parameters)?;

        if rule.props().sql_show {
            info!("Logic SQL: {}", context.sql());
            for unit in &execution_units {
                info!(
                    "Actual SQL: {} ::: {} ::: {:?}",
                    unit.data_source, unit.sql_unit.sql, unit.sql_unit.parameters
                );
            }
        }

        Ok(ExecutionContext {
            sql_statement_context: context,
            route_context,
            execution_units,
        })
    }
}
