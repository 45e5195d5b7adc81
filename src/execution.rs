use crate::route::RouteContext;
use crate::statement::SqlStatementContext;
use serde::Serialize;
use serde_json::Value;

/// Physical SQL with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlUnit {
    pub sql: String,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionUnit {
    pub data_source: String,
    pub sql_unit: SqlUnit,
}

impl ExecutionUnit {
    pub fn new(data_source: impl Into<String>, sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            data_source: data_source.into(),
            sql_unit: SqlUnit {
                sql: sql.into(),
                parameters,
            },
        }
    }
}

/// Everything an executor needs for one logical statement.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub sql_statement_context: SqlStatementContext,
    pub route_context: RouteContext,
    pub execution_units: Vec<ExecutionUnit>,
}
