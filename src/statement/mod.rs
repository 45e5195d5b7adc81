//! Bound statement contexts: the parsed statement plus everything routing
//! and rewriting read from it.

pub mod binder;
pub mod insert;
pub mod select;
pub mod tables;

pub use binder::{bind, bind_statement};
pub use insert::{InsertRowContext, InsertStatementContext};
pub use select::{
    DerivedKind, DerivedProjection, PaginationContext, PaginationValue, SelectStatementContext,
    SqlTemplate,
};
pub use tables::{TableReference, TablesContext};

use shardsql_parser::{
    DeleteStatement, Expr, Identifier, Statement, TransactionStatement, UpdateStatement,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOperation {
    CreateTable,
    DropTable,
    TruncateTable,
    CreateIndex,
    DropIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DdlStatementContext {
    pub operation: DdlOperation,
    /// Index name of CREATE/DROP INDEX.
    pub index: Option<Identifier>,
}

/// Statement-kind specific part of a bound statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Select(SelectStatementContext),
    Insert(InsertStatementContext),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Ddl(DdlStatementContext),
    Tcl(TransactionStatement),
    /// SET, SHOW and USE.
    Dal(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatementContext {
    sql: String,
    tables: TablesContext,
    statement: BoundStatement,
}

impl SqlStatementContext {
    pub fn new(sql: impl Into<String>, tables: TablesContext, statement: BoundStatement) -> Self {
        Self {
            sql: sql.into(),
            tables,
            statement,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn tables(&self) -> &TablesContext {
        &self.tables
    }

    pub fn statement(&self) -> &BoundStatement {
        &self.statement
    }

    pub fn as_select(&self) -> Option<&SelectStatementContext> {
        match &self.statement {
            BoundStatement::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn as_insert(&self) -> Option<&InsertStatementContext> {
        match &self.statement {
            BoundStatement::Insert(insert) => Some(insert),
            _ => None,
        }
    }

    /// Predicates sharding values are read from: WHERE plus JOIN ... ON.
    pub fn where_conditions(&self) -> Vec<&Expr> {
        match &self.statement {
            BoundStatement::Select(select) => select
                .statement
                .where_clause
                .iter()
                .chain(select.statement.joins.iter().filter_map(|j| j.on_condition.as_ref()))
                .collect(),
            BoundStatement::Update(update) => update.where_clause.iter().collect(),
            BoundStatement::Delete(delete) => delete.where_clause.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self.statement,
            BoundStatement::Insert(_) | BoundStatement::Update(_) | BoundStatement::Delete(_)
        )
    }
}
