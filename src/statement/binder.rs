use crate::error::ShardResult;
use crate::statement::insert::InsertStatementContext;
use crate::statement::select::SelectStatementContext;
use crate::statement::tables::TableCollector;
use crate::statement::{BoundStatement, DdlOperation, DdlStatementContext, SqlStatementContext};
use serde_json::Value;
use shardsql_parser::{ShowStatement, Statement};
use tracing::debug;

/// Parse and bind `sql` against its parameters.
pub fn bind(sql: &str, parameters: &[Value]) -> ShardResult<SqlStatementContext> {
    let statement = shardsql_parser::parse(sql)?;
    bind_statement(sql, statement, parameters)
}

/// Bind an already parsed statement. `sql` must be the text it was parsed from.
pub fn bind_statement(
    sql: &str,
    statement: Statement,
    parameters: &[Value],
) -> ShardResult<SqlStatementContext> {
    let mut collector = TableCollector::default();

    let bound = match statement {
        Statement::Select(select) => {
            collector.select(&select);
            let contains_subquery = collector.contains_subquery;
            let tables = collector.into_context();
            let select =
                SelectStatementContext::new(sql, select, &tables, parameters, contains_subquery)?;
            return Ok(finish(sql, tables, BoundStatement::Select(select)));
        }
        Statement::Insert(insert) => {
            collector.table(&insert.table);
            for row in &insert.values {
                for expr in &row.exprs {
                    collector.expr(expr);
                }
            }
            for assignment in &insert.on_duplicate_key_update {
                collector.column(&assignment.column);
                collector.expr(&assignment.value);
            }
            BoundStatement::Insert(InsertStatementContext::new(insert, parameters)?)
        }
        Statement::Update(update) => {
            collector.table(&update.table);
            for assignment in &update.assignments {
                collector.column(&assignment.column);
                collector.expr(&assignment.value);
            }
            if let Some(where_clause) = &update.where_clause {
                collector.expr(where_clause);
            }
            BoundStatement::Update(update)
        }
        Statement::Delete(delete) => {
            collector.table(&delete.table);
            if let Some(where_clause) = &delete.where_clause {
                collector.expr(where_clause);
            }
            BoundStatement::Delete(delete)
        }
        Statement::CreateTable(create) => {
            collector.table(&create.table);
            ddl(DdlOperation::CreateTable, None)
        }
        Statement::DropTable(drop) => {
            for table in &drop.tables {
                collector.table(table);
            }
            ddl(DdlOperation::DropTable, None)
        }
        Statement::TruncateTable(truncate) => {
            collector.table(&truncate.table);
            ddl(DdlOperation::TruncateTable, None)
        }
        Statement::CreateIndex(create) => {
            collector.table(&create.table);
            ddl(DdlOperation::CreateIndex, Some(create.index))
        }
        Statement::DropIndex(drop) => {
            if let Some(table) = &drop.table {
                collector.table(table);
            }
            ddl(DdlOperation::DropIndex, Some(drop.index))
        }
        Statement::Transaction(tcl) => BoundStatement::Tcl(tcl),
        Statement::Show(show) => {
            if let ShowStatement::CreateTable(table) | ShowStatement::Columns(table) = &show {
                collector.table(table);
            }
            BoundStatement::Dal(Statement::Show(show))
        }
        other @ (Statement::Set(_) | Statement::Use(_)) => BoundStatement::Dal(other),
    };

    Ok(finish(sql, collector.into_context(), bound))
}

fn ddl(operation: DdlOperation, index: Option<shardsql_parser::Identifier>) -> BoundStatement {
    BoundStatement::Ddl(DdlStatementContext { operation, index })
}

fn finish(
    sql: &str,
    tables: crate::statement::TablesContext,
    statement: BoundStatement,
) -> SqlStatementContext {
    debug!("Bound statement over tables {:?}", tables.table_names());
    SqlStatementContext::new(sql, tables, statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShardError;
    use serde_json::json;

    #[test]
    fn test_bind_select() {
        let ctx = bind(
            "SELECT o.* FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id WHERE o.user_id = ?",
            &[json!(1)],
        )
        .unwrap();
        assert_eq!(ctx.tables().table_names(), &["t_order", "t_order_item"]);
        assert_eq!(ctx.where_conditions().len(), 2);
        assert!(ctx.as_select().is_some());
        assert!(!ctx.is_write());
    }

    #[test]
    fn test_bind_dml_and_ddl() {
        let ctx = bind("UPDATE t_order SET status = ? WHERE order_id = ?", &[json!("x"), json!(1)]).unwrap();
        assert!(ctx.is_write());
        assert_eq!(ctx.where_conditions().len(), 1);

        let ctx = bind("CREATE INDEX idx_status ON t_order (status)", &[]).unwrap();
        match ctx.statement() {
            BoundStatement::Ddl(ddl) => {
                assert_eq!(ddl.operation, DdlOperation::CreateIndex);
                assert_eq!(ddl.index.as_ref().unwrap().value, "idx_status");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.tables().table_names(), &["t_order"]);

        let ctx = bind("SHOW COLUMNS FROM t_order", &[]).unwrap();
        assert!(matches!(ctx.statement(), BoundStatement::Dal(_)));
        assert_eq!(ctx.tables().table_names(), &["t_order"]);
    }

    #[test]
    fn test_bind_propagates_parse_errors() {
        assert!(matches!(bind("SELEC 1", &[]), Err(ShardError::Parse(_))));
    }
}
