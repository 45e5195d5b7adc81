//! Tests for the SQL parser.

use crate::ast::*;
use crate::error::SqlParseError;
use crate::parse;

fn select(sql: &str) -> SelectStatement {
    match parse(sql).unwrap() {
        Statement::Select(s) => s,
        other => panic!("expected SELECT, got {:?}", other),
    }
}

#[test]
fn test_simple_select() {
    let sql = "SELECT * FROM t_order";
    let stmt = select(sql);
    assert_eq!(stmt.from.len(), 1);
    assert_eq!(stmt.from[0].name.value, "t_order");
    assert_eq!(stmt.from[0].name.span.text(sql), "t_order");
    assert!(matches!(stmt.projections.items[0], Projection::Star { owner: None, .. }));
}

#[test]
fn test_table_alias_and_owner() {
    let sql = "SELECT o.order_id FROM logic_db.t_order AS o";
    let stmt = select(sql);
    let table = &stmt.from[0];
    assert_eq!(table.owner.as_ref().unwrap().value, "logic_db");
    assert_eq!(table.alias.as_ref().unwrap().value, "o");
    assert_eq!(table.reference_name(), "o");
    assert_eq!(table.name.span.text(sql), "t_order");

    match &stmt.projections.items[0] {
        Projection::Column { column, .. } => {
            assert_eq!(column.owner.as_ref().unwrap().value, "o");
            assert_eq!(column.name.value, "order_id");
        }
        other => panic!("unexpected projection {:?}", other),
    }
}

#[test]
fn test_quoted_table_keeps_quote() {
    let sql = "SELECT * FROM `t_order` WHERE \"order_id\" = 1";
    let stmt = select(sql);
    let name = &stmt.from[0].name;
    assert_eq!(name.value, "t_order");
    assert_eq!(name.quote, QuoteCharacter::Backtick);
    assert_eq!(name.span.text(sql), "`t_order`");
}

#[test]
fn test_join_with_on_condition() {
    let sql = "SELECT i.* FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id WHERE o.order_id IN (1, 2)";
    let stmt = select(sql);
    assert_eq!(stmt.joins.len(), 1);
    assert_eq!(stmt.joins[0].join_type, JoinType::Inner);
    assert_eq!(stmt.joins[0].table.name.value, "t_order_item");
    assert!(stmt.joins[0].on_condition.is_some());
    assert_eq!(stmt.tables().count(), 2);

    match &stmt.where_clause.as_ref().unwrap().kind {
        ExprKind::InList { list, negated, .. } => {
            assert_eq!(list.len(), 2);
            assert!(!negated);
        }
        other => panic!("unexpected predicate {:?}", other),
    }
}

#[test]
fn test_left_outer_join() {
    let stmt = select("SELECT * FROM a LEFT OUTER JOIN b ON a.id = b.id");
    assert_eq!(stmt.joins[0].join_type, JoinType::Left);
}

#[test]
fn test_aggregations() {
    let sql = "SELECT COUNT(*), AVG(price) AS avg_price, SUM(DISTINCT qty) FROM t_order";
    let stmt = select(sql);
    let items = &stmt.projections.items;
    assert_eq!(items.len(), 3);

    match &items[0] {
        Projection::Aggregation {
            function, argument, ..
        } => {
            assert_eq!(*function, AggregationType::Count);
            assert!(argument.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    match &items[1] {
        Projection::Aggregation {
            function, alias, span, ..
        } => {
            assert_eq!(*function, AggregationType::Avg);
            assert_eq!(alias.as_ref().unwrap().value, "avg_price");
            assert_eq!(span.text(sql), "AVG(price) AS avg_price");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        items[2],
        Projection::Aggregation { distinct: true, .. }
    ));
    assert_eq!(
        stmt.projections.span.text(sql),
        "COUNT(*), AVG(price) AS avg_price, SUM(DISTINCT qty)"
    );
}

#[test]
fn test_aggregate_arithmetic_is_expression() {
    let stmt = select("SELECT SUM(a) + 1 FROM t");
    assert!(matches!(
        stmt.projections.items[0],
        Projection::Expression { .. }
    ));
}

#[test]
fn test_group_order_limit() {
    let sql = "SELECT user_id, COUNT(*) FROM t_order GROUP BY user_id ORDER BY user_id DESC LIMIT 5, 10";
    let stmt = select(sql);
    assert_eq!(stmt.group_by.len(), 1);
    assert_eq!(stmt.order_by.len(), 1);
    assert!(stmt.order_by[0].descending);

    let limit = stmt.limit.unwrap();
    let offset = limit.offset.unwrap();
    let row_count = limit.row_count.unwrap();
    assert_eq!(offset.kind, LimitValueKind::Literal(5));
    assert_eq!(offset.span.text(sql), "5");
    assert_eq!(row_count.kind, LimitValueKind::Literal(10));
    assert_eq!(row_count.span.text(sql), "10");
}

#[test]
fn test_limit_offset_with_parameters() {
    let stmt = select("SELECT * FROM t WHERE id > ? LIMIT ? OFFSET ?");
    let limit = stmt.limit.unwrap();
    assert_eq!(limit.row_count.unwrap().kind, LimitValueKind::Parameter(1));
    assert_eq!(limit.offset.unwrap().kind, LimitValueKind::Parameter(2));
}

#[test]
fn test_predicates() {
    let stmt = select(
        "SELECT * FROM t WHERE a BETWEEN 1 AND 5 AND b NOT IN (3) AND c IS NOT NULL AND d LIKE 'x%' AND NOT e = -2",
    );
    let mut kinds = Vec::new();
    stmt.where_clause.unwrap().visit(&mut |e| match &e.kind {
        ExprKind::Between { negated, .. } => kinds.push(format!("between:{}", negated)),
        ExprKind::InList { negated, .. } => kinds.push(format!("in:{}", negated)),
        ExprKind::IsNull { negated, .. } => kinds.push(format!("isnull:{}", negated)),
        ExprKind::Like { .. } => kinds.push("like".to_string()),
        ExprKind::Not(_) => kinds.push("not".to_string()),
        ExprKind::Literal(Literal::Integer(-2)) => kinds.push("neg".to_string()),
        _ => {}
    });
    assert_eq!(
        kinds,
        vec!["between:false", "in:true", "isnull:true", "like", "not", "neg"]
    );
}

#[test]
fn test_subquery() {
    let stmt = select("SELECT * FROM t_order WHERE user_id IN (SELECT user_id FROM t_user)");
    match &stmt.where_clause.unwrap().kind {
        ExprKind::InList { list, .. } => {
            assert!(matches!(list[0].kind, ExprKind::Subquery(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_insert_multi_row() {
    let sql = "INSERT INTO t_order (order_id, user_id) VALUES (?, ?), (?, ?), (3, 'x') ON DUPLICATE KEY UPDATE status = ?";
    let stmt = match parse(sql).unwrap() {
        Statement::Insert(i) => i,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(stmt.table.name.value, "t_order");
    assert_eq!(stmt.columns.len(), 2);
    assert_eq!(stmt.values.len(), 3);
    assert_eq!(stmt.values[0].span.text(sql), "(?, ?)");
    assert_eq!(stmt.values[2].span.text(sql), "(3, 'x')");
    assert!(matches!(stmt.values[1].exprs[1].kind, ExprKind::Parameter(3)));
    assert_eq!(stmt.on_duplicate_key_update.len(), 1);
    assert!(matches!(
        stmt.on_duplicate_key_update[0].value.kind,
        ExprKind::Parameter(4)
    ));
}

#[test]
fn test_update_and_delete() {
    match parse("UPDATE t_order SET status = 'done', amount = amount + 1 WHERE order_id = 10").unwrap() {
        Statement::Update(u) => {
            assert_eq!(u.table.name.value, "t_order");
            assert_eq!(u.assignments.len(), 2);
            assert!(u.where_clause.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
    match parse("DELETE FROM t_order WHERE order_id = 10;").unwrap() {
        Statement::Delete(d) => assert_eq!(d.table.name.value, "t_order"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_ddl() {
    match parse("CREATE TABLE IF NOT EXISTS t_order (order_id INT NOT NULL, PRIMARY KEY (order_id)) ENGINE=InnoDB").unwrap() {
        Statement::CreateTable(c) => {
            assert!(c.if_not_exists);
            assert_eq!(c.table.name.value, "t_order");
        }
        other => panic!("unexpected {:?}", other),
    }
    match parse("DROP TABLE IF EXISTS t_order, t_order_item").unwrap() {
        Statement::DropTable(d) => {
            assert!(d.if_exists);
            assert_eq!(d.tables.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    let sql = "CREATE UNIQUE INDEX idx_user ON t_order (user_id)";
    match parse(sql).unwrap() {
        Statement::CreateIndex(c) => {
            assert!(c.unique);
            assert_eq!(c.index.span.text(sql), "idx_user");
            assert_eq!(c.table.name.value, "t_order");
        }
        other => panic!("unexpected {:?}", other),
    }
    match parse("DROP INDEX idx_user ON t_order").unwrap() {
        Statement::DropIndex(d) => assert_eq!(d.table.unwrap().name.value, "t_order"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        parse("TRUNCATE TABLE t_order").unwrap(),
        Statement::TruncateTable(_)
    ));
}

#[test]
fn test_administrative_statements() {
    assert_eq!(
        parse("BEGIN").unwrap(),
        Statement::Transaction(TransactionStatement::Begin)
    );
    assert_eq!(
        parse("START TRANSACTION").unwrap(),
        Statement::Transaction(TransactionStatement::Begin)
    );
    assert_eq!(
        parse("commit").unwrap(),
        Statement::Transaction(TransactionStatement::Commit)
    );
    assert!(matches!(parse("SET autocommit = 1").unwrap(), Statement::Set(_)));
    assert!(matches!(
        parse("SHOW TABLES").unwrap(),
        Statement::Show(ShowStatement::Tables)
    ));
    assert!(matches!(
        parse("SHOW COLUMNS FROM t_order").unwrap(),
        Statement::Show(ShowStatement::Columns(_))
    ));
    assert!(matches!(parse("USE sharding_db").unwrap(), Statement::Use(_)));
}

#[test]
fn test_soft_keyword_as_column() {
    let stmt = select("SELECT `key`, status FROM t_config WHERE key = 'a'");
    assert_eq!(stmt.projections.items.len(), 2);
    let column = stmt.where_clause.as_ref().unwrap();
    match &column.kind {
        ExprKind::Binary { left, .. } => {
            assert_eq!(left.as_column().unwrap().name.value, "key");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_errors() {
    assert!(matches!(
        parse("SELECT * FROM").unwrap_err(),
        SqlParseError::Syntax { .. }
    ));
    assert!(matches!(
        parse("GRANT ALL ON t TO u").unwrap_err(),
        SqlParseError::UnsupportedStatement(_)
    ));
    assert!(matches!(
        parse("SELECT * FROM t extra garbage").unwrap_err(),
        SqlParseError::Syntax { .. }
    ));
}
