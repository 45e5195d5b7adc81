use crate::rule::ShardingRule;
use shardsql_parser::{
    ColumnRef, Expr, ExprKind, Identifier, Projection, QuoteCharacter, SelectStatement, Span,
    TableSegment,
};

/// A place in the SQL text that names a logical table and must carry the
/// actual table name after rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    /// Lower-cased logical table name.
    pub logic_table: String,
    pub span: Span,
    pub quote: QuoteCharacter,
}

/// Tables a statement touches, subqueries included.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TablesContext {
    segments: Vec<TableSegment>,
    table_names: Vec<String>,
    references: Vec<TableReference>,
}

impl TablesContext {
    pub fn new(segments: Vec<TableSegment>, owners: Vec<Identifier>) -> Self {
        let mut table_names: Vec<String> = Vec::new();
        for segment in &segments {
            let name = segment.name.value.to_ascii_lowercase();
            if !table_names.contains(&name) {
                table_names.push(name);
            }
        }

        let mut references: Vec<TableReference> = segments
            .iter()
            .map(|segment| TableReference {
                logic_table: segment.name.value.to_ascii_lowercase(),
                // a schema qualifier is dropped together with the logical name
                span: match &segment.owner {
                    Some(owner) => Span::new(owner.span.start, segment.name.span.stop),
                    None => segment.name.span,
                },
                quote: segment.name.quote,
            })
            .collect();

        let mut context = Self {
            segments,
            table_names,
            references: Vec::new(),
        };
        for owner in owners {
            if let Some(logic_table) = context.owner_table(&owner.value) {
                references.push(TableReference {
                    logic_table,
                    span: owner.span,
                    quote: owner.quote,
                });
            }
        }
        references.sort_by_key(|r| r.span);
        references.dedup();
        context.references = references;
        context
    }

    pub fn segments(&self) -> &[TableSegment] {
        &self.segments
    }

    /// Distinct lower-cased logical names in order of first appearance.
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    pub fn references(&self) -> &[TableReference] {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.table_names.is_empty()
    }

    /// Logical table an owner qualifier denotes when it is a table name
    /// rather than an alias.
    pub fn owner_table(&self, owner: &str) -> Option<String> {
        let aliased = self.segments.iter().any(|s| {
            s.alias
                .as_ref()
                .is_some_and(|alias| alias.eq_ignore_case(owner))
        });
        if aliased {
            return None;
        }
        self.table_names
            .iter()
            .find(|t| t.eq_ignore_ascii_case(owner))
            .cloned()
    }

    /// Logical table a column belongs to.
    ///
    /// A qualified column resolves through aliases and table names. An
    /// unqualified one belongs to the only table, or else to the first table
    /// that shards on it.
    pub fn find_table_name(&self, column: &ColumnRef, rule: &ShardingRule) -> Option<String> {
        match &column.owner {
            Some(owner) => self
                .segments
                .iter()
                .find(|s| {
                    s.alias
                        .as_ref()
                        .is_some_and(|alias| alias.eq_ignore_case(&owner.value))
                })
                .or_else(|| self.segments.iter().find(|s| s.name.eq_ignore_case(&owner.value)))
                .map(|s| s.name.value.to_ascii_lowercase()),
            None if self.table_names.len() == 1 => self.table_names.first().cloned(),
            None => rule.find_table_by_column(&self.table_names, &column.name.value),
        }
    }
}

/// Walks a statement collecting table segments and column owner qualifiers.
#[derive(Debug, Default)]
pub(crate) struct TableCollector {
    pub segments: Vec<TableSegment>,
    pub owners: Vec<Identifier>,
    pub contains_subquery: bool,
}

impl TableCollector {
    pub fn into_context(self) -> TablesContext {
        TablesContext::new(self.segments, self.owners)
    }

    pub fn table(&mut self, segment: &TableSegment) {
        self.segments.push(segment.clone());
    }

    pub fn column(&mut self, column: &ColumnRef) {
        if let Some(owner) = &column.owner {
            self.owners.push(owner.clone());
        }
    }

    pub fn select(&mut self, select: &SelectStatement) {
        for table in select.tables() {
            self.table(table);
        }
        for projection in &select.projections.items {
            match projection {
                Projection::Star { owner, .. } => {
                    if let Some(owner) = owner {
                        self.owners.push(owner.clone());
                    }
                }
                Projection::Column { column, .. } => self.column(column),
                Projection::Aggregation { argument, .. } => {
                    if let Some(argument) = argument {
                        self.expr(argument);
                    }
                }
                Projection::Expression { expr, .. } => self.expr(expr),
            }
        }
        for join in &select.joins {
            if let Some(on) = &join.on_condition {
                self.expr(on);
            }
        }
        if let Some(where_clause) = &select.where_clause {
            self.expr(where_clause);
        }
        for item in select.group_by.iter().chain(&select.order_by) {
            self.expr(&item.expr);
        }
        if let Some(having) = &select.having {
            self.expr(having);
        }
    }

    pub fn expr(&mut self, expr: &Expr) {
        let mut subqueries: Vec<SelectStatement> = Vec::new();
        expr.visit(&mut |e| match &e.kind {
            ExprKind::Column(column) => {
                if let Some(owner) = &column.owner {
                    self.owners.push(owner.clone());
                }
            }
            ExprKind::Subquery(select) => subqueries.push(select.as_ref().clone()),
            _ => {}
        });
        for select in &subqueries {
            self.contains_subquery = true;
            self.select(select);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardsql_parser::{parse, Statement};

    fn collect(sql: &str) -> TablesContext {
        let Statement::Select(select) = parse(sql).unwrap() else {
            panic!("not a select");
        };
        let mut collector = TableCollector::default();
        collector.select(&select);
        collector.into_context()
    }

    #[test]
    fn test_table_names_and_references() {
        let sql = "SELECT t_order.order_id, i.item_id FROM t_order JOIN t_order_item i ON t_order.order_id = i.order_id";
        let tables = collect(sql);
        assert_eq!(tables.table_names(), &["t_order", "t_order_item"]);

        // two segment names plus two `t_order.` owners; the alias `i` is not a reference
        let texts: Vec<&str> = tables
            .references()
            .iter()
            .map(|r| r.span.text(sql))
            .collect();
        assert_eq!(texts, vec!["t_order", "t_order", "t_order_item", "t_order"]);
    }

    #[test]
    fn test_schema_qualified_reference_spans_owner() {
        let sql = "SELECT * FROM db.T_ORDER";
        let tables = collect(sql);
        assert_eq!(tables.table_names(), &["t_order"]);
        assert_eq!(tables.references()[0].span.text(sql), "db.T_ORDER");
    }

    #[test]
    fn test_subquery_tables() {
        let tables = collect("SELECT * FROM t_order WHERE user_id IN (SELECT user_id FROM t_user)");
        assert_eq!(tables.table_names(), &["t_order", "t_user"]);
    }

    #[test]
    fn test_find_table_name() {
        let rule = ShardingRule::builder().storage_unit("ds_0").build().unwrap();
        let tables = collect("SELECT * FROM t_order o JOIN t_order_item ON o.order_id = t_order_item.order_id");
        let column = |owner: Option<&str>, name: &str| ColumnRef {
            owner: owner.map(|o| Identifier {
                value: o.to_string(),
                quote: QuoteCharacter::None,
                span: Span::default(),
            }),
            name: Identifier {
                value: name.to_string(),
                quote: QuoteCharacter::None,
                span: Span::default(),
            },
            span: Span::default(),
        };
        assert_eq!(
            tables.find_table_name(&column(Some("O"), "order_id"), &rule),
            Some("t_order".to_string())
        );
        assert_eq!(
            tables.find_table_name(&column(Some("t_order_item"), "order_id"), &rule),
            Some("t_order_item".to_string())
        );
        assert_eq!(tables.find_table_name(&column(None, "order_id"), &rule), None);
        assert_eq!(tables.owner_table("o"), None);
    }
}
