//! Statement level parsing.

use super::SqlParser;
use crate::ast::*;
use crate::error::{SqlParseError, SqlParseResult};
use crate::lexer::Token;

impl SqlParser {
    pub(super) fn parse_statement(&mut self) -> SqlParseResult<Statement> {
        match self.current_token() {
            Token::Select => Ok(Statement::Select(self.parse_select()?)),
            Token::Insert => self.parse_insert(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Create => self.parse_create(),
            Token::Drop => self.parse_drop(),
            Token::Truncate => self.parse_truncate(),
            Token::Begin => {
                self.advance();
                self.consume(&Token::Transaction);
                Ok(Statement::Transaction(TransactionStatement::Begin))
            }
            Token::Start => {
                self.advance();
                self.expect(Token::Transaction)?;
                Ok(Statement::Transaction(TransactionStatement::Begin))
            }
            Token::Commit => {
                self.advance();
                Ok(Statement::Transaction(TransactionStatement::Commit))
            }
            Token::Rollback => {
                self.advance();
                Ok(Statement::Transaction(TransactionStatement::Rollback))
            }
            Token::Set => self.parse_set(),
            Token::Show => self.parse_show(),
            Token::Use => {
                self.advance();
                let database = self.expect_identifier()?;
                Ok(Statement::Use(UseStatement { database }))
            }
            other => Err(SqlParseError::UnsupportedStatement(format!("{:?}", other))),
        }
    }

    pub(super) fn parse_select(&mut self) -> SqlParseResult<SelectStatement> {
        let start = self.expect(Token::Select)?.start;
        let distinct = self.consume(&Token::Distinct);

        let projections = self.parse_projections()?;

        let mut from = Vec::new();
        let mut joins = Vec::new();
        if self.consume(&Token::From) {
            loop {
                from.push(self.parse_table_segment(true)?);
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
            joins = self.parse_join_clauses()?;
        }

        let where_clause = if self.consume(&Token::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group_by = if self.consume(&Token::Group) {
            self.expect(Token::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let having = if self.consume(&Token::Having) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let order_by = if self.consume(&Token::Order) {
            self.expect(Token::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let limit = if *self.current_token() == Token::Limit {
            Some(self.parse_limit()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            projections,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            span: self.span_from(start),
        })
    }

    fn parse_join_clauses(&mut self) -> SqlParseResult<Vec<JoinClause>> {
        let mut joins = Vec::new();

        loop {
            let join_type = match self.current_token() {
                Token::Join => {
                    self.advance();
                    JoinType::Inner
                }
                Token::Inner => {
                    self.advance();
                    self.expect(Token::Join)?;
                    JoinType::Inner
                }
                Token::Cross => {
                    self.advance();
                    self.expect(Token::Join)?;
                    JoinType::Cross
                }
                Token::Left | Token::Right => {
                    let join_type = if *self.current_token() == Token::Left {
                        JoinType::Left
                    } else {
                        JoinType::Right
                    };
                    self.advance();
                    self.consume(&Token::Outer);
                    self.expect(Token::Join)?;
                    join_type
                }
                _ => break,
            };

            let table = self.parse_table_segment(true)?;

            let on_condition = if self.consume(&Token::On) {
                Some(self.parse_expression()?)
            } else {
                None
            };

            joins.push(JoinClause {
                join_type,
                table,
                on_condition,
            });
        }

        Ok(joins)
    }

    fn parse_projections(&mut self) -> SqlParseResult<Projections> {
        let start = self.current_span().start;
        let mut items = Vec::new();

        loop {
            items.push(self.parse_projection()?);
            if !self.consume(&Token::Comma) {
                break;
            }
        }

        Ok(Projections {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_projection(&mut self) -> SqlParseResult<Projection> {
        let start = self.current_span().start;

        if self.consume(&Token::Star) {
            return Ok(Projection::Star {
                owner: None,
                span: self.span_from(start),
            });
        }

        // owner.*
        if Self::is_identifier_token(self.current_token())
            && *self.peek_token(1) == Token::Dot
            && *self.peek_token(2) == Token::Star
        {
            let owner = self.expect_identifier()?;
            self.advance(); // .
            self.advance(); // *
            return Ok(Projection::Star {
                owner: Some(owner),
                span: self.span_from(start),
            });
        }

        if let Token::Identifier(name) = self.current_token() {
            if let Some(function) = AggregationType::from_name(name) {
                if *self.peek_token(1) == Token::LeftParen {
                    let checkpoint = self.position;
                    if let Some(projection) = self.parse_aggregation_projection(start, function)? {
                        return Ok(projection);
                    }
                    self.position = checkpoint;
                }
            }
        }

        let expr = self.parse_expression()?;
        let alias = self.parse_optional_alias()?;
        let span = self.span_from(start);

        Ok(match expr.kind {
            ExprKind::Column(column) => Projection::Column {
                column,
                alias,
                span,
            },
            _ => Projection::Expression { expr, alias, span },
        })
    }

    fn parse_aggregation_projection(
        &mut self,
        start: usize,
        function: AggregationType,
    ) -> SqlParseResult<Option<Projection>> {
        self.advance(); // function name
        self.expect(Token::LeftParen)?;
        let distinct = self.consume(&Token::Distinct);

        let argument = if self.consume(&Token::Star) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(Token::RightParen)?;

        // `SUM(x) + 1` is a plain expression, not an aggregation projection
        if matches!(
            self.current_token(),
            Token::Plus | Token::Minus | Token::Star | Token::Slash | Token::Percent
        ) {
            return Ok(None);
        }

        let alias = self.parse_optional_alias()?;

        Ok(Some(Projection::Aggregation {
            function,
            distinct,
            argument,
            alias,
            span: self.span_from(start),
        }))
    }

    fn parse_order_by_list(&mut self) -> SqlParseResult<Vec<OrderByItem>> {
        let mut items = Vec::new();

        loop {
            let start = self.current_span().start;
            let expr = self.parse_additive_expression()?;
            let descending = match self.current_token() {
                Token::Desc => {
                    self.advance();
                    true
                }
                Token::Asc => {
                    self.advance();
                    false
                }
                _ => false,
            };
            items.push(OrderByItem {
                expr,
                descending,
                span: self.span_from(start),
            });

            if !self.consume(&Token::Comma) {
                break;
            }
        }

        Ok(items)
    }

    fn parse_limit_value(&mut self) -> SqlParseResult<LimitValue> {
        let span = self.current_span();
        let kind = match self.current_token() {
            Token::Integer(n) => LimitValueKind::Literal(*n),
            Token::Placeholder(index) => LimitValueKind::Parameter(*index),
            _ => return Err(self.unexpected("integer or parameter in LIMIT")),
        };
        self.advance();
        Ok(LimitValue { kind, span })
    }

    /// `LIMIT n`, `LIMIT offset, n` or `LIMIT n OFFSET offset`
    fn parse_limit(&mut self) -> SqlParseResult<LimitClause> {
        let start = self.expect(Token::Limit)?.start;
        let first = self.parse_limit_value()?;

        let (offset, row_count) = if self.consume(&Token::Comma) {
            (Some(first), Some(self.parse_limit_value()?))
        } else if self.consume(&Token::Offset) {
            (Some(self.parse_limit_value()?), Some(first))
        } else {
            (None, Some(first))
        };

        Ok(LimitClause {
            offset,
            row_count,
            span: self.span_from(start),
        })
    }

    fn parse_column_ref(&mut self) -> SqlParseResult<ColumnRef> {
        let start = self.current_span().start;
        let first = self.expect_identifier()?;
        let (owner, name) = if self.consume(&Token::Dot) {
            (Some(first), self.expect_identifier()?)
        } else {
            (None, first)
        };
        Ok(ColumnRef {
            owner,
            name,
            span: self.span_from(start),
        })
    }

    fn parse_assignments(&mut self) -> SqlParseResult<Vec<Assignment>> {
        let mut assignments = Vec::new();
        loop {
            let start = self.current_span().start;
            let column = self.parse_column_ref()?;
            self.expect(Token::Equal)?;
            let value = self.parse_expression()?;
            assignments.push(Assignment {
                column,
                value,
                span: self.span_from(start),
            });
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        Ok(assignments)
    }

    fn parse_insert(&mut self) -> SqlParseResult<Statement> {
        let start = self.expect(Token::Insert)?.start;
        self.consume(&Token::Into);

        let table = self.parse_table_segment(false)?;

        let mut columns = Vec::new();
        if self.consume(&Token::LeftParen) {
            loop {
                columns.push(self.expect_identifier()?);
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RightParen)?;
        }

        self.expect(Token::Values)?;
        let mut values = Vec::new();
        loop {
            let row_start = self.expect(Token::LeftParen)?.start;
            let exprs = if *self.current_token() == Token::RightParen {
                Vec::new()
            } else {
                self.parse_expression_list()?
            };
            self.expect(Token::RightParen)?;
            values.push(ValuesRow {
                exprs,
                span: self.span_from(row_start),
            });
            if !self.consume(&Token::Comma) {
                break;
            }
        }

        let on_duplicate_key_update = if self.consume(&Token::On) {
            self.expect(Token::Duplicate)?;
            self.expect(Token::Key)?;
            self.expect(Token::Update)?;
            self.parse_assignments()?
        } else {
            Vec::new()
        };

        Ok(Statement::Insert(InsertStatement {
            table,
            columns,
            values,
            on_duplicate_key_update,
            span: self.span_from(start),
        }))
    }

    fn parse_update(&mut self) -> SqlParseResult<Statement> {
        let start = self.expect(Token::Update)?.start;
        let table = self.parse_table_segment(true)?;
        self.expect(Token::Set)?;
        let assignments = self.parse_assignments()?;

        let where_clause = if self.consume(&Token::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Statement::Update(UpdateStatement {
            table,
            assignments,
            where_clause,
            span: self.span_from(start),
        }))
    }

    fn parse_delete(&mut self) -> SqlParseResult<Statement> {
        let start = self.expect(Token::Delete)?.start;
        self.expect(Token::From)?;
        let table = self.parse_table_segment(true)?;

        let where_clause = if self.consume(&Token::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Statement::Delete(DeleteStatement {
            table,
            where_clause,
            span: self.span_from(start),
        }))
    }

    fn parse_create(&mut self) -> SqlParseResult<Statement> {
        self.expect(Token::Create)?;
        match self.current_token() {
            Token::Table => {
                self.advance();
                let if_not_exists = if self.consume(&Token::If) {
                    self.expect(Token::Not)?;
                    self.expect(Token::Exists)?;
                    true
                } else {
                    false
                };
                let table = self.parse_table_segment(false)?;
                // column definitions and table options are passed through untouched
                self.skip_to_end();
                Ok(Statement::CreateTable(CreateTableStatement {
                    table,
                    if_not_exists,
                }))
            }
            Token::Unique | Token::Index => {
                let unique = self.consume(&Token::Unique);
                self.expect(Token::Index)?;
                let index = self.expect_identifier()?;
                self.expect(Token::On)?;
                let table = self.parse_table_segment(false)?;
                self.skip_parenthesized()?;
                self.skip_to_end();
                Ok(Statement::CreateIndex(CreateIndexStatement {
                    index,
                    table,
                    unique,
                }))
            }
            other => Err(SqlParseError::UnsupportedStatement(format!(
                "CREATE {:?}",
                other
            ))),
        }
    }

    fn parse_drop(&mut self) -> SqlParseResult<Statement> {
        self.expect(Token::Drop)?;
        match self.current_token() {
            Token::Table => {
                self.advance();
                let if_exists = if self.consume(&Token::If) {
                    self.expect(Token::Exists)?;
                    true
                } else {
                    false
                };
                let mut tables = Vec::new();
                loop {
                    tables.push(self.parse_table_segment(false)?);
                    if !self.consume(&Token::Comma) {
                        break;
                    }
                }
                Ok(Statement::DropTable(DropTableStatement { tables, if_exists }))
            }
            Token::Index => {
                self.advance();
                let index = self.expect_identifier()?;
                let table = if self.consume(&Token::On) {
                    Some(self.parse_table_segment(false)?)
                } else {
                    None
                };
                Ok(Statement::DropIndex(DropIndexStatement { index, table }))
            }
            other => Err(SqlParseError::UnsupportedStatement(format!(
                "DROP {:?}",
                other
            ))),
        }
    }

    fn parse_truncate(&mut self) -> SqlParseResult<Statement> {
        self.expect(Token::Truncate)?;
        self.consume(&Token::Table);
        let table = self.parse_table_segment(false)?;
        Ok(Statement::TruncateTable(TruncateTableStatement { table }))
    }

    /// `SET name = value` or `SET name value` (e.g. `SET NAMES utf8mb4`)
    fn parse_set(&mut self) -> SqlParseResult<Statement> {
        self.expect(Token::Set)?;
        let mut variable = self.expect_identifier()?.value;
        while self.consume(&Token::Dot) {
            variable.push('.');
            variable.push_str(&self.expect_identifier()?.value);
        }
        self.consume(&Token::Equal);
        let value = self.parse_expression()?;
        Ok(Statement::Set(SetStatement { variable, value }))
    }

    fn parse_show(&mut self) -> SqlParseResult<Statement> {
        self.expect(Token::Show)?;
        let show = match self.current_token() {
            Token::Databases => {
                self.advance();
                ShowStatement::Databases
            }
            Token::Tables => {
                self.advance();
                ShowStatement::Tables
            }
            Token::Create => {
                self.advance();
                self.expect(Token::Table)?;
                ShowStatement::CreateTable(self.parse_table_segment(false)?)
            }
            Token::Columns => {
                self.advance();
                if !self.consume(&Token::From) {
                    self.expect(Token::In)?;
                }
                ShowStatement::Columns(self.parse_table_segment(false)?)
            }
            other => {
                return Err(SqlParseError::UnsupportedStatement(format!(
                    "SHOW {:?}",
                    other
                )))
            }
        };
        Ok(Statement::Show(show))
    }
}
