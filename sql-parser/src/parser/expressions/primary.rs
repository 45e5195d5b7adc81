//! Primary expression parsing.
//!
//! Handles:
//! - Literals: integers, floats, strings, booleans, null
//! - Parameter markers
//! - Column references and function calls
//! - Parenthesized expressions and subqueries

use crate::ast::{ColumnRef, Expr, ExprKind, Identifier, Literal, QuoteCharacter, Span};
use crate::error::SqlParseResult;
use crate::lexer::Token;
use crate::parser::SqlParser;

impl SqlParser {
    pub(super) fn parse_primary_expression(&mut self) -> SqlParseResult<Expr> {
        let span = self.current_span();
        let literal = match self.current_token().clone() {
            Token::Integer(n) => Some(Literal::Integer(n)),
            Token::Float(n) => Some(Literal::Float(n)),
            Token::String(s) => Some(Literal::String(s)),
            Token::True => Some(Literal::Boolean(true)),
            Token::False => Some(Literal::Boolean(false)),
            Token::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::new(ExprKind::Literal(literal), span));
        }

        match self.current_token().clone() {
            Token::Placeholder(index) => {
                self.advance();
                Ok(Expr::new(ExprKind::Parameter(index), span))
            }
            Token::Minus => self.parse_negation(),
            Token::Plus => {
                self.advance();
                self.parse_primary_expression()
            }
            Token::LeftParen => {
                self.advance();
                let inner = if *self.current_token() == Token::Select {
                    self.parse_subquery_body()?
                } else {
                    self.parse_expression()?
                };
                self.expect(Token::RightParen)?;
                Ok(Expr::new(
                    ExprKind::Nested(Box::new(inner)),
                    self.span_from(span.start),
                ))
            }
            Token::Exists => {
                let name = Identifier {
                    value: "EXISTS".to_string(),
                    quote: QuoteCharacter::None,
                    span,
                };
                self.advance();
                self.expect(Token::LeftParen)?;
                let subquery = self.parse_subquery_body()?;
                self.expect(Token::RightParen)?;
                Ok(Expr::new(
                    ExprKind::Function {
                        name,
                        args: vec![subquery],
                        distinct: false,
                    },
                    self.span_from(span.start),
                ))
            }
            // keyword-named scalar functions such as IF(...), LEFT(...)
            Token::If | Token::Left | Token::Right
                if *self.peek_token(1) == Token::LeftParen =>
            {
                let name = Identifier {
                    value: span.text(&self.sql).to_string(),
                    quote: QuoteCharacter::None,
                    span,
                };
                self.advance();
                self.parse_function_call(name)
            }
            token if Self::is_identifier_token(&token) => {
                let first = self.expect_identifier()?;

                if *self.current_token() == Token::LeftParen {
                    return self.parse_function_call(first);
                }

                let (owner, name) = if self.consume(&Token::Dot) {
                    (Some(first), self.expect_identifier()?)
                } else {
                    (None, first)
                };

                let column_span = self.span_from(span.start);
                Ok(Expr::new(
                    ExprKind::Column(ColumnRef {
                        owner,
                        name,
                        span: column_span,
                    }),
                    column_span,
                ))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `-5` folds into a negative literal; `-x` is kept as `0 - x`.
    fn parse_negation(&mut self) -> SqlParseResult<Expr> {
        let start = self.current_span().start;
        self.advance();
        let operand = self.parse_primary_expression()?;
        let span = Span::new(start, operand.span.stop);

        let kind = match operand.kind {
            ExprKind::Literal(Literal::Integer(n)) => ExprKind::Literal(Literal::Integer(-n)),
            ExprKind::Literal(Literal::Float(n)) => ExprKind::Literal(Literal::Float(-n)),
            kind => ExprKind::Binary {
                left: Box::new(Expr::new(
                    ExprKind::Literal(Literal::Integer(0)),
                    Span::point(start),
                )),
                op: crate::ast::BinaryOperator::Minus,
                right: Box::new(Expr::new(kind, operand.span)),
            },
        };
        Ok(Expr::new(kind, span))
    }

    fn parse_function_call(&mut self, name: Identifier) -> SqlParseResult<Expr> {
        let start = name.span.start;
        self.expect(Token::LeftParen)?;
        let distinct = self.consume(&Token::Distinct);

        let args = if *self.current_token() == Token::Star {
            let star = self.current_span();
            self.advance();
            vec![Expr::new(ExprKind::Wildcard, star)]
        } else if *self.current_token() == Token::RightParen {
            Vec::new()
        } else {
            self.parse_expression_list()?
        };
        self.expect(Token::RightParen)?;

        Ok(Expr::new(
            ExprKind::Function {
                name,
                args,
                distinct,
            },
            self.span_from(start),
        ))
    }

    /// Parse `SELECT ...` inside parentheses; the caller owns the parentheses.
    pub(in crate::parser) fn parse_subquery_body(&mut self) -> SqlParseResult<Expr> {
        let select = self.parse_select()?;
        let span = select.span;
        Ok(Expr::new(ExprKind::Subquery(Box::new(select)), span))
    }
}
