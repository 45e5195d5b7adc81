//! Expression parsing, lowest precedence first:
//! OR, AND, NOT, comparison / IS / BETWEEN / IN / LIKE, additive, multiplicative, primary.

mod primary;

use super::SqlParser;
use crate::ast::{BinaryOperator, Expr, ExprKind, Span};
use crate::error::SqlParseResult;
use crate::lexer::Token;

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}

impl SqlParser {
    pub(in crate::parser) fn parse_expression(&mut self) -> SqlParseResult<Expr> {
        self.parse_or_expression()
    }

    pub(in crate::parser) fn parse_expression_list(&mut self) -> SqlParseResult<Vec<Expr>> {
        let mut exprs = Vec::new();

        loop {
            exprs.push(self.parse_expression()?);
            if !self.consume(&Token::Comma) {
                break;
            }
        }

        Ok(exprs)
    }

    fn parse_or_expression(&mut self) -> SqlParseResult<Expr> {
        let mut left = self.parse_and_expression()?;

        while self.consume(&Token::Or) {
            let right = self.parse_and_expression()?;
            left = binary(left, BinaryOperator::Or, right);
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> SqlParseResult<Expr> {
        let mut left = self.parse_not_expression()?;

        while self.consume(&Token::And) {
            let right = self.parse_not_expression()?;
            left = binary(left, BinaryOperator::And, right);
        }

        Ok(left)
    }

    fn parse_not_expression(&mut self) -> SqlParseResult<Expr> {
        if *self.current_token() == Token::Not {
            let start = self.current_span().start;
            self.advance();
            let expr = self.parse_not_expression()?;
            let span = Span::new(start, expr.span.stop);
            return Ok(Expr::new(ExprKind::Not(Box::new(expr)), span));
        }

        self.parse_comparison_expression()
    }

    fn parse_comparison_expression(&mut self) -> SqlParseResult<Expr> {
        let left = self.parse_additive_expression()?;
        let start = left.span.start;

        // IS [NOT] NULL
        if self.consume(&Token::Is) {
            let negated = self.consume(&Token::Not);
            self.expect(Token::Null)?;
            return Ok(Expr::new(
                ExprKind::IsNull {
                    expr: Box::new(left),
                    negated,
                },
                self.span_from(start),
            ));
        }

        // [NOT] BETWEEN / IN / LIKE
        let negated = *self.current_token() == Token::Not
            && matches!(self.peek_token(1), Token::Between | Token::In | Token::Like);
        if negated {
            self.advance();
        }

        match self.current_token() {
            Token::Between => {
                self.advance();
                let low = self.parse_additive_expression()?;
                self.expect(Token::And)?;
                let high = self.parse_additive_expression()?;
                return Ok(Expr::new(
                    ExprKind::Between {
                        expr: Box::new(left),
                        low: Box::new(low),
                        high: Box::new(high),
                        negated,
                    },
                    self.span_from(start),
                ));
            }
            Token::In => {
                self.advance();
                self.expect(Token::LeftParen)?;
                let list = if *self.current_token() == Token::Select {
                    vec![self.parse_subquery_body()?]
                } else {
                    self.parse_expression_list()?
                };
                self.expect(Token::RightParen)?;
                return Ok(Expr::new(
                    ExprKind::InList {
                        expr: Box::new(left),
                        list,
                        negated,
                    },
                    self.span_from(start),
                ));
            }
            Token::Like => {
                self.advance();
                let pattern = self.parse_additive_expression()?;
                return Ok(Expr::new(
                    ExprKind::Like {
                        expr: Box::new(left),
                        pattern: Box::new(pattern),
                        negated,
                    },
                    self.span_from(start),
                ));
            }
            _ => {}
        }

        let op = match self.current_token() {
            Token::Equal => Some(BinaryOperator::Eq),
            Token::NotEqual => Some(BinaryOperator::NotEq),
            Token::LessThan => Some(BinaryOperator::Lt),
            Token::LessThanEq => Some(BinaryOperator::LtEq),
            Token::GreaterThan => Some(BinaryOperator::Gt),
            Token::GreaterThanEq => Some(BinaryOperator::GtEq),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive_expression()?;
            return Ok(binary(left, op, right));
        }

        Ok(left)
    }

    pub(in crate::parser) fn parse_additive_expression(&mut self) -> SqlParseResult<Expr> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Plus,
                Token::Minus => BinaryOperator::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> SqlParseResult<Expr> {
        let mut left = self.parse_primary_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary_expression()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }
}
