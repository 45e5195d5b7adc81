//! Recursive descent parser for the supported statement subset.
//!
//! The parser is split into several modules:
//! - `statements`: statement level parsing (SELECT, INSERT, DDL, administrative)
//! - `expressions`: predicate and scalar expression parsing

mod expressions;
mod statements;

#[cfg(test)]
mod tests;

use crate::ast::{Identifier, QuoteCharacter, Span, Statement, TableSegment};
use crate::error::{SqlParseError, SqlParseResult};
use crate::lexer::{SpannedToken, SqlLexer, Token};

/// SQL Parser
pub struct SqlParser {
    sql: String,
    tokens: Vec<SpannedToken>,
    position: usize,
    eof: SpannedToken,
}

impl SqlParser {
    pub fn new(input: &str) -> SqlParseResult<Self> {
        let mut lexer = SqlLexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            sql: input.to_string(),
            tokens,
            position: 0,
            eof: SpannedToken {
                token: Token::Eof,
                span: Span::point(input.len()),
            },
        })
    }

    /// Parse a single statement; an optional trailing semicolon is accepted.
    pub fn parse(&mut self) -> SqlParseResult<Statement> {
        let stmt = self.parse_statement()?;

        if *self.current_token() == Token::Semicolon {
            self.advance();
        }

        if *self.current_token() != Token::Eof {
            return Err(self.unexpected("end of statement"));
        }

        Ok(stmt)
    }

    fn current(&self) -> &SpannedToken {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn current_token(&self) -> &Token {
        &self.current().token
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn peek_token(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    /// End offset of the last consumed token.
    fn last_stop(&self) -> usize {
        if self.position == 0 {
            return 0;
        }
        self.tokens
            .get(self.position - 1)
            .map(|t| t.span.stop)
            .unwrap_or(self.eof.span.stop)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_stop().max(start))
    }

    fn unexpected(&self, expected: &str) -> SqlParseError {
        SqlParseError::syntax(
            self.current_span().start,
            format!("expected {}, found {:?}", expected, self.current_token()),
        )
    }

    fn expect(&mut self, expected: Token) -> SqlParseResult<Span> {
        if *self.current_token() == expected {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    /// Consume `token` if it is next, reporting whether it was there.
    fn consume(&mut self, token: &Token) -> bool {
        if self.current_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_identifier_token(token: &Token) -> bool {
        matches!(token, Token::Identifier(_) | Token::QuotedIdentifier(..))
            || token.soft_keyword_name().is_some()
    }

    fn expect_identifier(&mut self) -> SqlParseResult<Identifier> {
        let span = self.current_span();
        let ident = match self.current_token() {
            Token::Identifier(name) => Identifier {
                value: name.clone(),
                quote: QuoteCharacter::None,
                span,
            },
            Token::QuotedIdentifier(name, quote) => Identifier {
                value: name.clone(),
                quote: QuoteCharacter::from_char(*quote),
                span,
            },
            other => match other.soft_keyword_name() {
                Some(_) => Identifier {
                    value: span.text(&self.sql).to_string(),
                    quote: QuoteCharacter::None,
                    span,
                },
                None => return Err(self.unexpected("identifier")),
            },
        };
        self.advance();
        Ok(ident)
    }

    /// `[AS] alias`, where a bare alias must be a plain or quoted identifier.
    fn parse_optional_alias(&mut self) -> SqlParseResult<Option<Identifier>> {
        if self.consume(&Token::As) {
            return Ok(Some(self.expect_identifier()?));
        }
        match self.current_token() {
            Token::Identifier(_) | Token::QuotedIdentifier(..) => {
                Ok(Some(self.expect_identifier()?))
            }
            _ => Ok(None),
        }
    }

    /// `[owner.]name [[AS] alias]`
    fn parse_table_segment(&mut self, allow_alias: bool) -> SqlParseResult<TableSegment> {
        let start = self.current_span().start;
        let first = self.expect_identifier()?;
        let (owner, name) = if *self.current_token() == Token::Dot {
            self.advance();
            let name = self.expect_identifier()?;
            (Some(first), name)
        } else {
            (None, first)
        };

        let alias = if allow_alias {
            self.parse_optional_alias()?
        } else {
            None
        };

        Ok(TableSegment {
            owner,
            name,
            alias,
            span: self.span_from(start),
        })
    }

    /// Skip a balanced parenthesised group starting at the current `(`.
    fn skip_parenthesized(&mut self) -> SqlParseResult<()> {
        self.expect(Token::LeftParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.current_token() {
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                Token::Eof => return Err(SqlParseError::Unterminated("parenthesis".to_string())),
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    /// Skip everything up to the end of the statement.
    fn skip_to_end(&mut self) {
        while !matches!(self.current_token(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
    }
}
