//! SQL tokenizer that keeps byte offsets for every token.

use crate::ast::Span;
use crate::error::{SqlParseError, SqlParseResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // SQL Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Drop,
    Truncate,
    Table,
    Index,
    Unique,

    // Clauses
    Order,
    By,
    Group,
    Having,
    Limit,
    Offset,
    As,
    Distinct,

    // Joins
    Join,
    Left,
    Right,
    Inner,
    Outer,
    Cross,
    On,

    // Logical
    And,
    Or,
    Not,

    // Comparison
    Is,
    Null,
    Between,
    Like,
    In,
    Exists,
    If,

    // Boolean
    True,
    False,

    // Sort direction
    Asc,
    Desc,

    // MySQL / administrative
    Duplicate,
    Key,
    Begin,
    Start,
    Transaction,
    Commit,
    Rollback,
    Show,
    Use,
    Tables,
    Databases,
    Columns,

    // Literals and identifiers
    Identifier(String),
    QuotedIdentifier(String, char),
    Integer(i64),
    Float(f64),
    String(String),
    /// Parameter marker with its 0-based ordinal
    Placeholder(usize),

    // Operators
    Equal,         // =
    NotEqual,      // != or <>
    LessThan,      // <
    LessThanEq,    // <=
    GreaterThan,   // >
    GreaterThanEq, // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %

    // Delimiters
    Comma,      // ,
    Dot,        // .
    LeftParen,  // (
    RightParen, // )
    Semicolon,  // ;

    // Special
    Eof,
}

impl Token {
    /// Keywords that may also appear as plain table or column names.
    pub fn soft_keyword_name(&self) -> Option<&'static str> {
        match self {
            Token::Key => Some("key"),
            Token::Tables => Some("tables"),
            Token::Databases => Some("databases"),
            Token::Columns => Some("columns"),
            Token::Transaction => Some("transaction"),
            Token::Start => Some("start"),
            Token::Duplicate => Some("duplicate"),
            Token::Begin => Some("begin"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub struct SqlLexer<'a> {
    source: &'a str,
    input: Vec<(usize, char)>,
    position: usize,
    current_char: Option<char>,
    next_placeholder: usize,
}

impl<'a> SqlLexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let input: Vec<(usize, char)> = source.char_indices().collect();
        let current_char = input.first().map(|(_, c)| *c);

        Self {
            source,
            input,
            position: 0,
            current_char,
            next_placeholder: 0,
        }
    }

    /// Byte offset of the current character, or the input length at the end.
    fn offset(&self) -> usize {
        self.input
            .get(self.position)
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).map(|(_, c)| *c);
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).map(|(_, c)| *c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> SqlParseResult<()> {
        self.advance(); // skip /
        self.advance(); // skip *
        while let Some(ch) = self.current_char {
            if ch == '*' && self.peek() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(SqlParseError::Unterminated("block comment".to_string()))
    }

    fn read_number(&mut self) -> SqlParseResult<Token> {
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| SqlParseError::InvalidNumber(num_str))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| SqlParseError::InvalidNumber(num_str))
        }
    }

    fn read_string(&mut self) -> SqlParseResult<Token> {
        self.advance(); // skip opening quote

        let mut string = String::new();

        while let Some(ch) = self.current_char {
            if ch == '\'' {
                // doubled quote escapes itself
                if self.peek() == Some('\'') {
                    string.push('\'');
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(Token::String(string));
                }
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    string.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        _ => escaped,
                    });
                    self.advance();
                }
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(SqlParseError::Unterminated("string literal".to_string()))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // keywords are case-insensitive
        match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" | "VALUE" => Token::Values,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "CREATE" => Token::Create,
            "DROP" => Token::Drop,
            "TRUNCATE" => Token::Truncate,
            "TABLE" => Token::Table,
            "INDEX" => Token::Index,
            "UNIQUE" => Token::Unique,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "GROUP" => Token::Group,
            "HAVING" => Token::Having,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "AS" => Token::As,
            "DISTINCT" => Token::Distinct,
            "JOIN" => Token::Join,
            "LEFT" => Token::Left,
            "RIGHT" => Token::Right,
            "INNER" => Token::Inner,
            "OUTER" => Token::Outer,
            "CROSS" => Token::Cross,
            "ON" => Token::On,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "BETWEEN" => Token::Between,
            "LIKE" => Token::Like,
            "IN" => Token::In,
            "EXISTS" => Token::Exists,
            "IF" => Token::If,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "DUPLICATE" => Token::Duplicate,
            "KEY" => Token::Key,
            "BEGIN" => Token::Begin,
            "START" => Token::Start,
            "TRANSACTION" => Token::Transaction,
            "COMMIT" => Token::Commit,
            "ROLLBACK" => Token::Rollback,
            "SHOW" => Token::Show,
            "USE" => Token::Use,
            "TABLES" => Token::Tables,
            "DATABASES" | "SCHEMAS" => Token::Databases,
            "COLUMNS" | "FIELDS" => Token::Columns,
            _ => Token::Identifier(ident),
        }
    }

    fn read_quoted_identifier(&mut self, quote: char) -> SqlParseResult<Token> {
        self.advance(); // skip opening quote

        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if ch == quote {
                if self.peek() == Some(quote) {
                    ident.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(Token::QuotedIdentifier(ident, quote));
            }
            ident.push(ch);
            self.advance();
        }

        Err(SqlParseError::Unterminated("quoted identifier".to_string()))
    }

    fn read_placeholder(&mut self) -> SqlParseResult<Token> {
        if self.current_char == Some('?') {
            self.advance();
            let ordinal = self.next_placeholder;
            self.next_placeholder += 1;
            return Ok(Token::Placeholder(ordinal));
        }

        // $n style, 1-based in the text
        let start = self.offset();
        self.advance(); // skip $
        let mut digits = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Token::Placeholder(n - 1)),
            _ => Err(SqlParseError::syntax(
                start,
                "expected parameter number after '$'",
            )),
        }
    }

    pub fn next_token(&mut self) -> SqlParseResult<SpannedToken> {
        loop {
            self.skip_whitespace();

            match self.current_char {
                Some('-') if self.peek() == Some('-') => self.skip_line_comment(),
                Some('#') => self.skip_line_comment(),
                Some('/') if self.peek() == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }

        let start = self.offset();
        let token = self.scan_token(start)?;
        Ok(SpannedToken {
            token,
            span: Span::new(start, self.offset()),
        })
    }

    fn scan_token(&mut self, start: usize) -> SqlParseResult<Token> {
        let token = match self.current_char {
            None => Token::Eof,

            Some(ch) if ch.is_ascii_digit() => return self.read_number(),

            Some('\'') => return self.read_string(),

            Some(q @ ('`' | '"')) => return self.read_quoted_identifier(q),

            Some(ch) if ch.is_alphabetic() || ch == '_' => return Ok(self.read_identifier()),

            Some('?') => return self.read_placeholder(),
            Some('$') if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                return self.read_placeholder()
            }

            Some('=') => {
                self.advance();
                Token::Equal
            }

            Some('!') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Not
                }
            }

            Some('<') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessThanEq
                } else if self.current_char == Some('>') {
                    self.advance();
                    Token::NotEqual // <>
                } else {
                    Token::LessThan
                }
            }

            Some('>') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterThanEq
                } else {
                    Token::GreaterThan
                }
            }

            Some('+') => {
                self.advance();
                Token::Plus
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some('/') => {
                self.advance();
                Token::Slash
            }
            Some('%') => {
                self.advance();
                Token::Percent
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('.') => {
                self.advance();
                Token::Dot
            }
            Some('(') => {
                self.advance();
                Token::LeftParen
            }
            Some(')') => {
                self.advance();
                Token::RightParen
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }

            Some(ch) => {
                return Err(SqlParseError::syntax(
                    start,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };

        Ok(token)
    }

    pub fn tokenize(&mut self) -> SqlParseResult<Vec<SpannedToken>> {
        let mut tokens = Vec::new();

        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        SqlLexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_select_keywords() {
        let tokens = tokenize("SELECT FROM WHERE");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::From);
        assert_eq!(tokens[2], Token::Where);
        assert_eq!(tokens[3], Token::Eof);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(tokenize("select")[0], Token::Select);
        assert_eq!(tokenize("Select")[0], Token::Select);
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(
            tokenize("`t_order`")[0],
            Token::QuotedIdentifier("t_order".to_string(), '`')
        );
        assert_eq!(
            tokenize("\"order\"")[0],
            Token::QuotedIdentifier("order".to_string(), '"')
        );
        assert_eq!(tokenize("'it''s'")[0], Token::String("it's".to_string()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("123")[0], Token::Integer(123));
        assert_eq!(tokenize("3.5")[0], Token::Float(3.5));
    }

    #[test]
    fn test_placeholders_are_numbered() {
        let tokens = tokenize("? , ? , $5");
        assert_eq!(tokens[0], Token::Placeholder(0));
        assert_eq!(tokens[2], Token::Placeholder(1));
        assert_eq!(tokens[4], Token::Placeholder(4));
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let sql = "SELECT é, `x` FROM t";
        let tokens = SqlLexer::new(sql).tokenize().unwrap();
        let quoted = &tokens[3];
        assert_eq!(quoted.span.text(sql), "`x`");
        let table = &tokens[5];
        assert_eq!(table.span.text(sql), "t");
        assert_eq!(tokens.last().unwrap().span, Span::point(sql.len()));
    }

    #[test]
    fn test_comments() {
        let tokens = tokenize("SELECT -- comment\n* /* block */ FROM # tail\nusers");
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::Star);
        assert_eq!(tokens[2], Token::From);
        assert_eq!(tokens[3], Token::Identifier("users".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = SqlLexer::new("SELECT 'abc").tokenize().unwrap_err();
        assert!(matches!(err, SqlParseError::Unterminated(_)));
    }
}
