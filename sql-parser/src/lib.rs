//! shardsql-parser - span-preserving SQL statement parser.
//!
//! Produces an AST in which every table, column, projection, pagination value
//! and VALUES row keeps the byte range it occupied in the original text, so a
//! rewriter can replace fragments without re-printing the statement.
//!
//! # Example
//!
//! ```rust
//! use shardsql_parser::{parse, Statement};
//!
//! let sql = "SELECT * FROM t_order WHERE order_id = ?";
//! let Statement::Select(select) = parse(sql).unwrap() else { panic!() };
//! assert_eq!(select.from[0].name.span.text(sql), "t_order");
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use error::{SqlParseError, SqlParseResult};
pub use lexer::{SpannedToken, SqlLexer, Token};
pub use parser::SqlParser;

/// Parse a single SQL statement.
pub fn parse(sql: &str) -> SqlParseResult<Statement> {
    SqlParser::new(sql)?.parse()
}
