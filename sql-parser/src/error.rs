//! Error types for shardsql-parser.

use thiserror::Error;

/// Statement parsing error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlParseError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unterminated {0}")]
    Unterminated(String),

    #[error("Invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
}

/// Result type for parser operations
pub type SqlParseResult<T> = Result<T, SqlParseError>;

impl SqlParseError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        SqlParseError::Syntax {
            offset,
            message: message.into(),
        }
    }
}
