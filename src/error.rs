use shardsql_parser::SqlParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Range query on sharding column '{column}' requires a range algorithm")]
    UnsupportedRangeQuery { column: String },

    #[error("Binding table '{table}' routes to {actual} tables in '{data_source}', expected {expected} like '{representative}'")]
    BindingTableMismatch {
        table: String,
        representative: String,
        data_source: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid inline expression '{expression}': {reason}")]
    InvalidInlineExpression { expression: String, reason: String },

    #[error("Sharding column '{0}' has no value for inline evaluation")]
    MissingShardingColumn(String),

    #[error("Invalid sharding value: {0}")]
    InvalidShardingValue(String),

    #[error("No route found for table '{0}'")]
    RouteNotFound(String),

    #[error("Insert row routes to more than one data node for table '{0}'")]
    InsertRouteToMultipleNodes(String),

    #[error("Parameter index {index} out of range, {count} parameters supplied")]
    ParameterIndexOutOfRange { index: usize, count: usize },

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("Parse error: {0}")]
    Parse(#[from] SqlParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type ShardResult<T> = Result<T, ShardError>;

/// Coarse classification of [`ShardError`], independent of the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    RoutingEmptiness,
    Extraction,
    InternalConsistency,
    Unsupported,
    Parse,
}

impl ShardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShardError::Configuration(_)
            | ShardError::UnsupportedRangeQuery { .. }
            | ShardError::BindingTableMismatch { .. }
            | ShardError::InvalidInlineExpression { .. }
            | ShardError::MissingShardingColumn(_)
            | ShardError::IoError(_)
            | ShardError::TomlError(_) => ErrorKind::Configuration,
            ShardError::RouteNotFound(_) | ShardError::InsertRouteToMultipleNodes(_) => {
                ErrorKind::RoutingEmptiness
            }
            ShardError::ParameterIndexOutOfRange { .. } | ShardError::InvalidShardingValue(_) => {
                ErrorKind::Extraction
            }
            ShardError::InternalConsistency(_) => ErrorKind::InternalConsistency,
            ShardError::UnsupportedStatement(_) => ErrorKind::Unsupported,
            ShardError::Parse(_) => ErrorKind::Parse,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ShardError::Configuration(msg.into())
    }
}

impl serde::Serialize for ShardError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ShardError::UnsupportedRangeQuery {
            column: "order_id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Range query on sharding column 'order_id' requires a range algorithm"
        );

        let err = ShardError::RouteNotFound("t_order".to_string());
        assert_eq!(err.to_string(), "No route found for table 't_order'");

        let err = ShardError::ParameterIndexOutOfRange { index: 3, count: 2 };
        assert_eq!(
            err.to_string(),
            "Parameter index 3 out of range, 2 parameters supplied"
        );

        let err = ShardError::InternalConsistency("missing mapper".to_string());
        assert_eq!(err.to_string(), "Internal consistency error: missing mapper");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ShardError::config("bad").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ShardError::BindingTableMismatch {
                table: "t_order_item".to_string(),
                representative: "t_order".to_string(),
                data_source: "ds_0".to_string(),
                expected: 2,
                actual: 1,
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ShardError::RouteNotFound("t".to_string()).kind(),
            ErrorKind::RoutingEmptiness
        );
        assert_eq!(
            ShardError::ParameterIndexOutOfRange { index: 1, count: 0 }.kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            ShardError::InternalConsistency("x".to_string()).kind(),
            ErrorKind::InternalConsistency
        );
        let parse = ShardError::from(SqlParseError::UnsupportedStatement("GRANT".to_string()));
        assert_eq!(parse.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_error_serializes_as_message() {
        let err = ShardError::RouteNotFound("t_order".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"No route found for table 't_order'\"");
    }
}
