use crate::error::{ShardError, ShardResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical placement of one shard: data source plus actual table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }

    /// Parse `ds_0.t_order_0`.
    pub fn parse(text: &str) -> ShardResult<Self> {
        let text = text.trim();
        match text.split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() && !table.contains('.') => {
                Ok(Self::new(ds, table))
            }
            _ => Err(ShardError::config(format!(
                "Invalid data node '{}', expected <data_source>.<table>",
                text
            ))),
        }
    }

    pub fn matches(&self, data_source: &str, table: &str) -> bool {
        self.data_source.eq_ignore_ascii_case(data_source) && self.table.eq_ignore_ascii_case(table)
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_node() {
        let node = DataNode::parse("ds_0.t_order_1").unwrap();
        assert_eq!(node, DataNode::new("ds_0", "t_order_1"));
        assert_eq!(node.to_string(), "ds_0.t_order_1");
        assert!(node.matches("DS_0", "T_ORDER_1"));
    }

    #[test]
    fn test_parse_invalid_data_node() {
        assert!(DataNode::parse("t_order").is_err());
        assert!(DataNode::parse(".t").is_err());
        assert!(DataNode::parse("a.b.c").is_err());
    }
}
