//! Sharding rule metadata: data nodes, algorithms, table rules and the
//! copy-on-write store that publishes them.

pub mod algorithm;
pub mod data_node;
pub mod inline;
pub mod sharding_rule;
pub mod store;
pub mod table;

pub use algorithm::{ShardingStrategy, StandardAlgorithm};
pub use data_node::DataNode;
pub use inline::InlineExpression;
pub use sharding_rule::{ShardingRule, ShardingRuleBuilder, TableKind};
pub use store::RuleStore;
pub use table::TableRule;
