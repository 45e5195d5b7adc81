//! Rule file loading.
//!
//! A rule file is TOML:
//!
//! ```toml
//! storage_units = ["ds_0", "ds_1"]
//! broadcast_tables = ["t_config"]
//! binding_groups = [["t_order", "t_order_item"]]
//!
//! [props]
//! sql_show = true
//!
//! [[tables]]
//! name = "t_order"
//! actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
//! database_strategy = { type = "inline", column = "user_id", expression = "ds_${user_id % 2}" }
//! table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }
//! ```
//!
//! ## Environment Variables
//!
//! - `SHARDSQL_SQL_SHOW` - `true`/`false`, overrides `props.sql_show`
//! - `SHARDSQL_DEFAULT_DATA_SOURCE` - overrides `default_data_source`
//!
//! These can be set in a `.env` file next to the rule file.

use crate::error::{ShardError, ShardResult};
use crate::rule::inline::{expand, InlineExpression};
use crate::rule::{DataNode, ShardingRule, ShardingStrategy, StandardAlgorithm, TableRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable names
pub const ENV_SQL_SHOW: &str = "SHARDSQL_SQL_SHOW";
pub const ENV_DEFAULT_DATA_SOURCE: &str = "SHARDSQL_DEFAULT_DATA_SOURCE";

/// Router behaviour switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterProps {
    /// Log logic and actual SQL of every statement at info level
    #[serde(default)]
    pub sql_show: bool,
    /// Let inline strategies answer range predicates with every target
    #[serde(default)]
    pub allow_range_query_with_inline_sharding: bool,
    /// Widest integer range a complex strategy enumerates value by value
    #[serde(default = "default_max_enumerated_range")]
    pub max_enumerated_range: u64,
    /// Merge plain selects hitting one data source into a UNION ALL
    #[serde(default = "default_union_all_rewrite")]
    pub union_all_rewrite: bool,
}

fn default_max_enumerated_range() -> u64 {
    64
}

fn default_union_all_rewrite() -> bool {
    true
}

impl Default for RouterProps {
    fn default() -> Self {
        Self {
            sql_show: false,
            allow_range_query_with_inline_sharding: false,
            max_enumerated_range: default_max_enumerated_range(),
            union_all_rewrite: default_union_all_rewrite(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    Mod { sharding_count: u64 },
    HashMod { sharding_count: u64 },
    BoundaryRange { boundaries: Vec<i64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Standard {
        column: String,
        algorithm: AlgorithmConfig,
        /// Defaults to `algorithm` when it can answer ranges.
        #[serde(default)]
        range_algorithm: Option<AlgorithmConfig>,
    },
    Complex {
        columns: Vec<String>,
        expression: String,
        #[serde(default)]
        allow_range_query: Option<bool>,
    },
    Hint {
        expression: String,
    },
    Inline {
        column: String,
        expression: String,
        #[serde(default)]
        allow_range_query: Option<bool>,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// Inline node expression such as `ds_${0..1}.t_order_${0..1}`
    pub actual_data_nodes: String,
    #[serde(default)]
    pub database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub table_strategy: Option<StrategyConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub storage_units: Vec<String>,
    #[serde(default)]
    pub default_data_source: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub binding_groups: Vec<Vec<String>>,
    #[serde(default)]
    pub broadcast_tables: Vec<String>,
    /// Logic table to data source
    #[serde(default)]
    pub single_tables: BTreeMap<String, String>,
    #[serde(default)]
    pub default_database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub default_table_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub props: RouterProps,
}

impl RouterConfig {
    /// Load a rule file, reading a `.env` next to it first and applying
    /// environment overrides afterwards.
    pub fn load(path: &Path) -> ShardResult<Self> {
        if let Some(dir) = path.parent() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
            }
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ShardResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(show) = std::env::var(ENV_SQL_SHOW) {
            if let Ok(show) = show.trim().parse::<bool>() {
                self.props.sql_show = show;
            }
        }

        if let Ok(ds) = std::env::var(ENV_DEFAULT_DATA_SOURCE) {
            if !ds.is_empty() {
                self.default_data_source = Some(ds);
            }
        }
    }

    /// Compile into the in-memory rule the router works on.
    pub fn build_rule(&self) -> ShardResult<ShardingRule> {
        let mut builder = ShardingRule::builder()
            .storage_units(self.storage_units.iter().cloned())
            .props(self.props.clone());

        for table in &self.tables {
            builder = builder.table_rule(self.build_table_rule(table)?);
        }
        for group in &self.binding_groups {
            builder = builder.binding_group(group);
        }
        for table in &self.broadcast_tables {
            builder = builder.broadcast_table(table.clone());
        }
        for (table, ds) in &self.single_tables {
            builder = builder.single_table(table.clone(), ds.clone());
        }
        if let Some(strategy) = &self.default_database_strategy {
            builder = builder.default_database_strategy(self.build_strategy(strategy)?);
        }
        if let Some(strategy) = &self.default_table_strategy {
            builder = builder.default_table_strategy(self.build_strategy(strategy)?);
        }
        if let Some(ds) = &self.default_data_source {
            builder = builder.default_data_source(ds.clone());
        }

        builder.build()
    }

    fn build_table_rule(&self, table: &TableConfig) -> ShardResult<TableRule> {
        let nodes = expand(&table.actual_data_nodes)?
            .iter()
            .map(|node| DataNode::parse(node))
            .collect::<ShardResult<Vec<_>>>()?;

        let mut rule = TableRule::new(table.name.clone(), nodes)?;
        if let Some(strategy) = &table.database_strategy {
            rule = rule.with_database_strategy(self.build_strategy(strategy)?);
        }
        if let Some(strategy) = &table.table_strategy {
            rule = rule.with_table_strategy(self.build_strategy(strategy)?);
        }
        Ok(rule)
    }

    fn build_strategy(&self, config: &StrategyConfig) -> ShardResult<ShardingStrategy> {
        Ok(match config {
            StrategyConfig::Standard {
                column,
                algorithm,
                range_algorithm,
            } => {
                let precise = build_algorithm(algorithm)?;
                let range = match range_algorithm {
                    Some(range) => {
                        let range = build_algorithm(range)?;
                        if !range.supports_range() {
                            return Err(ShardError::config(format!(
                                "Algorithm '{}' cannot route range queries",
                                range.name()
                            )));
                        }
                        Some(range)
                    }
                    None if precise.supports_range() => Some(precise.clone()),
                    None => None,
                };
                ShardingStrategy::Standard {
                    column: column.clone(),
                    precise,
                    range,
                }
            }
            StrategyConfig::Complex {
                columns,
                expression,
                allow_range_query,
            } => {
                if columns.is_empty() {
                    return Err(ShardError::config("Complex strategy needs at least one column"));
                }
                let expression = InlineExpression::compile(expression)?;
                ensure_variables(&expression, columns)?;
                ShardingStrategy::Complex {
                    columns: columns.clone(),
                    expression,
                    allow_range_query: allow_range_query
                        .unwrap_or(self.props.allow_range_query_with_inline_sharding),
                    max_enumerated_range: self.props.max_enumerated_range,
                }
            }
            StrategyConfig::Hint { expression } => ShardingStrategy::Hint {
                expression: InlineExpression::compile(expression)?,
            },
            StrategyConfig::Inline {
                column,
                expression,
                allow_range_query,
            } => {
                let expression = InlineExpression::compile(expression)?;
                ensure_variables(&expression, std::slice::from_ref(column))?;
                ShardingStrategy::Inline {
                    column: column.clone(),
                    expression,
                    allow_range_query: allow_range_query
                        .unwrap_or(self.props.allow_range_query_with_inline_sharding),
                }
            }
            StrategyConfig::None => ShardingStrategy::None,
        })
    }
}

fn build_algorithm(config: &AlgorithmConfig) -> ShardResult<StandardAlgorithm> {
    let algorithm = match config {
        AlgorithmConfig::Mod { sharding_count } => StandardAlgorithm::Mod {
            sharding_count: *sharding_count,
        },
        AlgorithmConfig::HashMod { sharding_count } => StandardAlgorithm::HashMod {
            sharding_count: *sharding_count,
        },
        AlgorithmConfig::BoundaryRange { boundaries } => StandardAlgorithm::BoundaryRange {
            boundaries: boundaries.clone(),
        },
    };
    algorithm.validate()?;
    Ok(algorithm)
}

/// Every variable of a routing expression must be one of the sharding columns.
fn ensure_variables(expression: &InlineExpression, columns: &[String]) -> ShardResult<()> {
    for variable in expression.variables() {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&variable)) {
            return Err(ShardError::InvalidInlineExpression {
                expression: expression.source().to_string(),
                reason: format!("'{}' is not a sharding column", variable),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::TableKind;

    const RULES: &str = r#"
storage_units = ["ds_0", "ds_1"]
broadcast_tables = ["t_config"]
binding_groups = [["t_order", "t_order_item"]]

[single_tables]
t_user = "ds_1"

[props]
sql_show = true

[[tables]]
name = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
database_strategy = { type = "inline", column = "user_id", expression = "ds_${user_id % 2}" }
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }

[[tables]]
name = "t_order_item"
actual_data_nodes = "ds_${0..1}.t_order_item_${0..1}"
database_strategy = { type = "inline", column = "user_id", expression = "ds_${user_id % 2}" }
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "hash_mod", sharding_count = 2 } }
"#;

    #[test]
    fn test_build_rule_from_toml() {
        let config = RouterConfig::from_toml_str(RULES).unwrap();
        assert!(config.props.sql_show);
        assert!(config.props.union_all_rewrite);
        assert_eq!(config.props.max_enumerated_range, 64);

        let rule = config.build_rule().unwrap();
        assert_eq!(rule.classify("t_order"), TableKind::Sharding);
        assert_eq!(rule.classify("t_user"), TableKind::Single("ds_1".to_string()));
        assert_eq!(rule.table_rule("t_order").unwrap().actual_data_nodes().len(), 4);
        assert!(rule.is_sharding_column("t_order_item", "user_id"));

        // mod implies its own range algorithm, hash_mod does not
        let order = rule.table_rule("t_order").unwrap();
        assert!(matches!(
            rule.table_strategy(order),
            ShardingStrategy::Standard { range: Some(_), .. }
        ));
        let item = rule.table_rule("t_order_item").unwrap();
        assert!(matches!(
            rule.table_strategy(item),
            ShardingStrategy::Standard { range: None, .. }
        ));
    }

    #[test]
    fn test_expression_must_use_sharding_column() {
        let config = RouterConfig::from_toml_str(
            r#"
[[tables]]
name = "t_order"
actual_data_nodes = "ds_0.t_order_${0..1}"
table_strategy = { type = "inline", column = "order_id", expression = "t_order_${user_id % 2}" }
"#,
        )
        .unwrap();
        let err = config.build_rule().unwrap_err();
        assert!(matches!(err, ShardError::InvalidInlineExpression { .. }));
    }

    #[test]
    fn test_rejects_bad_algorithms() {
        for algorithm in [
            r#"{ type = "mod", sharding_count = 0 }"#,
            r#"{ type = "boundary_range", boundaries = [20, 10] }"#,
        ] {
            let text = format!(
                "[[tables]]\nname = \"t\"\nactual_data_nodes = \"ds_0.t_${{0..1}}\"\ntable_strategy = {{ type = \"standard\", column = \"id\", algorithm = {} }}\n",
                algorithm
            );
            let config = RouterConfig::from_toml_str(&text).unwrap();
            assert!(config.build_rule().is_err(), "{}", algorithm);
        }
    }

    #[test]
    fn test_unknown_strategy_type_is_a_toml_error() {
        let err = RouterConfig::from_toml_str(
            "[[tables]]\nname = \"t\"\nactual_data_nodes = \"ds_0.t\"\ntable_strategy = { type = \"magic\" }\n",
        )
        .unwrap_err();
        assert!(matches!(err, ShardError::TomlError(_)));
    }
}
