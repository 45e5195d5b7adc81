//! The complete sharding configuration seen by one routing pass.

use crate::config::RouterProps;
use crate::error::{ShardError, ShardResult};
use crate::rule::algorithm::ShardingStrategy;
use crate::rule::table::TableRule;
use std::collections::{BTreeMap, BTreeSet};

/// How a logical table is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    Sharding,
    Broadcast,
    /// Unsharded table pinned to one data source.
    Single(String),
    /// Table no rule mentions.
    Unconfigured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShardingRule {
    table_rules: Vec<TableRule>,
    binding_groups: Vec<Vec<String>>,
    broadcast_tables: BTreeSet<String>,
    single_tables: BTreeMap<String, String>,
    default_database_strategy: ShardingStrategy,
    default_table_strategy: ShardingStrategy,
    default_data_source: Option<String>,
    storage_units: Vec<String>,
    props: RouterProps,
}

impl ShardingRule {
    pub fn builder() -> ShardingRuleBuilder {
        ShardingRuleBuilder::default()
    }

    pub fn props(&self) -> &RouterProps {
        &self.props
    }

    pub fn storage_units(&self) -> &[String] {
        &self.storage_units
    }

    pub fn has_storage_unit(&self, name: &str) -> bool {
        self.storage_units.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    pub fn table_rules(&self) -> &[TableRule] {
        &self.table_rules
    }

    pub fn table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules
            .iter()
            .find(|r| r.logic_table().eq_ignore_ascii_case(logic_table))
    }

    pub fn classify(&self, logic_table: &str) -> TableKind {
        let key = logic_table.to_ascii_lowercase();
        if self.table_rule(&key).is_some() {
            TableKind::Sharding
        } else if self.broadcast_tables.contains(&key) {
            TableKind::Broadcast
        } else if let Some(ds) = self.single_tables.get(&key) {
            TableKind::Single(ds.clone())
        } else {
            TableKind::Unconfigured
        }
    }

    pub fn is_sharding_table(&self, logic_table: &str) -> bool {
        self.table_rule(logic_table).is_some()
    }

    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_tables
            .contains(&logic_table.to_ascii_lowercase())
    }

    /// Binding group containing `logic_table`, lower-cased names.
    pub fn binding_group(&self, logic_table: &str) -> Option<&[String]> {
        let key = logic_table.to_ascii_lowercase();
        self.binding_groups
            .iter()
            .find(|g| g.contains(&key))
            .map(|g| g.as_slice())
    }

    /// True when every table is a sharding table of one common binding group.
    pub fn is_all_binding_tables(&self, logic_tables: &[String]) -> bool {
        let Some(first) = logic_tables.first() else {
            return false;
        };
        match self.binding_group(first) {
            Some(group) => logic_tables
                .iter()
                .all(|t| group.contains(&t.to_ascii_lowercase())),
            None => false,
        }
    }

    pub fn database_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule
            .database_strategy()
            .unwrap_or(&self.default_database_strategy)
    }

    pub fn table_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule
            .table_strategy()
            .unwrap_or(&self.default_table_strategy)
    }

    /// Lower-cased database and table sharding columns of a sharding table.
    pub fn sharding_columns(&self, logic_table: &str) -> BTreeSet<String> {
        let Some(rule) = self.table_rule(logic_table) else {
            return BTreeSet::new();
        };
        self.database_strategy(rule)
            .sharding_columns()
            .into_iter()
            .chain(self.table_strategy(rule).sharding_columns())
            .collect()
    }

    pub fn is_sharding_column(&self, logic_table: &str, column: &str) -> bool {
        self.sharding_columns(logic_table)
            .contains(&column.to_ascii_lowercase())
    }

    /// First sharding table among `logic_tables` that shards on `column`.
    pub fn find_table_by_column(&self, logic_tables: &[String], column: &str) -> Option<String> {
        logic_tables
            .iter()
            .find(|t| self.is_sharding_column(t, column))
            .cloned()
    }

    /// Data source an unconfigured table is assumed to live on.
    pub fn unconfigured_data_source(&self) -> Option<&str> {
        self.default_data_source
            .as_deref()
            .or_else(|| self.storage_units.first().map(String::as_str))
    }

    /// Data sources that hold `logic_table`, in configured order.
    pub fn data_sources_of(&self, logic_table: &str) -> Vec<String> {
        match self.classify(logic_table) {
            TableKind::Sharding => self
                .table_rule(logic_table)
                .map(|r| r.data_source_names())
                .unwrap_or_default(),
            TableKind::Broadcast => self.storage_units.clone(),
            TableKind::Single(ds) => vec![ds],
            TableKind::Unconfigured => self
                .unconfigured_data_source()
                .map(|ds| vec![ds.to_string()])
                .unwrap_or_default(),
        }
    }

    /// Actual table of binding member `logic_table` paired with
    /// `representative_actual` of `representative` on `data_source`.
    pub fn binding_actual_table(
        &self,
        data_source: &str,
        logic_table: &str,
        representative: &str,
        representative_actual: &str,
    ) -> ShardResult<String> {
        let member = self
            .table_rule(logic_table)
            .ok_or_else(|| ShardError::RouteNotFound(logic_table.to_string()))?;
        let leader = self
            .table_rule(representative)
            .ok_or_else(|| ShardError::RouteNotFound(representative.to_string()))?;

        let leader_tables = leader.actual_tables(data_source);
        let member_tables = member.actual_tables(data_source);
        if leader_tables.len() != member_tables.len() {
            return Err(ShardError::BindingTableMismatch {
                table: member.logic_table().to_string(),
                representative: leader.logic_table().to_string(),
                data_source: data_source.to_string(),
                expected: leader_tables.len(),
                actual: member_tables.len(),
            });
        }

        let index = leader
            .actual_table_index(data_source, representative_actual)
            .ok_or_else(|| {
                ShardError::InternalConsistency(format!(
                    "'{}' is not an actual table of '{}' on '{}'",
                    representative_actual, representative, data_source
                ))
            })?;
        Ok(member_tables[index].clone())
    }

    /// Copy of this rule with one more storage unit.
    pub fn with_storage_unit(&self, name: &str) -> ShardResult<ShardingRule> {
        if self.has_storage_unit(name) {
            return Err(ShardError::config(format!(
                "Storage unit '{}' already exists",
                name
            )));
        }
        let mut next = self.clone();
        next.storage_units.push(name.to_string());
        Ok(next)
    }

    /// Copy of this rule without `name`; refused while sharding or single tables use it.
    pub fn without_storage_unit(&self, name: &str) -> ShardResult<ShardingRule> {
        if !self.has_storage_unit(name) {
            return Err(ShardError::config(format!(
                "Storage unit '{}' does not exist",
                name
            )));
        }
        if let Some(rule) = self.table_rules.iter().find(|r| r.is_on_data_source(name)) {
            return Err(ShardError::config(format!(
                "Storage unit '{}' is still used by table '{}'",
                name,
                rule.logic_table()
            )));
        }
        if let Some((table, _)) = self
            .single_tables
            .iter()
            .find(|(_, ds)| ds.eq_ignore_ascii_case(name))
        {
            return Err(ShardError::config(format!(
                "Storage unit '{}' is still used by single table '{}'",
                name, table
            )));
        }

        let mut next = self.clone();
        next.storage_units.retain(|s| !s.eq_ignore_ascii_case(name));
        if next
            .default_data_source
            .as_deref()
            .is_some_and(|ds| ds.eq_ignore_ascii_case(name))
        {
            next.default_data_source = None;
        }
        Ok(next)
    }
}

#[derive(Debug, Default)]
pub struct ShardingRuleBuilder {
    storage_units: Vec<String>,
    table_rules: Vec<TableRule>,
    binding_groups: Vec<Vec<String>>,
    broadcast_tables: Vec<String>,
    single_tables: Vec<(String, String)>,
    default_database_strategy: Option<ShardingStrategy>,
    default_table_strategy: Option<ShardingStrategy>,
    default_data_source: Option<String>,
    props: RouterProps,
}

impl ShardingRuleBuilder {
    pub fn storage_unit(mut self, name: impl Into<String>) -> Self {
        self.storage_units.push(name.into());
        self
    }

    pub fn storage_units<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.storage_units.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn table_rule(mut self, rule: TableRule) -> Self {
        self.table_rules.push(rule);
        self
    }

    pub fn binding_group<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.binding_groups.push(
            tables
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    pub fn broadcast_table(mut self, table: impl Into<String>) -> Self {
        self.broadcast_tables.push(table.into());
        self
    }

    pub fn single_table(mut self, table: impl Into<String>, data_source: impl Into<String>) -> Self {
        self.single_tables.push((table.into(), data_source.into()));
        self
    }

    pub fn default_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_database_strategy = Some(strategy);
        self
    }

    pub fn default_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_table_strategy = Some(strategy);
        self
    }

    pub fn default_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.default_data_source = Some(data_source.into());
        self
    }

    pub fn props(mut self, props: RouterProps) -> Self {
        self.props = props;
        self
    }

    pub fn build(self) -> ShardResult<ShardingRule> {
        // storage units: explicit ones first, then any data source a node mentions
        let mut storage_units: Vec<String> = Vec::new();
        let discovered = self
            .table_rules
            .iter()
            .flat_map(|r| r.data_source_names())
            .chain(self.single_tables.iter().map(|(_, ds)| ds.clone()));
        for name in self.storage_units.into_iter().chain(discovered) {
            if !storage_units.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
                storage_units.push(name);
            }
        }

        let mut names = BTreeSet::new();
        let all_names = self
            .table_rules
            .iter()
            .map(|r| r.logic_table().to_string())
            .chain(self.broadcast_tables.iter().cloned())
            .chain(self.single_tables.iter().map(|(t, _)| t.clone()));
        for name in all_names {
            if !names.insert(name.to_ascii_lowercase()) {
                return Err(ShardError::config(format!(
                    "Table '{}' is configured more than once",
                    name
                )));
            }
        }

        let mut grouped = BTreeSet::new();
        for group in &self.binding_groups {
            for table in group {
                if !self
                    .table_rules
                    .iter()
                    .any(|r| r.logic_table().eq_ignore_ascii_case(table))
                {
                    return Err(ShardError::config(format!(
                        "Binding table '{}' is not a sharding table",
                        table
                    )));
                }
                if !grouped.insert(table.clone()) {
                    return Err(ShardError::config(format!(
                        "Table '{}' belongs to more than one binding group",
                        table
                    )));
                }
            }
        }

        if let Some(ds) = &self.default_data_source {
            if !storage_units.iter().any(|s| s.eq_ignore_ascii_case(ds)) {
                return Err(ShardError::config(format!(
                    "Default data source '{}' is not a storage unit",
                    ds
                )));
            }
        }

        let strategies = self
            .table_rules
            .iter()
            .flat_map(|r| r.database_strategy().into_iter().chain(r.table_strategy()))
            .chain(self.default_database_strategy.iter())
            .chain(self.default_table_strategy.iter());
        for strategy in strategies {
            strategy.validate()?;
        }

        Ok(ShardingRule {
            table_rules: self.table_rules,
            binding_groups: self.binding_groups,
            broadcast_tables: self
                .broadcast_tables
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            single_tables: self
                .single_tables
                .into_iter()
                .map(|(t, ds)| (t.to_ascii_lowercase(), ds))
                .collect(),
            default_database_strategy: self
                .default_database_strategy
                .unwrap_or(ShardingStrategy::None),
            default_table_strategy: self.default_table_strategy.unwrap_or(ShardingStrategy::None),
            default_data_source: self.default_data_source,
            storage_units,
            props: self.props,
        })
    }
}
