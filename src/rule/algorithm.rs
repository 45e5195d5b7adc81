//! Sharding algorithms and strategies.
//!
//! A strategy maps the available target names (data sources or actual tables)
//! plus the sharding values of one condition to the subset that must be hit.
//! Every strategy is pure; the result keeps the order of the available targets.

use crate::error::{ShardError, ShardResult};
use crate::route::value::{value_as_i64, value_to_text, ColumnValues, ShardingValue, ValueRange};
use crate::rule::inline::{evaluate_with, InlineExpression};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tracing::{debug, warn};

/// Variable name hint expressions read, as in `ds_${value % 2}`.
pub const HINT_VARIABLE: &str = "value";

/// Trailing decimal digits of a target name, `t_order_12` yields 12.
pub fn suffix_number(target: &str) -> Option<u64> {
    let digits: String = target
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Single-column algorithms used by standard strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum StandardAlgorithm {
    /// `value mod sharding_count`, matched against the target's numeric suffix.
    Mod { sharding_count: u64 },
    /// seahash of the value's text form, `mod sharding_count`.
    HashMod { sharding_count: u64 },
    /// Partition index by sorted boundaries: `[10, 20]` yields `<10`, `10..20`, `>=20`.
    BoundaryRange { boundaries: Vec<i64> },
}

impl StandardAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            StandardAlgorithm::Mod { .. } => "mod",
            StandardAlgorithm::HashMod { .. } => "hash_mod",
            StandardAlgorithm::BoundaryRange { .. } => "boundary_range",
        }
    }

    /// Hash based placement has no ordering to exploit.
    pub fn supports_range(&self) -> bool {
        !matches!(self, StandardAlgorithm::HashMod { .. })
    }

    /// Reject parameters no value could be placed with.
    pub fn validate(&self) -> ShardResult<()> {
        match self {
            StandardAlgorithm::Mod { sharding_count } | StandardAlgorithm::HashMod { sharding_count }
                if *sharding_count == 0 =>
            {
                Err(ShardError::config(format!(
                    "{} sharding_count must be positive",
                    self.name()
                )))
            }
            StandardAlgorithm::BoundaryRange { boundaries }
                if boundaries.windows(2).any(|w| w[0] >= w[1]) =>
            {
                Err(ShardError::config(
                    "boundary_range boundaries must be strictly increasing",
                ))
            }
            _ => Ok(()),
        }
    }

    fn integer(value: &Value) -> ShardResult<i64> {
        value_as_i64(value).ok_or_else(|| {
            ShardError::InvalidShardingValue(format!("expected an integer, got {}", value))
        })
    }

    fn boundary_index(boundaries: &[i64], value: i64) -> u64 {
        boundaries.partition_point(|b| *b <= value) as u64
    }

    pub fn shard_index(&self, value: &Value) -> ShardResult<u64> {
        match self {
            StandardAlgorithm::Mod { sharding_count } => {
                let count = i64::try_from(*sharding_count)
                    .map_err(|_| ShardError::config("sharding_count too large"))?;
                Self::integer(value)?
                    .checked_rem_euclid(count)
                    .map(|index| index as u64)
                    .ok_or_else(|| ShardError::config("mod sharding_count must be positive"))
            }
            StandardAlgorithm::HashMod { sharding_count } => seahash::hash(value_to_text(value).as_bytes())
                .checked_rem(*sharding_count)
                .ok_or_else(|| ShardError::config("hash_mod sharding_count must be positive")),
            StandardAlgorithm::BoundaryRange { boundaries } => {
                Ok(Self::boundary_index(boundaries, Self::integer(value)?))
            }
        }
    }

    fn targets_with_index<'a>(targets: &'a [String], index: u64) -> impl Iterator<Item = &'a String> {
        targets
            .iter()
            .filter(move |t| suffix_number(t) == Some(index))
    }

    /// Target for one discrete value; at most one target.
    pub fn do_precise(&self, targets: &[String], value: &Value) -> ShardResult<Option<String>> {
        let index = self.shard_index(value)?;
        Ok(Self::targets_with_index(targets, index).next().cloned())
    }

    pub fn do_range(&self, targets: &[String], range: &ValueRange) -> ShardResult<Vec<String>> {
        let indexes: BTreeSet<u64> = match self {
            StandardAlgorithm::Mod { sharding_count } => match range.integer_bounds() {
                Some((low, high)) if low > high => BTreeSet::new(),
                Some((low, high))
                    if (high as i128 - low as i128) < *sharding_count as i128 - 1 =>
                {
                    (low..=high)
                        .map(|v| self.shard_index(&Value::from(v)))
                        .collect::<ShardResult<_>>()?
                }
                _ => return Ok(targets.to_vec()),
            },
            StandardAlgorithm::BoundaryRange { boundaries } => {
                let low = match &range.lower {
                    Bound::Unbounded => 0,
                    Bound::Included(v) | Bound::Excluded(v) => match value_as_i64(v) {
                        Some(v) => Self::boundary_index(boundaries, v),
                        None => return Ok(targets.to_vec()),
                    },
                };
                let high = match &range.upper {
                    Bound::Unbounded => boundaries.len() as u64,
                    Bound::Included(v) => match value_as_i64(v) {
                        Some(v) => Self::boundary_index(boundaries, v),
                        None => return Ok(targets.to_vec()),
                    },
                    Bound::Excluded(v) => match value_as_i64(v) {
                        Some(v) => Self::boundary_index(boundaries, v.saturating_sub(1)),
                        None => return Ok(targets.to_vec()),
                    },
                };
                (low..=high).collect()
            }
            StandardAlgorithm::HashMod { .. } => return Ok(targets.to_vec()),
        };

        Ok(targets
            .iter()
            .filter(|t| suffix_number(t).is_some_and(|n| indexes.contains(&n)))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShardingStrategy {
    /// One sharding column, precise algorithm per value plus an optional range algorithm.
    Standard {
        column: String,
        precise: StandardAlgorithm,
        range: Option<StandardAlgorithm>,
    },
    /// Several columns combined by one inline expression.
    Complex {
        columns: Vec<String>,
        expression: InlineExpression,
        allow_range_query: bool,
        max_enumerated_range: u64,
    },
    /// Values come from the hint context, never from predicates.
    Hint { expression: InlineExpression },
    /// Inline expression over a single column.
    Inline {
        column: String,
        expression: InlineExpression,
        allow_range_query: bool,
    },
    None,
}

impl ShardingStrategy {
    /// Lower-cased sharding columns, empty for hint and none strategies.
    pub fn sharding_columns(&self) -> Vec<String> {
        match self {
            ShardingStrategy::Standard { column, .. } | ShardingStrategy::Inline { column, .. } => {
                vec![column.to_ascii_lowercase()]
            }
            ShardingStrategy::Complex { columns, .. } => {
                columns.iter().map(|c| c.to_ascii_lowercase()).collect()
            }
            ShardingStrategy::Hint { .. } | ShardingStrategy::None => Vec::new(),
        }
    }

    pub fn validate(&self) -> ShardResult<()> {
        match self {
            ShardingStrategy::Standard { precise, range, .. } => {
                precise.validate()?;
                range.as_ref().map_or(Ok(()), StandardAlgorithm::validate)
            }
            _ => Ok(()),
        }
    }

    /// Route one condition against `targets`.
    ///
    /// `values` is keyed by lower-cased column; columns without a value are
    /// unconstrained. `hint_values` is only read by hint strategies.
    pub fn do_sharding(
        &self,
        targets: &[String],
        values: &ColumnValues,
        hint_values: &[Value],
    ) -> ShardResult<Vec<String>> {
        match self {
            ShardingStrategy::None => Ok(targets.to_vec()),

            ShardingStrategy::Standard {
                column,
                precise,
                range,
            } => match values.get(&column.to_ascii_lowercase()) {
                None => Ok(targets.to_vec()),
                Some(ShardingValue::List { values, .. }) => {
                    let mut names = Vec::new();
                    for value in values {
                        if let Some(target) = precise.do_precise(targets, value)? {
                            names.push(target);
                        }
                    }
                    Ok(retain_targets(targets, names))
                }
                Some(ShardingValue::Range { range: r, .. }) => match range {
                    Some(algorithm) => algorithm.do_range(targets, r),
                    None => Err(ShardError::UnsupportedRangeQuery {
                        column: column.clone(),
                    }),
                },
            },

            ShardingStrategy::Inline {
                column,
                expression,
                allow_range_query,
            } => match values.get(&column.to_ascii_lowercase()) {
                None => Ok(targets.to_vec()),
                Some(ShardingValue::List { values, .. }) => {
                    let names = values
                        .iter()
                        .map(|v| evaluate_with(expression, column, v))
                        .collect::<ShardResult<Vec<_>>>()?;
                    Ok(retain_targets(targets, names))
                }
                Some(ShardingValue::Range { .. }) if *allow_range_query => Ok(targets.to_vec()),
                Some(ShardingValue::Range { .. }) => Err(ShardError::UnsupportedRangeQuery {
                    column: column.clone(),
                }),
            },

            ShardingStrategy::Complex {
                columns,
                expression,
                allow_range_query,
                max_enumerated_range,
            } => complex_sharding(
                targets,
                values,
                columns,
                expression,
                *allow_range_query,
                *max_enumerated_range,
            ),

            ShardingStrategy::Hint { expression } => {
                if hint_values.is_empty() {
                    return Ok(targets.to_vec());
                }
                let names = hint_values
                    .iter()
                    .map(|v| evaluate_with(expression, HINT_VARIABLE, v))
                    .collect::<ShardResult<Vec<_>>>()?;
                Ok(retain_targets(targets, names))
            }
        }
    }
}

fn complex_sharding(
    targets: &[String],
    values: &ColumnValues,
    columns: &[String],
    expression: &InlineExpression,
    allow_range_query: bool,
    max_enumerated_range: u64,
) -> ShardResult<Vec<String>> {
    let mut discrete: Vec<(String, Vec<Value>)> = Vec::with_capacity(columns.len());

    for column in columns {
        let key = column.to_ascii_lowercase();
        match values.get(&key) {
            None => {
                debug!(
                    "complex sharding column '{}' unconstrained, routing to all targets",
                    column
                );
                return Ok(targets.to_vec());
            }
            Some(ShardingValue::List { values, .. }) => discrete.push((key, values.clone())),
            Some(ShardingValue::Range { range, .. }) => {
                if !allow_range_query {
                    return Ok(targets.to_vec());
                }
                match range.integer_bounds() {
                    Some((low, high))
                        if low <= high && (high as i128 - low as i128) < max_enumerated_range as i128 =>
                    {
                        discrete.push((key, (low..=high).map(Value::from).collect()));
                    }
                    _ => return Ok(targets.to_vec()),
                }
            }
        }
    }

    let mut names = Vec::new();
    for combination in cartesian(&discrete) {
        names.push(expression.evaluate(&combination)?);
    }
    Ok(retain_targets(targets, names))
}

/// Every combination picking one value per column.
fn cartesian(columns: &[(String, Vec<Value>)]) -> Vec<BTreeMap<String, Value>> {
    let mut combinations = vec![BTreeMap::new()];
    for (column, values) in columns {
        combinations = combinations
            .into_iter()
            .flat_map(|partial| {
                values.iter().map(move |value| {
                    let mut next = partial.clone();
                    next.insert(column.clone(), value.clone());
                    next
                })
            })
            .collect();
    }
    combinations
}

/// Keep the available targets named in `names`, in target order.
fn retain_targets(targets: &[String], names: Vec<String>) -> Vec<String> {
    for name in &names {
        if !targets.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            warn!("sharding result '{}' is not an available target", name);
        }
    }
    targets
        .iter()
        .filter(|t| names.iter().any(|n| n.eq_ignore_ascii_case(t)))
        .cloned()
        .collect()
}
