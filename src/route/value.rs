//! Sharding values extracted from predicates.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Sharding values of one condition keyed by lower-cased column name.
pub type ColumnValues = BTreeMap<String, ShardingValue>;

/// Total order over parameter values: Null < Bool < Number < String < other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a_f64 = a.as_f64().unwrap_or(0.0);
                let b_f64 = b.as_f64().unwrap_or(0.0);
                a_f64.partial_cmp(&b_f64).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Integral view of a value; numeric strings are accepted.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form used for hashing and inline evaluation: strings without quotes.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl ValueRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn closed(low: Value, high: Value) -> Self {
        Self {
            lower: Bound::Included(low),
            upper: Bound::Included(high),
        }
    }

    pub fn at_least(v: Value) -> Self {
        Self {
            lower: Bound::Included(v),
            upper: Bound::Unbounded,
        }
    }

    pub fn greater_than(v: Value) -> Self {
        Self {
            lower: Bound::Excluded(v),
            upper: Bound::Unbounded,
        }
    }

    pub fn at_most(v: Value) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(v),
        }
    }

    pub fn less_than(v: Value) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(v),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(l) => compare_values(value, l) != Ordering::Less,
            Bound::Excluded(l) => compare_values(value, l) == Ordering::Greater,
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(u) => compare_values(value, u) != Ordering::Greater,
            Bound::Excluded(u) => compare_values(value, u) == Ordering::Less,
        };
        above && below
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(l), Bound::Included(u)) => compare_values(l, u) == Ordering::Greater,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => compare_values(l, u) != Ordering::Less,
        }
    }

    /// Narrowest range satisfying both, `None` when they do not overlap.
    pub fn intersect(&self, other: &ValueRange) -> Option<ValueRange> {
        let range = ValueRange {
            lower: tighter_lower(&self.lower, &other.lower),
            upper: tighter_upper(&self.upper, &other.upper),
        };
        (!range.is_empty()).then_some(range)
    }

    /// Smallest range covering both.
    pub fn span(&self, other: &ValueRange) -> ValueRange {
        ValueRange {
            lower: looser_lower(&self.lower, &other.lower),
            upper: looser_upper(&self.upper, &other.upper),
        }
    }

    /// Inclusive integer bounds when both ends are bounded integers.
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        let low = match &self.lower {
            Bound::Included(v) => value_as_i64(v)?,
            Bound::Excluded(v) => value_as_i64(v)?.checked_add(1)?,
            Bound::Unbounded => return None,
        };
        let high = match &self.upper {
            Bound::Included(v) => value_as_i64(v)?,
            Bound::Excluded(v) => value_as_i64(v)?.checked_sub(1)?,
            Bound::Unbounded => return None,
        };
        Some((low, high))
    }
}

fn bound_value(bound: &Bound<Value>) -> Option<&Value> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn tighter_lower(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (bound_value(a), bound_value(b)) {
        (None, _) => b.clone(),
        (_, None) => a.clone(),
        (Some(x), Some(y)) => match compare_values(x, y) {
            Ordering::Greater => a.clone(),
            Ordering::Less => b.clone(),
            Ordering::Equal if matches!(a, Bound::Excluded(_)) => a.clone(),
            Ordering::Equal => b.clone(),
        },
    }
}

fn tighter_upper(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (bound_value(a), bound_value(b)) {
        (None, _) => b.clone(),
        (_, None) => a.clone(),
        (Some(x), Some(y)) => match compare_values(x, y) {
            Ordering::Less => a.clone(),
            Ordering::Greater => b.clone(),
            Ordering::Equal if matches!(a, Bound::Excluded(_)) => a.clone(),
            Ordering::Equal => b.clone(),
        },
    }
}

fn looser_lower(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (bound_value(a), bound_value(b)) {
        (None, _) | (_, None) => Bound::Unbounded,
        (Some(x), Some(y)) => match compare_values(x, y) {
            Ordering::Less => a.clone(),
            Ordering::Greater => b.clone(),
            Ordering::Equal if matches!(a, Bound::Included(_)) => a.clone(),
            Ordering::Equal => b.clone(),
        },
    }
}

fn looser_upper(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (bound_value(a), bound_value(b)) {
        (None, _) | (_, None) => Bound::Unbounded,
        (Some(x), Some(y)) => match compare_values(x, y) {
            Ordering::Greater => a.clone(),
            Ordering::Less => b.clone(),
            Ordering::Equal if matches!(a, Bound::Included(_)) => a.clone(),
            Ordering::Equal => b.clone(),
        },
    }
}

/// Constraint on one sharding column.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardingValue {
    List { column: String, values: Vec<Value> },
    Range { column: String, range: ValueRange },
}

impl ShardingValue {
    pub fn list(column: impl Into<String>, values: Vec<Value>) -> Self {
        ShardingValue::List {
            column: column.into(),
            values: dedup_values(values),
        }
    }

    pub fn range(column: impl Into<String>, range: ValueRange) -> Self {
        ShardingValue::Range {
            column: column.into(),
            range,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            ShardingValue::List { column, .. } | ShardingValue::Range { column, .. } => column,
        }
    }

    /// AND of two constraints on the same column, `None` when nothing can match.
    pub fn intersect(&self, other: &ShardingValue) -> Option<ShardingValue> {
        let column = self.column().to_string();
        match (self, other) {
            (ShardingValue::List { values: a, .. }, ShardingValue::List { values: b, .. }) => {
                let values: Vec<Value> = a
                    .iter()
                    .filter(|v| b.iter().any(|w| compare_values(v, w) == Ordering::Equal))
                    .cloned()
                    .collect();
                (!values.is_empty()).then(|| ShardingValue::list(column, values))
            }
            (ShardingValue::List { values, .. }, ShardingValue::Range { range, .. })
            | (ShardingValue::Range { range, .. }, ShardingValue::List { values, .. }) => {
                let values: Vec<Value> = values
                    .iter()
                    .filter(|v| range.contains(v))
                    .cloned()
                    .collect();
                (!values.is_empty()).then(|| ShardingValue::list(column, values))
            }
            (ShardingValue::Range { range: a, .. }, ShardingValue::Range { range: b, .. }) => {
                a.intersect(b).map(|range| ShardingValue::range(column, range))
            }
        }
    }

    /// OR of two constraints on the same column, `None` when the union
    /// cannot be expressed as a single value (list mixed with range).
    pub fn union(&self, other: &ShardingValue) -> Option<ShardingValue> {
        let column = self.column().to_string();
        match (self, other) {
            (ShardingValue::List { values: a, .. }, ShardingValue::List { values: b, .. }) => {
                let mut values = a.clone();
                values.extend(b.iter().cloned());
                Some(ShardingValue::list(column, values))
            }
            (ShardingValue::Range { range: a, .. }, ShardingValue::Range { range: b, .. }) => {
                Some(ShardingValue::range(column, a.span(b)))
            }
            _ => None,
        }
    }
}

fn dedup_values(values: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !unique
            .iter()
            .any(|u| compare_values(u, &value) == Ordering::Equal)
        {
            unique.push(value);
        }
    }
    unique
}
