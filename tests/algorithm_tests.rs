// ==================== Sharding Algorithm Tests ====================

use serde_json::{json, Value};
use shardsql::route::{ColumnValues, ShardingValue, ValueRange};
use shardsql::rule::{InlineExpression, ShardingStrategy, StandardAlgorithm};

fn targets() -> Vec<String> {
    ["t_order_0_0", "t_order_0_1", "t_order_1_0", "t_order_1_1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn complex(allow_range_query: bool) -> ShardingStrategy {
    ShardingStrategy::Complex {
        columns: vec!["type".to_string(), "order_id".to_string()],
        expression: InlineExpression::compile("t_order_${type % 2}_${order_id % 2}").unwrap(),
        allow_range_query,
        max_enumerated_range: 64,
    }
}

fn lists(type_values: Vec<Value>, order_values: Vec<Value>) -> ColumnValues {
    let mut values = ColumnValues::new();
    values.insert("type".to_string(), ShardingValue::list("type", type_values));
    values.insert(
        "order_id".to_string(),
        ShardingValue::list("order_id", order_values),
    );
    values
}

#[test]
fn test_complex_single_combination() {
    let result = complex(false)
        .do_sharding(&targets(), &lists(vec![json!(2)], vec![json!(2)]), &[])
        .unwrap();
    assert_eq!(result, vec!["t_order_0_0"]);
}

#[test]
fn test_complex_cartesian_product_covers_all_targets() {
    let result = complex(false)
        .do_sharding(
            &targets(),
            &lists(vec![json!(1), json!(2)], vec![json!(1), json!(2)]),
            &[],
        )
        .unwrap();
    assert_eq!(result, targets());
}

#[test]
fn test_complex_range_without_allow_returns_every_target() {
    let mut values = lists(vec![], vec![json!(1)]);
    values.insert(
        "type".to_string(),
        ShardingValue::range("type", ValueRange::all()),
    );
    let result = complex(false).do_sharding(&targets(), &values, &[]).unwrap();
    assert_eq!(result, targets());

    // a bounded range is never narrowed while range queries are off
    values.insert(
        "type".to_string(),
        ShardingValue::range("type", ValueRange::closed(json!(2), json!(2))),
    );
    let result = complex(false).do_sharding(&targets(), &values, &[]).unwrap();
    assert_eq!(result, targets());
}

#[test]
fn test_complex_small_range_enumerated_when_allowed() {
    let mut values = lists(vec![], vec![json!(1)]);
    values.insert(
        "type".to_string(),
        ShardingValue::range("type", ValueRange::closed(json!(2), json!(2))),
    );
    let result = complex(true).do_sharding(&targets(), &values, &[]).unwrap();
    assert_eq!(result, vec!["t_order_0_1"]);
}

#[test]
fn test_standard_single_value_hits_exactly_one_target() {
    let tables: Vec<String> = (0..4).map(|i| format!("t_order_{}", i)).collect();
    for algorithm in [
        StandardAlgorithm::Mod { sharding_count: 4 },
        StandardAlgorithm::HashMod { sharding_count: 4 },
    ] {
        let strategy = ShardingStrategy::Standard {
            column: "order_id".to_string(),
            precise: algorithm,
            range: None,
        };
        for id in 0..50 {
            let mut values = ColumnValues::new();
            values.insert(
                "order_id".to_string(),
                ShardingValue::list("order_id", vec![json!(id)]),
            );
            let result = strategy.do_sharding(&tables, &values, &[]).unwrap();
            assert_eq!(result.len(), 1, "value {}", id);
            assert!(tables.contains(&result[0]));
        }
    }
}

#[test]
fn test_results_are_deterministic() {
    let values = lists(vec![json!(7), json!(8)], vec![json!(3)]);
    let first = complex(false).do_sharding(&targets(), &values, &[]).unwrap();
    let second = complex(false).do_sharding(&targets(), &values, &[]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, vec!["t_order_0_1", "t_order_1_1"]);
}
