// ==================== Rule File Tests ====================

mod common;

use common::*;
use shardsql::{HintValueContext, RouterConfig, ShardError, ShardingKernel};
use std::fs;
use tempfile::TempDir;

const RULES: &str = r#"
storage_units = ["ds_0", "ds_1"]
broadcast_tables = ["t_config"]

[props]
allow_range_query_with_inline_sharding = true

[[tables]]
name = "t_goods"
actual_data_nodes = "ds_0.t_goods_${0..1}_${0..1}"
table_strategy = { type = "complex", columns = ["kind", "goods_id"], expression = "t_goods_${kind % 2}_${goods_id % 2}" }

[[tables]]
name = "t_ticket"
actual_data_nodes = "ds_${0..1}.t_ticket_${0..2}"
database_strategy = { type = "inline", column = "region", expression = "ds_${region % 2}" }
table_strategy = { type = "standard", column = "created", algorithm = { type = "boundary_range", boundaries = [100, 200] } }
"#;

fn kernel_from(text: &str) -> ShardingKernel {
    let config = RouterConfig::from_toml_str(text).unwrap();
    ShardingKernel::from_config(&config).unwrap()
}

#[test]
fn test_load_reads_env_file_next_to_rules() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.toml");
    fs::write(&rules, RULES).unwrap();
    fs::write(dir.path().join(".env"), "SHARDSQL_DEFAULT_DATA_SOURCE=ds_1\n").unwrap();

    let config = RouterConfig::load(&rules).unwrap();
    assert_eq!(config.default_data_source.as_deref(), Some("ds_1"));
    assert!(config.props.allow_range_query_with_inline_sharding);

    let kernel = ShardingKernel::from_config(&config).unwrap();
    let ctx = kernel
        .plan("SELECT * FROM t_misc", &[], &HintValueContext::new())
        .unwrap();
    assert_eq!(routed(&ctx, "t_misc"), vec![pair("ds_1", "t_misc")]);
}

#[test]
fn test_missing_rule_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = RouterConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ShardError::IoError(_)));
}

#[test]
fn test_complex_strategy_from_rules() {
    let kernel = kernel_from(RULES);

    let ctx = kernel
        .plan(
            "SELECT * FROM t_goods WHERE kind = 2 AND goods_id = 2",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(routed(&ctx, "t_goods"), vec![pair("ds_0", "t_goods_0_0")]);

    let ctx = kernel
        .plan(
            "SELECT * FROM t_goods WHERE kind IN (1, 2) AND goods_id IN (1, 2)",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(ctx.route_context.route_units().len(), 4);

    // a small range is enumerated because range queries are allowed
    let ctx = kernel
        .plan(
            "SELECT * FROM t_goods WHERE kind BETWEEN 3 AND 3 AND goods_id = 4",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(routed(&ctx, "t_goods"), vec![pair("ds_0", "t_goods_1_0")]);

    // missing column leaves the statement unconstrained
    let ctx = kernel
        .plan("SELECT * FROM t_goods WHERE kind = 1", &[], &HintValueContext::new())
        .unwrap();
    assert_eq!(ctx.route_context.route_units().len(), 4);
}

#[test]
fn test_boundary_range_strategy_from_rules() {
    let kernel = kernel_from(RULES);

    let ctx = kernel
        .plan(
            "SELECT * FROM t_ticket WHERE region = 1 AND created = 150",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(routed(&ctx, "t_ticket"), vec![pair("ds_1", "t_ticket_1")]);

    let ctx = kernel
        .plan(
            "SELECT * FROM t_ticket WHERE region = 0 AND created >= 150",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(
        routed(&ctx, "t_ticket"),
        vec![pair("ds_0", "t_ticket_1"), pair("ds_0", "t_ticket_2")]
    );

    // inline range queries are allowed by props and reach every data source
    let ctx = kernel
        .plan(
            "SELECT * FROM t_ticket WHERE region > 0 AND created < 100",
            &[],
            &HintValueContext::new(),
        )
        .unwrap();
    assert_eq!(
        routed(&ctx, "t_ticket"),
        vec![pair("ds_0", "t_ticket_0"), pair("ds_1", "t_ticket_0")]
    );
}

#[test]
fn test_binding_group_with_unknown_table_is_rejected() {
    let config = RouterConfig::from_toml_str(
        r#"
storage_units = ["ds_0"]
binding_groups = [["t_a", "t_b"]]
"#,
    )
    .unwrap();
    let err = config.build_rule().unwrap_err();
    assert!(matches!(err, ShardError::Configuration(_)));
}
