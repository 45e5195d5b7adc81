use anyhow::Context;
use clap::Parser;
use shardsql::{HintValueContext, RouterConfig, ShardingKernel};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shardsql")]
#[command(about = "Route and rewrite a logical SQL statement against sharding rules", long_about = None)]
struct Args {
    /// Rule file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Logical SQL statement
    #[arg(short, long)]
    sql: String,

    /// Statement parameter as JSON, repeat in order (e.g., --param 1 --param '"a"')
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Database hint value as <table>=<json>
    #[arg(long = "hint-database")]
    hint_database: Vec<String>,

    /// Table hint value as <table>=<json>
    #[arg(long = "hint-table")]
    hint_table: Vec<String>,

    /// Preferred data source for single-target statements
    #[arg(long)]
    data_source: Option<String>,
}

fn parse_json(text: &str) -> serde_json::Value {
    // bare words are taken as strings
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn parse_hint(text: &str) -> anyhow::Result<(&str, serde_json::Value)> {
    let (table, value) = text
        .split_once('=')
        .with_context(|| format!("Invalid hint '{}', expected <table>=<value>", text))?;
    Ok((table.trim(), parse_json(value.trim())))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardsql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = RouterConfig::load(&args.config)
        .with_context(|| format!("Failed to load rules from {}", args.config.display()))?;
    let kernel = ShardingKernel::from_config(&config)?;

    let params: Vec<serde_json::Value> = args.params.iter().map(|p| parse_json(p)).collect();

    let mut hint = HintValueContext::new();
    for text in &args.hint_database {
        let (table, value) = parse_hint(text)?;
        hint.add_database_value(table, value);
    }
    for text in &args.hint_table {
        let (table, value) = parse_hint(text)?;
        hint.add_table_value(table, value);
    }
    if let Some(ds) = args.data_source {
        hint.set_data_source_name(ds);
    }

    let context = kernel.plan(&args.sql, &params, &hint)?;
    println!("{}", serde_json::to_string_pretty(&context.execution_units)?);

    Ok(())
}
