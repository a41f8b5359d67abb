//! sails-db2 - command line entry point.
//!
//! Renders the SQL the adapter would run for an operation, and (with the
//! bundled PostgreSQL driver) describes tables and runs raw statements.

use sails_db2::adapter::{Adapter, SqlAdapter};
use sails_db2::config::{self, Command, Config, PlanOperation};
use sails_db2::db::PgDriver;
use sails_db2::error::{DbError, DbResult};
use sails_db2::models::{CollectionSchema, Dialect, QueryParam, QueryPlan};
use sails_db2::sql::StatementBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable JSON
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!(
        dialect = %config.dialect,
        identity = %config.identity,
        "Starting sails-db2 v{}",
        env!("CARGO_PKG_VERSION")
    );

    let result = match &config.command {
        Command::Plan {
            collection,
            operation,
            criteria,
            values,
        } => plan(
            &config,
            collection,
            *operation,
            criteria.as_deref(),
            values.as_deref(),
        ),
        Command::Describe { collection } => describe(&config, collection).await,
        Command::Query { sql, params } => query(&config, sql, params).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }
    Ok(())
}

fn plan(
    config: &Config,
    collection: &str,
    operation: PlanOperation,
    criteria: Option<&str>,
    values: Option<&str>,
) -> DbResult<()> {
    let collections = config.load_collections()?;
    let mut schema = collections
        .get(collection)
        .cloned()
        .ok_or_else(|| DbError::unknown_collection(&config.identity, collection))?;
    if schema.table_name.is_empty() {
        schema.table_name = collection.to_string();
    }

    let builder = StatementBuilder::new(config.dialect, &schema);
    let options = config::parse_criteria(criteria)?;
    let values = config::parse_values(values)?;

    let plans: Vec<QueryPlan> = match operation {
        PlanOperation::Find => vec![builder.select(&options)?],
        PlanOperation::Create => vec![builder.insert(&values)?],
        PlanOperation::Update => vec![builder.update(&options.where_clause, &values)?],
        PlanOperation::Destroy => vec![builder.delete(&options.where_clause)?],
        PlanOperation::Define => {
            let mut plans = vec![builder.create_table()?];
            plans.extend(builder.create_indexes());
            plans
        }
        PlanOperation::Drop => vec![builder.drop_table()?],
    };

    print_json(&plans)
}

/// Register the configured connection on an adapter backed by the bundled
/// driver.
async fn connect(
    config: &Config,
    mut collections: HashMap<String, CollectionSchema>,
) -> DbResult<SqlAdapter> {
    if config.dialect == Dialect::Db2 {
        return Err(DbError::configuration(
            "No DB2 driver is bundled; use --dialect postgres or embed the adapter with a DB2 driver",
        ));
    }
    if config.schema.is_some() {
        collections.extend(config.load_collections()?);
    }

    let adapter = SqlAdapter::new(Arc::new(PgDriver::new()));
    adapter
        .register_connection(config.connection_config(), collections)
        .await?;
    Ok(adapter)
}

async fn describe(config: &Config, collection: &str) -> DbResult<()> {
    // A collection missing from the schema file is described by name alone
    let collections = HashMap::from([(collection.to_string(), CollectionSchema::new(collection))]);
    let adapter = connect(config, collections).await?;

    let described = adapter.describe(&config.identity, collection).await;
    adapter.teardown(None).await?;

    match described? {
        Some(attributes) => print_json(&attributes),
        None => {
            info!(collection = %collection, "Table does not exist");
            print_json(&serde_json::Value::Null)
        }
    }
}

async fn query(config: &Config, sql: &str, raw_params: &[String]) -> DbResult<()> {
    let params = raw_params
        .iter()
        .map(|raw| {
            serde_json::from_str::<serde_json::Value>(raw)
                .map(|value| QueryParam::from_json(&value))
                .map_err(|e| DbError::invalid_input(format!("Invalid parameter '{}': {}", raw, e)))
        })
        .collect::<DbResult<Vec<_>>>()?;

    let adapter = connect(config, HashMap::new()).await?;
    let rows = adapter.query(&config.identity, sql, params).await;
    adapter.teardown(None).await?;

    print_json(&rows?)
}

fn print_json<T: serde::Serialize>(value: &T) -> DbResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| DbError::internal(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
