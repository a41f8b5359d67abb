//! Round trip through the bundled PostgreSQL driver.
//!
//! Requires a running PostgreSQL server. Set TEST_POSTGRES_HOST (and
//! optionally TEST_POSTGRES_PORT, TEST_POSTGRES_USER, TEST_POSTGRES_PASSWORD,
//! TEST_POSTGRES_DB) to run these tests.

use sails_db2::adapter::{Adapter, SqlAdapter};
use sails_db2::config::PoolOptions;
use sails_db2::db::PgDriver;
use sails_db2::models::{
    AttributeType, Attributes, CollectionSchema, ConnectionConfig, Dialect, FindOptions,
    QueryParam,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn postgres_config(identity: &str) -> Option<ConnectionConfig> {
    let host = match std::env::var("TEST_POSTGRES_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("Skipping test: TEST_POSTGRES_HOST not set");
            return None;
        }
    };
    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());

    let mut config = ConnectionConfig::new(
        identity,
        Dialect::Postgres,
        env("TEST_POSTGRES_DB", "postgres"),
        env("TEST_POSTGRES_USER", "postgres"),
        env("TEST_POSTGRES_PASSWORD", "postgres"),
    )
    .with_host(host);
    if let Some(port) = std::env::var("TEST_POSTGRES_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config = config.with_port(port);
    }
    Some(config)
}

fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn pet_attributes() -> Attributes {
    serde_json::from_value(json!({
        "id": { "type": "integer", "primaryKey": true, "autoIncrement": true },
        "name": { "type": "string", "size": 64, "index": true },
        "weight": "float",
        "tag": { "type": "string", "unique": true }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_postgres_collection_lifecycle() {
    let Some(config) = postgres_config("pg_lifecycle") else {
        return;
    };

    let adapter = SqlAdapter::new(Arc::new(PgDriver::new()));
    let collections = HashMap::from([(
        "pet".to_string(),
        CollectionSchema::new("sails_db2_pet"),
    )]);
    adapter
        .register_connection(config.with_pool(PoolOptions::default()), collections)
        .await
        .unwrap();

    // Start from a clean slate
    adapter
        .drop("pg_lifecycle", "pet", &[])
        .await
        .unwrap();
    assert_eq!(adapter.describe("pg_lifecycle", "pet").await.unwrap(), None);

    let described = adapter
        .define("pg_lifecycle", "pet", pet_attributes())
        .await
        .unwrap()
        .expect("table should exist after define");
    assert!(described["id"].primary_key && described["id"].auto_increment);
    assert_eq!(described["name"].attr_type, AttributeType::String);
    assert!(described["name"].indexed);
    assert!(described["tag"].unique);
    assert_eq!(described["weight"].attr_type, AttributeType::Float);

    let rex = adapter
        .create(
            "pg_lifecycle",
            "pet",
            object(json!({ "name": "Rex", "weight": 12.5, "tag": "A1" })),
        )
        .await
        .unwrap();
    assert_eq!(rex["name"], json!("Rex"));
    assert!(rex["id"].is_i64());

    let more = adapter
        .create_each(
            "pg_lifecycle",
            "pet",
            vec![
                object(json!({ "name": "Tom", "weight": 4.0, "tag": "B2" })),
                object(json!({ "name": "Kit", "weight": 3.2, "tag": "C3" })),
            ],
        )
        .await
        .unwrap();
    assert_eq!(more.len(), 2);

    let heavy = adapter
        .find(
            "pg_lifecycle",
            "pet",
            FindOptions::matching(object(json!({ "weight": { ">": 3.5 } }))).with_sort("name", 1),
        )
        .await
        .unwrap();
    let names: Vec<_> = heavy.iter().map(|row| row["name"].clone()).collect();
    assert_eq!(names, vec![json!("Rex"), json!("Tom")]);

    adapter
        .update(
            "pg_lifecycle",
            "pet",
            FindOptions::matching(object(json!({ "name": "Kit" }))),
            object(json!({ "weight": 3.9 })),
        )
        .await
        .unwrap();
    let kit = adapter
        .find(
            "pg_lifecycle",
            "pet",
            FindOptions::matching(object(json!({ "tag": "C3" }))),
        )
        .await
        .unwrap();
    assert_eq!(kit[0]["weight"], json!(3.9));

    adapter
        .destroy(
            "pg_lifecycle",
            "pet",
            FindOptions::matching(object(json!({ "name": ["Tom", "Kit"] }))),
        )
        .await
        .unwrap();
    let count = adapter
        .query(
            "pg_lifecycle",
            "SELECT COUNT(*)::int8 AS n FROM sails_db2_pet WHERE weight > $1",
            vec![QueryParam::Float(0.0)],
        )
        .await
        .unwrap();
    assert_eq!(count[0]["n"], json!(1));

    adapter
        .drop("pg_lifecycle", "pet", &[])
        .await
        .unwrap();
    adapter.teardown(None).await.unwrap();
}

#[tokio::test]
async fn test_postgres_alter_attributes() {
    let Some(config) = postgres_config("pg_alter") else {
        return;
    };

    let adapter = SqlAdapter::new(Arc::new(PgDriver::new()));
    let collections = HashMap::from([(
        "owner".to_string(),
        CollectionSchema::new("sails_db2_owner"),
    )]);
    adapter
        .register_connection(config, collections)
        .await
        .unwrap();
    adapter.drop("pg_alter", "owner", &[]).await.unwrap();

    let attributes: Attributes =
        serde_json::from_value(json!({ "id": { "type": "integer", "primaryKey": true, "autoIncrement": true }, "name": "string" }))
            .unwrap();
    adapter
        .define("pg_alter", "owner", attributes)
        .await
        .unwrap();

    adapter
        .add_attribute(
            "pg_alter",
            "owner",
            "born",
            serde_json::from_value(json!("date")).unwrap(),
        )
        .await
        .unwrap();
    let described = adapter
        .describe("pg_alter", "owner")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(described["born"].attr_type, AttributeType::Date);

    adapter
        .remove_attribute("pg_alter", "owner", "born")
        .await
        .unwrap();
    let described = adapter
        .describe("pg_alter", "owner")
        .await
        .unwrap()
        .unwrap();
    assert!(!described.contains_key("born"));

    adapter.drop("pg_alter", "owner", &[]).await.unwrap();
    adapter.teardown(Some("pg_alter")).await.unwrap();
}

#[tokio::test]
async fn test_postgres_nulls_dates_and_numerics() {
    let Some(config) = postgres_config("pg_types") else {
        return;
    };

    let adapter = SqlAdapter::new(Arc::new(PgDriver::new()));
    let collections = HashMap::from([(
        "visit".to_string(),
        CollectionSchema::new("sails_db2_visit"),
    )]);
    adapter
        .register_connection(config, collections)
        .await
        .unwrap();
    adapter.drop("pg_types", "visit", &[]).await.unwrap();

    let attributes: Attributes = serde_json::from_value(json!({
        "id": { "type": "integer", "primaryKey": true, "autoIncrement": true },
        "name": "string",
        "age": "integer",
        "born": "date",
        "seen": "datetime"
    }))
    .unwrap();
    adapter
        .define("pg_types", "visit", attributes)
        .await
        .unwrap();

    let rex = adapter
        .create(
            "pg_types",
            "visit",
            object(json!({
                "name": "Rex",
                "age": null,
                "born": "2020-01-02",
                "seen": "2024-05-06 07:08:09"
            })),
        )
        .await
        .unwrap();
    assert_eq!(rex["age"], json!(null));
    assert_eq!(rex["born"], json!("2020-01-02"));
    assert_eq!(rex["seen"], json!("2024-05-06 07:08:09"));

    adapter
        .create(
            "pg_types",
            "visit",
            object(json!({ "name": "Tom", "age": 3, "born": null, "seen": null })),
        )
        .await
        .unwrap();

    // Untyped values in SET and WHERE
    adapter
        .update(
            "pg_types",
            "visit",
            FindOptions::matching(object(json!({ "born": "2020-01-02" }))),
            object(json!({ "age": 9, "seen": null })),
        )
        .await
        .unwrap();
    adapter
        .update(
            "pg_types",
            "visit",
            FindOptions::matching(object(json!({ "name": "Tom" }))),
            object(json!({ "age": null, "born": "2021-03-04" })),
        )
        .await
        .unwrap();

    let rows = adapter
        .find(
            "pg_types",
            "visit",
            FindOptions::matching(object(json!({ "born": { ">=": "2020-01-01" } })))
                .with_sort("born", 1),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("Rex"));
    assert_eq!(rows[0]["age"], json!(9));
    assert_eq!(rows[0]["seen"], json!(null));
    assert_eq!(rows[1]["name"], json!("Tom"));
    assert_eq!(rows[1]["age"], json!(null));
    assert_eq!(rows[1]["born"], json!("2021-03-04"));

    // NUMERIC comes back as text in both result formats
    adapter
        .query(
            "pg_types",
            "ALTER TABLE sails_db2_visit ADD COLUMN price NUMERIC(10, 2)",
            Vec::new(),
        )
        .await
        .unwrap();
    adapter
        .query(
            "pg_types",
            "UPDATE sails_db2_visit SET price = 12.50",
            Vec::new(),
        )
        .await
        .unwrap();
    let priced = adapter
        .query(
            "pg_types",
            "SELECT price FROM sails_db2_visit WHERE name = $1",
            vec![QueryParam::from("Rex")],
        )
        .await
        .unwrap();
    assert_eq!(priced[0]["price"], json!("12.50"));

    let unparameterized = adapter
        .query("pg_types", "SELECT 1.5::numeric AS n", Vec::new())
        .await
        .unwrap();
    let parameterized = adapter
        .query(
            "pg_types",
            "SELECT 1.5::numeric AS n WHERE 1 = $1",
            vec![QueryParam::Int(1)],
        )
        .await
        .unwrap();
    assert_eq!(unparameterized[0]["n"], json!("1.5"));
    assert_eq!(parameterized[0]["n"], json!("1.5"));

    adapter.drop("pg_types", "visit", &[]).await.unwrap();
    adapter.teardown(None).await.unwrap();
}
