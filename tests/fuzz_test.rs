//! Black-box fuzzing of the statement builders and adapter entry points.
//!
//! Random, malicious and edge-case names and values must produce either a
//! well-formed plan or an error, never a panic, and hostile identifiers must
//! never be spliced into SQL.

mod common;

use common::{StubDriver, collections, db2_config, object, person_schema};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sails_db2::adapter::{Adapter, SqlAdapter};
use sails_db2::error::DbError;
use sails_db2::models::{
    AttributeDefinition, AttributeType, CollectionSchema, Dialect, FindOptions,
    validate_identifier,
};
use sails_db2::sql::StatementBuilder;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "'OR 1=1--".to_string(),
        "'; DROP TABLE person--".to_string(),
        "name\"; DROP TABLE person; --".to_string(),
        "a".repeat(10_000),
        random_string(100),
        "\u{0000}\u{FFFF}".to_string(),
        "1' UNION SELECT NULL, NULL--".to_string(),
        "person.name".to_string(),
        "9lives".to_string(),
        "\x00\x01\x02".to_string(),
    ]
}

fn edge_case_values() -> Vec<JsonValue> {
    vec![
        JsonValue::Null,
        json!(true),
        json!(i64::MIN),
        json!(i64::MAX),
        json!(u64::MAX),
        json!(f64::MAX),
        json!(-0.0),
        json!([]),
        json!([null, 1, "two", [3]]),
        json!({}),
        json!({ "<": 5, ">": null }),
        json!({ "in": [] }),
        json!({ "not": [] }),
        json!({ "like": "%'--" }),
        json!({ "bogus": 1 }),
        json!({ "contains": { "nested": true } }),
        json!("'; DROP TABLE person--"),
    ]
}

#[test]
fn fuzz_identifier_validation() {
    for name in edge_case_strings() {
        // Anything that passes must be a plain SQL name
        if validate_identifier(&name).is_ok() {
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    for _ in 0..200 {
        let len = rand::thread_rng().gen_range(1..40);
        let name = format!("c{}", random_string(len));
        assert!(validate_identifier(&name).is_ok(), "rejected {}", name);
    }
}

#[test]
fn fuzz_hostile_table_names() {
    for name in edge_case_strings() {
        let schema = CollectionSchema::new(name.clone())
            .attribute("name", AttributeDefinition::new(AttributeType::String));

        for dialect in [Dialect::Db2, Dialect::Postgres] {
            let builder = StatementBuilder::new(dialect, &schema);
            if validate_identifier(&name).is_err() {
                assert!(matches!(
                    builder.create_table(),
                    Err(DbError::InvalidIdentifier { .. })
                ));
                assert!(builder.drop_table().is_err());
            }
        }
    }
}

#[test]
fn fuzz_hostile_attribute_names() {
    let schema = person_schema();
    let builder = StatementBuilder::new(Dialect::Db2, &schema);

    for name in edge_case_strings() {
        let column = builder.add_column(&name, &AttributeDefinition::new(AttributeType::Text));
        let dropped = builder.drop_column(&name);
        if validate_identifier(&name).is_err() {
            assert!(column.is_err());
            assert!(dropped.is_err());
        }
    }
}

#[test]
fn fuzz_criteria_keys_and_values() {
    let schema = person_schema();

    for dialect in [Dialect::Db2, Dialect::Postgres] {
        let builder = StatementBuilder::new(dialect, &schema);

        // Unknown keys never reach the statement text
        for key in edge_case_strings() {
            let mut criteria = serde_json::Map::new();
            criteria.insert(key.clone(), json!(1));
            let plan = builder
                .select(&FindOptions::matching(criteria).with_sort(key.clone(), 1))
                .unwrap();
            if !schema.contains(&key) {
                assert!(!plan.sql.contains("WHERE"));
                assert!(plan.params.is_empty());
            }
        }

        // Values only travel as parameters
        for value in edge_case_values() {
            let criteria = object(json!({ "name": value.clone() }));
            if let Ok(plan) = builder.select(&FindOptions::matching(criteria.clone())) {
                assert!(!plan.sql.contains("DROP"));
            }
            if let Ok(plan) = builder.delete(&criteria) {
                assert!(plan.sql.starts_with("DELETE FROM"));
            }
            let _ = builder.update(&criteria, &object(json!({ "age": value })));
        }
    }
}

#[test]
fn fuzz_sort_directions() {
    let schema = person_schema();
    let builder = StatementBuilder::new(Dialect::Db2, &schema);

    for direction in edge_case_values() {
        let options = FindOptions::default().with_sort("name", direction.clone());
        match builder.select(&options) {
            Ok(plan) => assert!(
                plan.sql.ends_with("ORDER BY name ASC") || plan.sql.ends_with("ORDER BY name DESC")
            ),
            Err(e) => assert!(matches!(e, DbError::InvalidInput { .. }), "{:?}", e),
        }
    }
}

#[test]
fn fuzz_adapter_entry_points() {
    tokio_test::block_on(async {
        let driver = StubDriver::new();
        let adapter = SqlAdapter::new(Arc::new(driver.clone()));
        adapter
            .register_connection(db2_config("main"), collections())
            .await
            .unwrap();

        for name in edge_case_strings() {
            let _ = adapter.find(&name, "person", FindOptions::default()).await;
            let _ = adapter.find("main", &name, FindOptions::default()).await;
            let _ = adapter.query("main", &name, Vec::new()).await;
            let _ = adapter.remove_attribute("main", "person", &name).await;
            let _ = adapter.teardown(Some(&name)).await;
        }

        // Every acquisition was paired with a release
        assert_eq!(driver.state.acquired(), driver.state.released());
    });
}
