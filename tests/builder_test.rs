//! Statement builder behavior as seen by the adapter's callers.

mod common;

use common::{object, person_schema};
use rand::seq::SliceRandom;
use sails_db2::error::DbError;
use sails_db2::models::{
    AttributeDefinition, AttributeType, CollectionSchema, Dialect, FindOptions, QueryParam,
};
use sails_db2::sql::StatementBuilder;
use serde_json::json;

fn id_name_schema() -> CollectionSchema {
    CollectionSchema::new("t")
        .attribute("id", AttributeDefinition::new(AttributeType::Integer))
        .attribute("name", AttributeDefinition::new(AttributeType::String))
}

#[test]
fn test_select_projects_all_attributes() {
    let schema = id_name_schema();
    let plan = StatementBuilder::new(Dialect::Db2, &schema)
        .select(&FindOptions::default())
        .unwrap();

    assert_eq!(plan.sql, "SELECT id,name FROM t");
    assert!(plan.params.is_empty());
}

#[test]
fn test_select_where_equality() {
    let schema = id_name_schema();
    let plan = StatementBuilder::new(Dialect::Db2, &schema)
        .select(&FindOptions::matching(object(json!({ "name": "Ann" }))))
        .unwrap();

    assert_eq!(plan.sql, "SELECT id,name FROM t WHERE name = ?");
    assert_eq!(plan.params, vec![QueryParam::from("Ann")]);
}

#[test]
fn test_select_ignores_unknown_keys() {
    let schema = id_name_schema();
    let options = FindOptions::matching(object(json!({ "ghost": 1 }))).with_sort("ghost", 1);
    let plan = StatementBuilder::new(Dialect::Db2, &schema)
        .select(&options)
        .unwrap();

    assert_eq!(plan.sql, "SELECT id,name FROM t");
    assert!(plan.params.is_empty());
}

#[test]
fn test_select_paging() {
    let schema = id_name_schema();
    let options = FindOptions::default()
        .with_sort("name", "desc")
        .with_limit(10)
        .with_skip(30);

    let db2 = StatementBuilder::new(Dialect::Db2, &schema)
        .select(&options)
        .unwrap();
    assert_eq!(
        db2.sql,
        "SELECT id,name FROM t ORDER BY name DESC OFFSET 30 ROWS FETCH FIRST 10 ROWS ONLY"
    );

    let pg = StatementBuilder::new(Dialect::Postgres, &schema)
        .select(&options)
        .unwrap();
    assert_eq!(
        pg.sql,
        "SELECT \"id\",\"name\" FROM \"t\" ORDER BY \"name\" DESC LIMIT 10 OFFSET 30"
    );
}

#[test]
fn test_insert_excludes_auto_increment() {
    let schema = person_schema();
    let plan = StatementBuilder::new(Dialect::Db2, &schema)
        .insert(&object(json!({ "id": 5, "name": "Ann", "age": 41 })))
        .unwrap();

    assert!(!plan.sql.contains("(id,") && !plan.sql.contains("(id)"));
    assert!(plan.sql.contains("INSERT INTO person (name, age) VALUES (?, ?)"));
    assert_eq!(plan.params, vec![QueryParam::from("Ann"), QueryParam::Int(41)]);
}

#[test]
fn test_insert_with_no_columns_is_rejected() {
    let schema = person_schema();
    let result = StatementBuilder::new(Dialect::Db2, &schema)
        .insert(&object(json!({ "id": 5, "ghost": true })));
    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
}

#[test]
fn test_where_params_follow_encounter_order() {
    let schema = person_schema();
    let mut keys = vec!["id", "name", "age"];
    keys.shuffle(&mut rand::thread_rng());

    let mut criteria = serde_json::Map::new();
    for (i, key) in keys.iter().enumerate() {
        criteria.insert(key.to_string(), json!(i as i64));
    }

    let plan = StatementBuilder::new(Dialect::Db2, &schema)
        .delete(&criteria)
        .unwrap();

    let expected_where = keys
        .iter()
        .map(|key| format!("{} = ?", key))
        .collect::<Vec<_>>()
        .join(" AND ");
    assert_eq!(plan.sql, format!("DELETE FROM person WHERE {}", expected_where));
    assert_eq!(
        plan.params,
        (0..keys.len() as i64).map(QueryParam::Int).collect::<Vec<_>>()
    );
}

#[test]
fn test_update_with_only_unknown_where_keys_is_rejected() {
    let schema = person_schema();
    let result = StatementBuilder::new(Dialect::Db2, &schema)
        .update(&object(json!({ "ghost": 1 })), &object(json!({ "name": "Bo" })));
    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
}

#[test]
fn test_create_table_from_shorthand_attributes() {
    let schema: CollectionSchema = serde_json::from_value(json!({
        "tableName": "pet",
        "attributes": {
            "id": { "type": "integer", "primaryKey": true, "autoIncrement": true },
            "name": "string",
            "weight": "float",
            "notes": "text",
            "born": "date"
        }
    }))
    .unwrap();

    let plan = StatementBuilder::new(Dialect::Postgres, &schema)
        .create_table()
        .unwrap();
    assert_eq!(
        plan.sql,
        "CREATE TABLE \"pet\" (\"id\" SERIAL PRIMARY KEY, \"name\" VARCHAR(255), \
         \"weight\" DOUBLE PRECISION, \"notes\" TEXT, \"born\" DATE)"
    );
}

#[test]
fn test_invalid_identifiers_never_reach_sql() {
    let schema = CollectionSchema::new("pet; DROP TABLE person")
        .attribute("name", AttributeDefinition::new(AttributeType::String));
    let builder = StatementBuilder::new(Dialect::Db2, &schema);

    assert!(matches!(
        builder.create_table(),
        Err(DbError::InvalidIdentifier { .. })
    ));
    assert!(builder.drop_table().is_err());
}
