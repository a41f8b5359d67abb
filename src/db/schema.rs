//! Schema introspection.
//!
//! Reads a table's columns and indexes from the catalog and normalizes them
//! into the ORM's described-attribute form.

use crate::db::driver::Handle;
use crate::db::executor;
use crate::db::types::{is_integer_type, semantic_type};
use crate::error::DbResult;
use crate::models::{CollectionSchema, DescribedAttribute, DescribedSchema, Dialect, Row};
use crate::sql::StatementBuilder;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Describes one collection's table.
#[derive(Debug, Clone, Copy)]
pub struct SchemaInspector<'a> {
    builder: StatementBuilder<'a>,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(dialect: Dialect, schema: &'a CollectionSchema) -> Self {
        Self {
            builder: StatementBuilder::new(dialect, schema),
        }
    }

    /// Describe the table, or `None` if it does not exist.
    ///
    /// Both catalog queries run on the same handle.
    pub async fn describe(&self, handle: &mut dyn Handle) -> DbResult<Option<DescribedSchema>> {
        let columns = match executor::run_allow_missing(handle, &self.builder.describe_columns())
            .await?
        {
            Some(rows) if !rows.is_empty() => rows,
            _ => {
                debug!("Table not found in catalog");
                return Ok(None);
            }
        };
        let indexes = executor::run_allow_missing(handle, &self.builder.describe_indexes())
            .await?
            .unwrap_or_default();

        Ok(Some(normalize(self.builder.dialect(), &columns, &indexes)))
    }
}

/// Build described attributes from catalog column and index rows.
pub fn normalize(dialect: Dialect, columns: &[Row], indexes: &[Row]) -> DescribedSchema {
    let mut described = DescribedSchema::new();

    for row in columns {
        let Some(name) = text(row, "name") else {
            continue;
        };
        let name = column_name(dialect, name);
        let native_type = text(row, "type").unwrap_or_default().trim().to_string();
        let nullable = flag(row, "nullable");
        let identity = flag(row, "identity");
        let in_primary_key = number(row, "keyseq").is_some_and(|seq| seq > 0);
        let integer = is_integer_type(dialect, &native_type);

        let generated_key = identity && in_primary_key && !nullable && integer;
        let length = number(row, "length")
            .filter(|len| *len > 0)
            .and_then(|len| u32::try_from(len).ok());

        described.insert(
            name,
            DescribedAttribute {
                attr_type: semantic_type(dialect, &native_type),
                native_type,
                nullable,
                primary_key: in_primary_key,
                auto_increment: generated_key,
                unique: generated_key,
                indexed: false,
                length,
            },
        );
    }

    for row in indexes {
        let Some(spec) = text(row, "columns") else {
            continue;
        };
        let index_columns: Vec<String> = spec
            .split(['+', '-'])
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| column_name(dialect, c))
            .collect();
        let rule = text(row, "uniquerule").unwrap_or("D").trim().to_uppercase();
        let single_unique = index_columns.len() == 1 && (rule == "U" || rule == "P");

        for column in &index_columns {
            if let Some(attribute) = described.get_mut(column) {
                attribute.indexed = true;
                if single_unique {
                    attribute.unique = true;
                }
            }
        }
    }

    described
}

fn column_name(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::Db2 => name.to_lowercase(),
        Dialect::Postgres => name.to_string(),
    }
}

/// Field lookup tolerant of drivers that upper-case result column names.
fn field<'r>(row: &'r Row, key: &str) -> Option<&'r JsonValue> {
    row.get(key)
        .or_else(|| row.get(&key.to_uppercase()))
        .filter(|v| !v.is_null())
}

fn text<'r>(row: &'r Row, key: &str) -> Option<&'r str> {
    field(row, key).and_then(JsonValue::as_str)
}

fn number(row: &Row, key: &str) -> Option<i64> {
    match field(row, key)? {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(row: &Row, key: &str) -> bool {
    match field(row, key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(JsonValue::String(s)) => matches!(s.trim(), "1" | "Y" | "YES" | "y" | "yes"),
        _ => false,
    }
}
