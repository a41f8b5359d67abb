//! Type mappings.
//!
//! Two concerns live here:
//! 1. Mapping catalog type names (DB2 and PostgreSQL) to the ORM's semantic
//!    attribute types, used by `describe`.
//! 2. Decoding sqlx PostgreSQL rows into JSON rows for the bundled driver.
//!
//! Row decoding is two-phase: `categorize_type` classifies a column type,
//! then a per-category decoder extracts the value.

use crate::models::{AttributeType, Dialect};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

// =============================================================================
// Semantic Type Lookup
// =============================================================================

/// Map a catalog type name to a semantic attribute type.
///
/// Unknown names map to `string`.
pub fn semantic_type(dialect: Dialect, native: &str) -> AttributeType {
    let upper = native.trim().to_uppercase();
    match dialect {
        Dialect::Db2 => db2_semantic_type(&upper),
        Dialect::Postgres => postgres_semantic_type(&upper),
    }
    .unwrap_or(AttributeType::String)
}

fn db2_semantic_type(name: &str) -> Option<AttributeType> {
    let mapped = match name {
        "SMALLINT" | "INTEGER" | "INT" | "BIGINT" => AttributeType::Integer,
        "REAL" | "DOUBLE" | "FLOAT" | "DECFLOAT" | "DECIMAL" | "NUMERIC" => AttributeType::Float,
        "CHARACTER" | "CHAR" | "VARCHAR" | "GRAPHIC" | "VARGRAPHIC" | "LONG VARCHAR" => {
            AttributeType::String
        }
        "CLOB" | "DBCLOB" | "BLOB" | "XML" => AttributeType::Text,
        "BINARY" | "VARBINARY" => AttributeType::Binary,
        "TIMESTAMP" | "TIME" => AttributeType::Time,
        "DATE" => AttributeType::Date,
        _ => return None,
    };
    Some(mapped)
}

fn postgres_semantic_type(name: &str) -> Option<AttributeType> {
    let mapped = match name {
        "SMALLINT" | "INTEGER" | "BIGINT" | "INT2" | "INT4" | "INT8" | "SERIAL" | "BIGSERIAL" => {
            AttributeType::Integer
        }
        "REAL" | "DOUBLE PRECISION" | "FLOAT4" | "FLOAT8" | "NUMERIC" | "DECIMAL" => {
            AttributeType::Float
        }
        "CHARACTER VARYING" | "VARCHAR" | "CHARACTER" | "CHAR" | "BPCHAR" => AttributeType::String,
        "TEXT" | "JSON" | "JSONB" => AttributeType::Text,
        "BYTEA" => AttributeType::Binary,
        "TIMESTAMP"
        | "TIMESTAMP WITHOUT TIME ZONE"
        | "TIMESTAMP WITH TIME ZONE"
        | "TIMESTAMPTZ"
        | "TIME WITHOUT TIME ZONE"
        | "TIME" => AttributeType::Time,
        "DATE" => AttributeType::Date,
        _ => return None,
    };
    Some(mapped)
}

/// Whether a catalog type name is an integer type (identity candidates).
pub fn is_integer_type(dialect: Dialect, native: &str) -> bool {
    semantic_type(dialect, native) == AttributeType::Integer
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Text,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with the float checks
    if lower.contains("numeric") || lower.contains("decimal") {
        return TypeCategory::Decimal;
    }

    match lower.as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" => TypeCategory::Integer,
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "bool" | "boolean" => TypeCategory::Boolean,
        "bytea" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "timestamp" => TypeCategory::Timestamp,
        "timestamptz" => TypeCategory::TimestampTz,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// NUMERIC value rendered as text.
///
/// Text-format results are kept verbatim. Parameterized statements return
/// binary results, which are decoded through `rust_decimal`.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        match value.format() {
            PgValueFormat::Text => {
                let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
                Ok(RawDecimal(s.to_string()))
            }
            PgValueFormat::Binary => {
                let decimal = <sqlx::types::Decimal as Decode<sqlx::Postgres>>::decode(value)?;
                Ok(RawDecimal(decimal.to_string()))
            }
        }
    }
}

/// Binary values travel as base64 strings.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row to JSON
// =============================================================================

/// Convert a database row into the JSON row forwarded to the ORM.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Timestamp => decode_display::<NaiveDateTime>(row, idx),
            TypeCategory::TimestampTz => decode_display::<DateTime<Utc>>(row, idx),
            TypeCategory::Date => decode_display::<NaiveDate>(row, idx),
            TypeCategory::Time => decode_display::<NaiveTime>(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Failed to decode NUMERIC");
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return serde_json::Number::from_f64(v as f64)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string()));
        }
        JsonValue::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_display<T>(row: &PgRow, idx: usize) -> JsonValue
    where
        T: std::fmt::Display + for<'r> Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::String(v.to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}
