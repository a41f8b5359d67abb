//! Dialect-specific SQL fragments.
//!
//! Everything that differs between DB2 and the legacy PostgreSQL variant at
//! the statement level lives here: identifier quoting, placeholders, the
//! row-limit clause, column types and the catalog queries used by
//! `describe`.

use crate::models::{AttributeDefinition, AttributeType, Dialect};
use std::borrow::Cow;

/// Length used for VARCHAR / VARBINARY columns without an explicit length.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

impl Dialect {
    /// Quote an identifier for this dialect.
    ///
    /// DB2 identifiers are emitted bare so they fold to upper case the same
    /// way the ORM's unquoted names do. Callers validate identifiers first.
    pub fn quote_ident<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            Dialect::Db2 => Cow::Borrowed(name),
            Dialect::Postgres => Cow::Owned(format!("\"{}\"", name)),
        }
    }

    /// Placeholder for the `position`-th parameter (1-based).
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Db2 => "?".to_string(),
            Dialect::Postgres => format!("${}", position),
        }
    }

    /// Cast applied to an untyped parameter (a null or a string) bound for
    /// a column of `attr_type`.
    ///
    /// PostgreSQL would otherwise resolve such parameters as text and refuse
    /// them for integer, date and timestamp columns. DB2 describes parameter
    /// types from the statement itself.
    pub fn parameter_cast(&self, attr_type: AttributeType) -> Option<&'static str> {
        match self {
            Dialect::Db2 => None,
            Dialect::Postgres => match attr_type {
                AttributeType::String | AttributeType::Text => None,
                AttributeType::Integer => Some("bigint"),
                AttributeType::Float => Some("double precision"),
                AttributeType::Binary => Some("bytea"),
                AttributeType::Time => Some("timestamp"),
                AttributeType::Date => Some("date"),
            },
        }
    }

    /// Row-limit clause, or `None` when neither limit nor skip is set.
    pub fn limit_clause(&self, limit: Option<u64>, skip: Option<u64>) -> Option<String> {
        match self {
            Dialect::Db2 => match (limit, skip) {
                (None, None) => None,
                (Some(limit), None) => Some(format!("FETCH FIRST {} ROWS ONLY", limit)),
                (None, Some(skip)) => Some(format!("OFFSET {} ROWS", skip)),
                (Some(limit), Some(skip)) => Some(format!(
                    "OFFSET {} ROWS FETCH FIRST {} ROWS ONLY",
                    skip, limit
                )),
            },
            Dialect::Postgres => {
                let mut parts = Vec::new();
                if let Some(limit) = limit {
                    parts.push(format!("LIMIT {}", limit));
                }
                if let Some(skip) = skip {
                    parts.push(format!("OFFSET {}", skip));
                }
                (!parts.is_empty()).then(|| parts.join(" "))
            }
        }
    }

    /// Wrap an INSERT so that it returns the inserted row.
    pub fn returning_insert(&self, insert: &str, projection: &str) -> String {
        match self {
            Dialect::Db2 => format!("SELECT {} FROM FINAL TABLE ({})", projection, insert),
            Dialect::Postgres => format!("{} RETURNING {}", insert, projection),
        }
    }

    /// Column type and constraints for one attribute.
    pub fn column_definition(&self, definition: &AttributeDefinition) -> String {
        let length = definition.length.unwrap_or(DEFAULT_STRING_LENGTH);

        if definition.primary_key && definition.auto_increment {
            return match self {
                Dialect::Db2 => "INTEGER NOT NULL GENERATED ALWAYS AS IDENTITY \
                                 (START WITH 1, INCREMENT BY 1) PRIMARY KEY"
                    .to_string(),
                Dialect::Postgres => "SERIAL PRIMARY KEY".to_string(),
            };
        }

        if definition.primary_key {
            return format!("VARCHAR({}) NOT NULL PRIMARY KEY", length);
        }

        let column_type = self.column_type(definition.attr_type, length);
        if definition.unique {
            match self {
                // DB2 only accepts unique constraints on NOT NULL columns
                Dialect::Db2 => format!("{} NOT NULL UNIQUE", column_type),
                Dialect::Postgres => format!("{} UNIQUE", column_type),
            }
        } else {
            column_type
        }
    }

    fn column_type(&self, attr_type: AttributeType, length: u32) -> String {
        match (self, attr_type) {
            (_, AttributeType::String) => format!("VARCHAR({})", length),
            (_, AttributeType::Integer) => "INTEGER".to_string(),
            (Dialect::Db2, AttributeType::Float) => "DOUBLE".to_string(),
            (Dialect::Postgres, AttributeType::Float) => "DOUBLE PRECISION".to_string(),
            (Dialect::Db2, AttributeType::Text) => "BLOB".to_string(),
            (Dialect::Postgres, AttributeType::Text) => "TEXT".to_string(),
            (Dialect::Db2, AttributeType::Binary) => format!("VARBINARY({})", length),
            (Dialect::Postgres, AttributeType::Binary) => "BYTEA".to_string(),
            (_, AttributeType::Time) => "TIMESTAMP".to_string(),
            (_, AttributeType::Date) => "DATE".to_string(),
        }
    }

    /// How this dialect stores unquoted table names in its catalog.
    pub fn catalog_name(&self, table_name: &str) -> String {
        match self {
            Dialect::Db2 => table_name.to_uppercase(),
            Dialect::Postgres => table_name.to_string(),
        }
    }

    /// Catalog query returning one row per column with the fields
    /// `name, type, length, nullable, identity, keyseq`.
    pub fn describe_columns_sql(&self) -> &'static str {
        match self {
            Dialect::Db2 => queries::db2::DESCRIBE_COLUMNS,
            Dialect::Postgres => queries::postgres::DESCRIBE_COLUMNS,
        }
    }

    /// Catalog query returning one row per index with the fields
    /// `columns` (`+A+B` form) and `uniquerule` (`P`, `U` or `D`).
    pub fn describe_indexes_sql(&self) -> &'static str {
        match self {
            Dialect::Db2 => queries::db2::DESCRIBE_INDEXES,
            Dialect::Postgres => queries::postgres::DESCRIBE_INDEXES,
        }
    }
}

// =============================================================================
// Catalog Queries
// =============================================================================

mod queries {
    pub mod db2 {
        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                COLNAME AS "name",
                TYPENAME AS "type",
                LENGTH AS "length",
                CASE WHEN NULLS = 'Y' THEN 1 ELSE 0 END AS "nullable",
                CASE WHEN IDENTITY = 'Y' THEN 1 ELSE 0 END AS "identity",
                KEYSEQ AS "keyseq"
            FROM SYSCAT.COLUMNS
            WHERE TABSCHEMA = CURRENT SCHEMA AND TABNAME = ?
            ORDER BY COLNO
            "#;

        pub const DESCRIBE_INDEXES: &str = r#"
            SELECT
                COLNAMES AS "columns",
                UNIQUERULE AS "uniquerule"
            FROM SYSCAT.INDEXES
            WHERE TABSCHEMA = CURRENT SCHEMA AND TABNAME = ?
            "#;
    }

    pub mod postgres {
        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                c.column_name::text AS "name",
                c.data_type::text AS "type",
                c.character_maximum_length::int4 AS "length",
                CASE WHEN c.is_nullable = 'YES' THEN 1 ELSE 0 END AS "nullable",
                CASE
                    WHEN c.is_identity = 'YES' OR c.column_default LIKE 'nextval(%' THEN 1
                    ELSE 0
                END AS "identity",
                (
                    SELECT kcu.ordinal_position::int4
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON tc.constraint_name = kcu.constraint_name
                        AND tc.table_schema = kcu.table_schema
                    WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_name = c.table_name
                    AND tc.table_schema = c.table_schema
                    AND kcu.column_name = c.column_name
                ) AS "keyseq"
            FROM information_schema.columns c
            WHERE c.table_name = $1 AND c.table_schema = current_schema()
            ORDER BY c.ordinal_position
            "#;

        pub const DESCRIBE_INDEXES: &str = r#"
            SELECT
                '+' || string_agg(a.attname::text, '+' ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS "columns",
                CASE
                    WHEN ix.indisprimary THEN 'P'
                    WHEN ix.indisunique THEN 'U'
                    ELSE 'D'
                END AS "uniquerule"
            FROM pg_index ix
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_class t ON t.oid = ix.indrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE t.relname = $1 AND n.nspname = current_schema()
            GROUP BY i.relname, ix.indisprimary, ix.indisunique
            "#;
    }
}
