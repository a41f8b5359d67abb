//! Statement builders.
//!
//! Each builder turns a collection schema plus ORM options into a
//! [`QueryPlan`]. Builders are pure: they never touch a connection.

use super::criteria::{self, ParamList};
use crate::error::{DbError, DbResult};
use crate::models::{
    AttributeDefinition, AttributeType, CollectionSchema, Dialect, FindOptions, QueryParam,
    QueryPlan,
};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

/// Builds statements for one collection in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    dialect: Dialect,
    schema: &'a CollectionSchema,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: Dialect, schema: &'a CollectionSchema) -> Self {
        Self { dialect, schema }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table(&self) -> std::borrow::Cow<'a, str> {
        self.dialect.quote_ident(&self.schema.table_name)
    }

    /// Comma-joined list of every schema attribute, or `*` for an empty schema.
    fn projection(&self) -> String {
        if self.schema.attributes.is_empty() {
            return "*".to_string();
        }
        self.schema
            .column_names()
            .map(|name| self.dialect.quote_ident(name))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `SELECT <all attributes> FROM <table> [WHERE] [ORDER BY] [limit]`.
    pub fn select(&self, options: &FindOptions) -> DbResult<QueryPlan> {
        let mut params = ParamList::new(self.dialect);
        let mut sql = format!("SELECT {} FROM {}", self.projection(), self.table());

        if let Some(predicate) =
            criteria::where_clause(self.dialect, self.schema, &options.where_clause, &mut params)?
        {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        if let Some(order) = criteria::order_by(self.dialect, self.schema, &options.sort)? {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.dialect.limit_clause(options.limit, options.skip) {
            sql.push(' ');
            sql.push_str(&limit);
        }

        Ok(QueryPlan::with_params(sql, params.into_vec()))
    }

    /// INSERT of the known, non-generated columns, returning the stored row.
    pub fn insert(&self, values: &Map<String, JsonValue>) -> DbResult<QueryPlan> {
        let mut params = ParamList::new(self.dialect);
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();

        for (name, attr_type, value) in self.writable(values) {
            columns.push(self.dialect.quote_ident(name));
            placeholders.push(params.push_json(value, attr_type));
        }

        if columns.is_empty() {
            return Err(DbError::invalid_input(format!(
                "No writable columns in values for '{}'",
                self.schema.table_name
            )));
        }

        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        let sql = self.dialect.returning_insert(&insert, &self.projection());
        Ok(QueryPlan::with_params(sql, params.into_vec()))
    }

    /// `UPDATE <table> SET ... [WHERE ...]`; SET parameters precede WHERE
    /// parameters.
    pub fn update(
        &self,
        criteria: &Map<String, JsonValue>,
        values: &Map<String, JsonValue>,
    ) -> DbResult<QueryPlan> {
        let mut params = ParamList::new(self.dialect);
        let assignments: Vec<String> = self
            .writable(values)
            .map(|(name, attr_type, value)| {
                format!(
                    "{} = {}",
                    self.dialect.quote_ident(name),
                    params.push_json(value, attr_type)
                )
            })
            .collect();

        if assignments.is_empty() {
            return Err(DbError::invalid_input(format!(
                "No writable columns in values for '{}'",
                self.schema.table_name
            )));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table(), assignments.join(", "));
        self.push_where(&mut sql, criteria, &mut params)?;
        Ok(QueryPlan::with_params(sql, params.into_vec()))
    }

    /// `DELETE FROM <table> [WHERE ...]`.
    pub fn delete(&self, criteria: &Map<String, JsonValue>) -> DbResult<QueryPlan> {
        let mut params = ParamList::new(self.dialect);
        let mut sql = format!("DELETE FROM {}", self.table());
        self.push_where(&mut sql, criteria, &mut params)?;
        Ok(QueryPlan::with_params(sql, params.into_vec()))
    }

    /// Values restricted to known attributes that are not generated.
    fn writable<'v>(
        &self,
        values: &'v Map<String, JsonValue>,
    ) -> impl Iterator<Item = (&'v String, AttributeType, &'v JsonValue)> + use<'v, 'a> {
        let schema = self.schema;
        values.iter().filter_map(move |(name, value)| match schema.get(name) {
            Some(definition) if definition.is_generated() => None,
            Some(definition) => Some((name, definition.attr_type, value)),
            None => {
                debug!(table = %schema.table_name, key = %name, "Dropping unknown value key");
                None
            }
        })
    }

    /// Append the WHERE clause for a mutating statement.
    ///
    /// A non-empty map whose keys were all unknown would otherwise widen the
    /// statement to every row, so it is rejected.
    fn push_where(
        &self,
        sql: &mut String,
        criteria: &Map<String, JsonValue>,
        params: &mut ParamList,
    ) -> DbResult<()> {
        match criteria::where_clause(self.dialect, self.schema, criteria, params)? {
            Some(predicate) => {
                sql.push_str(" WHERE ");
                sql.push_str(&predicate);
                Ok(())
            }
            None if criteria.is_empty() => Ok(()),
            None => Err(DbError::invalid_input(format!(
                "None of the criteria keys are attributes of '{}'",
                self.schema.table_name
            ))),
        }
    }

    /// `CREATE TABLE` with one column clause per attribute.
    pub fn create_table(&self) -> DbResult<QueryPlan> {
        self.schema.validate()?;
        if self.schema.attributes.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Collection '{}' has no attributes",
                self.schema.table_name
            )));
        }

        let columns: Vec<String> = self
            .schema
            .attributes
            .iter()
            .map(|(name, definition)| self.column_clause(name, definition))
            .collect();

        Ok(QueryPlan::new(format!(
            "CREATE TABLE {} ({})",
            self.table(),
            columns.join(", ")
        )))
    }

    /// One `CREATE INDEX` per attribute flagged `index` that is not already
    /// covered by a key or unique constraint.
    pub fn create_indexes(&self) -> Vec<QueryPlan> {
        self.schema
            .attributes
            .iter()
            .filter(|(_, d)| d.index && !d.primary_key && !d.unique)
            .map(|(name, _)| {
                let index_name = format!("{}_{}", self.schema.table_name, name);
                QueryPlan::new(format!(
                    "CREATE INDEX {} ON {} ({})",
                    self.dialect.quote_ident(&index_name),
                    self.table(),
                    self.dialect.quote_ident(name)
                ))
            })
            .collect()
    }

    pub fn drop_table(&self) -> DbResult<QueryPlan> {
        crate::models::validate_identifier(&self.schema.table_name)?;
        Ok(QueryPlan::new(format!("DROP TABLE {}", self.table())))
    }

    pub fn add_column(&self, name: &str, definition: &AttributeDefinition) -> DbResult<QueryPlan> {
        crate::models::validate_identifier(name)?;
        Ok(QueryPlan::new(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.table(),
            self.column_clause(name, definition)
        )))
    }

    pub fn drop_column(&self, name: &str) -> DbResult<QueryPlan> {
        crate::models::validate_identifier(name)?;
        let sql = match self.dialect {
            Dialect::Db2 => format!(
                "ALTER TABLE {} DROP COLUMN {} RESTRICT",
                self.table(),
                self.dialect.quote_ident(name)
            ),
            Dialect::Postgres => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.table(),
                self.dialect.quote_ident(name)
            ),
        };
        Ok(QueryPlan::new(sql))
    }

    fn column_clause(&self, name: &str, definition: &AttributeDefinition) -> String {
        format!(
            "{} {}",
            self.dialect.quote_ident(name),
            self.dialect.column_definition(definition)
        )
    }

    /// Catalog query for the table's columns.
    pub fn describe_columns(&self) -> QueryPlan {
        QueryPlan::with_params(
            self.dialect.describe_columns_sql().trim(),
            vec![self.catalog_param()],
        )
    }

    /// Catalog query for the table's indexes.
    pub fn describe_indexes(&self) -> QueryPlan {
        QueryPlan::with_params(
            self.dialect.describe_indexes_sql().trim(),
            vec![self.catalog_param()],
        )
    }

    fn catalog_param(&self) -> QueryParam {
        QueryParam::String(self.dialect.catalog_name(&self.schema.table_name))
    }
}
