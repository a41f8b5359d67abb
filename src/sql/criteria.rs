//! WHERE and ORDER BY construction from ORM criteria.
//!
//! Keys that are not attributes of the collection are dropped before any SQL
//! is produced; the ORM routinely passes a superset of options.

use crate::error::{DbError, DbResult};
use crate::models::{AttributeType, CollectionSchema, Dialect, QueryParam};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

/// Collects parameters in encounter order and hands out placeholders.
#[derive(Debug)]
pub(crate) struct ParamList {
    dialect: Dialect,
    values: Vec<QueryParam>,
}

impl ParamList {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Record a parameter and return its placeholder.
    pub(crate) fn push(&mut self, value: QueryParam) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// Record a JSON value destined for a column of `attr_type`.
    ///
    /// Nulls and strings carry no column type of their own, so the dialect
    /// may cast their placeholder to the column's type.
    pub(crate) fn push_json(&mut self, value: &JsonValue, attr_type: AttributeType) -> String {
        let param = QueryParam::from_json(value);
        let cast = match param {
            QueryParam::Null | QueryParam::String(_) => self.dialect.parameter_cast(attr_type),
            _ => None,
        };
        let placeholder = self.push(param);
        match cast {
            Some(cast) => format!("{}::{}", placeholder, cast),
            None => placeholder,
        }
    }

    pub(crate) fn into_vec(self) -> Vec<QueryParam> {
        self.values
    }
}

/// Build the conjunction for a where map, or `None` if no key survives.
pub(crate) fn where_clause(
    dialect: Dialect,
    schema: &CollectionSchema,
    criteria: &Map<String, JsonValue>,
    params: &mut ParamList,
) -> DbResult<Option<String>> {
    let mut predicates = Vec::with_capacity(criteria.len());

    for (key, value) in criteria {
        let Some(definition) = schema.get(key) else {
            debug!(table = %schema.table_name, key = %key, "Dropping unknown where key");
            continue;
        };
        let quoted = dialect.quote_ident(key);
        let column = Column {
            key,
            sql: &quoted,
            attr_type: definition.attr_type,
        };
        predicates.push(predicate(&column, value, params)?);
    }

    if predicates.is_empty() {
        Ok(None)
    } else {
        Ok(Some(predicates.join(" AND ")))
    }
}

/// A where-map key resolved against the schema.
struct Column<'c> {
    key: &'c str,
    sql: &'c str,
    attr_type: AttributeType,
}

fn predicate(column: &Column<'_>, value: &JsonValue, params: &mut ParamList) -> DbResult<String> {
    match value {
        JsonValue::Null => Ok(format!("{} IS NULL", column.sql)),
        JsonValue::Array(items) => Ok(in_list(column, items, false, params)),
        JsonValue::Object(modifiers) => {
            if modifiers.is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Empty modifier object for '{}'",
                    column.key
                )));
            }
            let parts = modifiers
                .iter()
                .map(|(op, operand)| modifier(column, op, operand, params))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(parts.join(" AND "))
        }
        scalar => Ok(format!(
            "{} = {}",
            column.sql,
            params.push_json(scalar, column.attr_type)
        )),
    }
}

fn modifier(
    column: &Column<'_>,
    op: &str,
    operand: &JsonValue,
    params: &mut ParamList,
) -> DbResult<String> {
    let comparison = match op {
        "<" | "lessThan" => Some("<"),
        "<=" | "lessThanOrEqual" => Some("<="),
        ">" | "greaterThan" => Some(">"),
        ">=" | "greaterThanOrEqual" => Some(">="),
        _ => None,
    };
    if let Some(operator) = comparison {
        let operand = scalar_operand(column.key, op, operand)?;
        return Ok(format!(
            "{} {} {}",
            column.sql,
            operator,
            params.push_json(operand, column.attr_type)
        ));
    }

    match op {
        "!" | "not" => Ok(match operand {
            JsonValue::Null => format!("{} IS NOT NULL", column.sql),
            JsonValue::Array(items) => in_list(column, items, true, params),
            other => {
                let other = scalar_operand(column.key, op, other)?;
                format!(
                    "{} <> {}",
                    column.sql,
                    params.push_json(other, column.attr_type)
                )
            }
        }),
        "in" => match operand {
            JsonValue::Array(items) => Ok(in_list(column, items, false, params)),
            _ => Err(DbError::invalid_input(format!(
                "Modifier 'in' on '{}' expects an array",
                column.key
            ))),
        },
        "like" => {
            let pattern = pattern_operand(column.key, op, operand)?;
            Ok(format!(
                "{} LIKE {}",
                column.sql,
                params.push(QueryParam::String(pattern.to_string()))
            ))
        }
        "contains" | "startsWith" | "endsWith" => {
            let text = escape_like(pattern_operand(column.key, op, operand)?);
            let pattern = match op {
                "contains" => format!("%{}%", text),
                "startsWith" => format!("{}%", text),
                _ => format!("%{}", text),
            };
            Ok(format!(
                "{} LIKE {} ESCAPE '\\'",
                column.sql,
                params.push(QueryParam::String(pattern))
            ))
        }
        _ => Err(DbError::invalid_input(format!(
            "Unsupported modifier '{}' on '{}'",
            op, column.key
        ))),
    }
}

fn scalar_operand<'v>(key: &str, op: &str, operand: &'v JsonValue) -> DbResult<&'v JsonValue> {
    match operand {
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => Err(
            DbError::invalid_input(format!("Modifier '{}' on '{}' expects a scalar", op, key)),
        ),
        scalar => Ok(scalar),
    }
}

fn pattern_operand<'v>(key: &str, op: &str, operand: &'v JsonValue) -> DbResult<&'v str> {
    operand.as_str().ok_or_else(|| {
        DbError::invalid_input(format!("Modifier '{}' on '{}' expects a string", op, key))
    })
}

/// Escape LIKE wildcards (and the escape character) in literal text.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn in_list(
    column: &Column<'_>,
    items: &[JsonValue],
    negate: bool,
    params: &mut ParamList,
) -> String {
    if items.is_empty() {
        // IN () is not valid SQL; an empty set matches nothing
        return if negate { "1 = 1" } else { "1 = 0" }.to_string();
    }
    let placeholders: Vec<String> = items
        .iter()
        .map(|item| params.push_json(item, column.attr_type))
        .collect();
    let operator = if negate { "NOT IN" } else { "IN" };
    format!("{} {} ({})", column.sql, operator, placeholders.join(", "))
}

/// Build the ORDER BY list, or `None` if no key survives.
pub(crate) fn order_by(
    dialect: Dialect,
    schema: &CollectionSchema,
    sort: &Map<String, JsonValue>,
) -> DbResult<Option<String>> {
    let mut clauses = Vec::with_capacity(sort.len());

    for (key, direction) in sort {
        if !schema.contains(key) {
            debug!(table = %schema.table_name, key = %key, "Dropping unknown sort key");
            continue;
        }
        let direction = sort_direction(key, direction)?;
        clauses.push(format!("{} {}", dialect.quote_ident(key), direction));
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clauses.join(", ")))
    }
}

fn sort_direction(key: &str, direction: &JsonValue) -> DbResult<&'static str> {
    let parsed = match direction {
        JsonValue::Number(n) => match n.as_i64() {
            Some(1) => Some("ASC"),
            Some(-1) => Some("DESC"),
            _ => None,
        },
        JsonValue::String(s) if s.eq_ignore_ascii_case("asc") => Some("ASC"),
        JsonValue::String(s) if s.eq_ignore_ascii_case("desc") => Some("DESC"),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DbError::invalid_input(format!(
            "Invalid sort direction for '{}': {}",
            key, direction
        ))
    })
}
