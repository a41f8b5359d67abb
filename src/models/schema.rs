//! Collection schema models.
//!
//! A collection schema is what the ORM hands over at registration (or at
//! `define` time): the table name plus an ordered map of attribute
//! definitions. Described attributes are what `describe` reports back.

use crate::error::{DbError, DbResult};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Semantic attribute types understood by the ORM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    #[serde(alias = "serial")]
    Integer,
    Float,
    Text,
    Binary,
    #[serde(alias = "datetime")]
    Time,
    Date,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Time => "time",
            Self::Date => "date",
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a single attribute (column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl AttributeDefinition {
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            primary_key: false,
            auto_increment: false,
            unique: false,
            index: false,
            length: None,
        }
    }

    /// Auto-incrementing primary key.
    pub fn identity() -> Self {
        Self::new(AttributeType::Integer)
            .primary_key()
            .auto_increment()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Generated columns are never written by INSERT or UPDATE.
    pub fn is_generated(&self) -> bool {
        self.auto_increment
    }
}

/// Attributes accept the ORM shorthand `"name": "string"` as well as the
/// full object form.
impl<'de> Deserialize<'de> for AttributeDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Full {
            #[serde(rename = "type")]
            attr_type: AttributeType,
            #[serde(default)]
            primary_key: bool,
            #[serde(default)]
            auto_increment: bool,
            #[serde(default)]
            unique: bool,
            #[serde(default)]
            index: bool,
            #[serde(default, alias = "size")]
            length: Option<u32>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Form {
            Short(AttributeType),
            Full(Full),
        }

        Ok(match Form::deserialize(deserializer)? {
            Form::Short(attr_type) => AttributeDefinition::new(attr_type),
            Form::Full(full) => AttributeDefinition {
                attr_type: full.attr_type,
                primary_key: full.primary_key,
                auto_increment: full.auto_increment,
                unique: full.unique,
                index: full.index,
                length: full.length,
            },
        })
    }
}

/// Ordered attribute map; column order follows declaration order.
pub type Attributes = IndexMap<String, AttributeDefinition>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Falls back to the collection name when left empty
    #[serde(default)]
    pub table_name: String,
    pub attributes: Attributes,
}

impl CollectionSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn from_attributes(table_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            table_name: table_name.into(),
            attributes,
        }
    }

    /// Add an attribute (builder style).
    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.insert(name.into(), definition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Reject table or attribute names that cannot be spliced into SQL text.
    pub fn validate(&self) -> DbResult<()> {
        validate_identifier(&self.table_name)?;
        for name in self.attributes.keys() {
            validate_identifier(name)?;
        }
        Ok(())
    }
}

/// Identifiers are concatenated into statements, so only plain SQL names are
/// accepted: `[A-Za-z_][A-Za-z0-9_]*`, at most 128 characters.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 128 {
        Ok(())
    } else {
        Err(DbError::invalid_identifier(name))
    }
}

/// An attribute as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribedAttribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Backend type name as reported by the catalog
    pub native_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// Result of `describe`: attribute name to described attribute.
pub type DescribedSchema = IndexMap<String, DescribedAttribute>;
