//! Data models for the adapter.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, Dialect};
pub use query::{FindOptions, QueryParam, QueryPlan, Row};
pub use schema::{
    AttributeDefinition, AttributeType, Attributes, CollectionSchema, DescribedAttribute,
    DescribedSchema, validate_identifier,
};
