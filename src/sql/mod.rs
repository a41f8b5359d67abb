//! SQL generation.
//!
//! - `builder`: per-collection statement builders
//! - `criteria`: WHERE / ORDER BY translation
//! - `dialect`: DB2 and PostgreSQL fragments

pub mod builder;
mod criteria;
pub mod dialect;

pub use builder::StatementBuilder;
pub use dialect::DEFAULT_STRING_LENGTH;
