//! Database access layer.
//!
//! This module provides:
//! - The driver boundary (`Driver`, `Pool`, `Handle`)
//! - The connection registry and scoped acquisition
//! - Statement execution
//! - Schema introspection and type mappings
//! - The bundled sqlx PostgreSQL driver

pub mod driver;
pub mod executor;
pub mod postgres;
pub mod provision;
pub mod registry;
pub mod schema;
pub mod types;

pub use driver::{Driver, Handle, Pool};
pub use postgres::PgDriver;
pub use provision::{ConnectionGuard, Provisioner};
pub use registry::{ConnectionRegistry, RegistryEntry};
pub use schema::SchemaInspector;
