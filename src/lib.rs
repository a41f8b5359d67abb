//! Waterline-style ORM adapter for IBM DB2.
//!
//! The adapter translates the ORM's normalized operations (find, create,
//! update, destroy, describe, define, ...) into parameterized SQL, runs them
//! on a connection acquired for the call, and returns the rows. A legacy
//! PostgreSQL dialect is kept alongside DB2, and a sqlx-based PostgreSQL
//! driver is bundled; DB2 hosts supply their own [`db::Driver`].

pub mod adapter;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sql;

pub use adapter::{Adapter, SqlAdapter};
pub use config::Config;
pub use error::{DbError, DbResult};
