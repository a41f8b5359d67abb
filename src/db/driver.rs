//! Driver boundary.
//!
//! The adapter never speaks a wire protocol itself. A [`Driver`] opens
//! connections (or builds pools that hand them out), and a [`Handle`] runs
//! one statement at a time. Hosts that talk to DB2 inject their own driver;
//! [`crate::db::postgres::PgDriver`] ships with the crate.

use crate::config::PoolOptions;
use crate::error::DbResult;
use crate::models::{QueryParam, Row};
use async_trait::async_trait;
use std::sync::Arc;

/// A live connection, owned by exactly one operation at a time.
#[async_trait]
pub trait Handle: Send {
    /// Run one statement and return its rows (empty for statements that
    /// produce none).
    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>>;

    /// Close the connection, or hand it back to the pool it came from.
    async fn close(self: Box<Self>) -> DbResult<()>;
}

/// A pool of connections for one registered identity.
#[async_trait]
pub trait Pool: Send + Sync {
    async fn acquire(&self, connection_string: &str) -> DbResult<Box<dyn Handle>>;

    /// Close every pooled connection. Acquiring afterwards fails.
    async fn close(&self);
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a standalone connection.
    async fn open(&self, connection_string: &str) -> DbResult<Box<dyn Handle>>;

    /// Build a pool. Must not perform I/O; connections are made on first
    /// acquire.
    fn create_pool(&self, options: &PoolOptions) -> DbResult<Arc<dyn Pool>>;
}
