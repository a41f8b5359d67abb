//! Bundled PostgreSQL driver on sqlx.
//!
//! Standalone handles wrap a `PgConnection`; pooled handles wrap a
//! `PoolConnection` from a `PgPool` that is created lazily on first acquire,
//! so registration stays free of I/O.

use crate::config::PoolOptions;
use crate::db::driver::{Driver, Handle, Pool};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Row};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// sqlx-backed PostgreSQL driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

impl PgDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn open(&self, connection_string: &str) -> DbResult<Box<dyn Handle>> {
        let conn = PgConnection::connect(connection_string)
            .await
            .map_err(connect_error)?;
        Ok(Box::new(PgHandle::Direct(conn)))
    }

    fn create_pool(&self, options: &PoolOptions) -> DbResult<Arc<dyn Pool>> {
        options.validate().map_err(DbError::configuration)?;
        Ok(Arc::new(LazyPgPool {
            options: options.clone(),
            pool: OnceCell::new(),
        }))
    }
}

/// A `PgPool` built on first acquire from the connection string.
struct LazyPgPool {
    options: PoolOptions,
    pool: OnceCell<PgPool>,
}

impl LazyPgPool {
    fn build(&self, connection_string: &str) -> DbResult<PgPool> {
        let opts = &self.options;
        PgPoolOptions::new()
            .min_connections(opts.min_connections_or_default())
            .max_connections(opts.max_connections_or_default())
            .acquire_timeout(Duration::from_secs(opts.acquire_timeout_or_default()))
            .idle_timeout(Some(Duration::from_secs(opts.idle_timeout_or_default())))
            .test_before_acquire(opts.test_before_acquire_or_default())
            .connect_lazy(connection_string)
            .map_err(connect_error)
    }
}

#[async_trait]
impl Pool for LazyPgPool {
    async fn acquire(&self, connection_string: &str) -> DbResult<Box<dyn Handle>> {
        let pool = self
            .pool
            .get_or_try_init(|| async { self.build(connection_string) })
            .await?;
        let conn = pool.acquire().await.map_err(connect_error)?;
        Ok(Box::new(PgHandle::Pooled(conn)))
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

enum PgHandle {
    Direct(PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl PgHandle {
    fn connection(&mut self) -> &mut PgConnection {
        match self {
            PgHandle::Direct(conn) => conn,
            PgHandle::Pooled(conn) => &mut **conn,
        }
    }
}

#[async_trait]
impl Handle for PgHandle {
    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        let conn = self.connection();
        let rows: Vec<PgRow> = if params.is_empty() {
            use sqlx::Executor;
            conn.fetch_all(sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch_all(&mut *conn).await?
        };
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        match *self {
            PgHandle::Direct(conn) => conn.close().await.map_err(DbError::from),
            PgHandle::Pooled(conn) => {
                // Dropping a pooled connection returns it to the pool
                drop(conn);
                debug!("Returned connection to pool");
                Ok(())
            }
        }
    }
}

fn bind_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
        QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

fn connect_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::Database(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            DbError::from(e)
        }
        other => DbError::connection(
            format!("Failed to connect: {}", other),
            "Check the host, port, database and credentials",
        ),
    }
}
