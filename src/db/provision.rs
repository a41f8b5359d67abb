//! Scoped connection acquisition.
//!
//! Every adapter operation runs against a handle acquired here and released
//! exactly once afterwards, whether the operation succeeded or failed.
//! [`ConnectionGuard`] owns the handle; its explicit [`ConnectionGuard::release`]
//! is the normal path and its `Drop` covers panics and cancelled futures.

use crate::db::driver::Handle;
use crate::db::registry::{ConnectionRegistry, RegistryEntry};
use crate::error::{DbError, DbResult};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Acquires handles for registered identities.
#[derive(Debug, Clone)]
pub struct Provisioner {
    registry: ConnectionRegistry,
}

impl Provisioner {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Acquire a guarded handle for `identity`.
    ///
    /// Uses the identity's pool when it has one, otherwise opens a fresh
    /// connection through the driver.
    pub async fn acquire(&self, identity: &str) -> DbResult<ConnectionGuard> {
        let entry = self.registry.get(identity).await?;
        let connection_string = entry.config().connection_string()?;
        let start = Instant::now();

        let handle = match entry.pool() {
            Some(pool) => pool.acquire(&connection_string).await?,
            None => self.registry.driver().open(&connection_string).await?,
        };

        debug!(
            identity = %identity,
            pooled = entry.pool().is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Acquired connection"
        );
        Ok(ConnectionGuard::new(handle, entry))
    }

    /// Run `operation` with a handle for `identity`, releasing it afterwards.
    ///
    /// If acquisition fails the operation is never run. A release failure
    /// after a successful operation is reported; after a failed operation
    /// the operation's error wins.
    pub async fn with_connection<T, F>(&self, identity: &str, operation: F) -> DbResult<T>
    where
        T: Send,
        F: for<'h> FnOnce(&'h mut dyn Handle) -> BoxFuture<'h, DbResult<T>> + Send,
    {
        let mut guard = self.acquire(identity).await?;
        let result = match guard.handle_mut() {
            Ok(handle) => operation(handle).await,
            Err(e) => Err(e),
        };
        let released = guard.release().await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(
                    identity = %identity,
                    error = %release_err,
                    "Failed to release connection after failed operation"
                );
                Err(e)
            }
        }
    }
}

/// RAII guard around an acquired handle.
pub struct ConnectionGuard {
    handle: Option<Box<dyn Handle>>,
    entry: Arc<RegistryEntry>,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("identity", &self.entry.config().identity)
            .field("released", &self.handle.is_none())
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    fn new(handle: Box<dyn Handle>, entry: Arc<RegistryEntry>) -> Self {
        Self {
            handle: Some(handle),
            entry,
        }
    }

    pub fn identity(&self) -> &str {
        &self.entry.config().identity
    }

    /// Registry snapshot the handle was acquired from.
    pub fn entry(&self) -> &Arc<RegistryEntry> {
        &self.entry
    }

    pub fn handle_mut(&mut self) -> DbResult<&mut (dyn Handle + 'static)> {
        self.handle
            .as_deref_mut()
            .ok_or_else(|| DbError::internal("Connection already released"))
    }

    /// Explicitly release the handle (preferred over relying on Drop).
    pub async fn release(mut self) -> DbResult<()> {
        match self.handle.take() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let identity = self.entry.config().identity.clone();
        warn!(
            identity = %identity,
            "Connection released via Drop - consider using explicit release()"
        );

        // Dropped outside a runtime: the handle's own Drop is all that is left
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(identity = %identity, "No runtime to close the connection on");
            return;
        };

        runtime.spawn(async move {
            if let Err(e) = handle.close().await {
                error!(identity = %identity, error = %e, "Failed to close dropped connection");
            }
        });
    }
}
