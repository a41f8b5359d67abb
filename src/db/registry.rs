//! Connection registry.
//!
//! Maps connection identities to their configuration, collection schemas
//! and optional pool. Entries are immutable snapshots behind `Arc`: a schema
//! change replaces the entry, and teardown removes it, without disturbing
//! operations that already hold the previous snapshot.

use crate::db::driver::{Driver, Pool};
use crate::error::{DbError, DbResult};
use crate::models::{CollectionSchema, ConnectionConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One registered connection.
pub struct RegistryEntry {
    config: ConnectionConfig,
    collections: HashMap<String, Arc<CollectionSchema>>,
    pool: Option<Arc<dyn Pool>>,
}

impl RegistryEntry {
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn pool(&self) -> Option<&Arc<dyn Pool>> {
        self.pool.as_ref()
    }

    /// Schema for a collection registered under this identity.
    pub fn collection(&self, name: &str) -> DbResult<Arc<CollectionSchema>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::unknown_collection(&self.config.identity, name))
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Copy of this entry with one collection schema replaced.
    fn with_collection(&self, name: &str, schema: CollectionSchema) -> Self {
        let mut collections = self.collections.clone();
        collections.insert(name.to_string(), Arc::new(schema));
        Self {
            config: self.config.clone(),
            collections,
            pool: self.pool.clone(),
        }
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("config", &self.config)
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

/// Registry of connections, owned by the caller and shared by reference.
#[derive(Clone)]
pub struct ConnectionRegistry {
    driver: Arc<dyn Driver>,
    entries: Arc<RwLock<HashMap<String, Arc<RegistryEntry>>>>,
}

impl ConnectionRegistry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Register a connection and its collections.
    ///
    /// No I/O happens here. An empty identity, a duplicate identity, an
    /// invalid identifier or invalid pool options are rejected, and a
    /// rejected registration leaves the registry unchanged.
    pub async fn register(
        &self,
        config: ConnectionConfig,
        collections: HashMap<String, CollectionSchema>,
    ) -> DbResult<()> {
        config.validate()?;
        let identity = config.identity.clone();

        // Early check for existing identity
        {
            let entries = self.entries.read().await;
            if entries.contains_key(&identity) {
                return Err(DbError::identity_duplicate(&identity));
            }
        }

        let collections = collections
            .into_iter()
            .map(|(name, schema)| {
                let schema = normalize_schema(&name, schema)?;
                Ok((name, Arc::new(schema)))
            })
            .collect::<DbResult<HashMap<_, _>>>()?;

        let pool = if config.use_pool {
            Some(self.driver.create_pool(&config.pool_options)?)
        } else {
            None
        };

        let collection_count = collections.len();
        let dialect = config.dialect;
        let pooled = pool.is_some();
        let entry = Arc::new(RegistryEntry {
            config,
            collections,
            pool,
        });

        // Re-check under the write lock; a losing pool is closed outside it
        let rejected: Option<Arc<RegistryEntry>> = {
            let mut entries = self.entries.write().await;
            if entries.contains_key(&identity) {
                Some(entry)
            } else {
                entries.insert(identity.clone(), entry);
                None
            }
        };

        if let Some(entry) = rejected {
            if let Some(pool) = entry.pool() {
                pool.close().await;
            }
            return Err(DbError::identity_duplicate(&identity));
        }

        info!(
            identity = %identity,
            dialect = %dialect,
            collections = collection_count,
            pooled,
            "Registered connection"
        );
        Ok(())
    }

    /// Current snapshot for an identity.
    pub async fn get(&self, identity: &str) -> DbResult<Arc<RegistryEntry>> {
        let entries = self.entries.read().await;
        entries
            .get(identity)
            .cloned()
            .ok_or_else(|| DbError::invalid_connection(identity))
    }

    /// Replace (or add) one collection's schema under an identity.
    pub async fn set_collection(
        &self,
        identity: &str,
        collection: &str,
        schema: CollectionSchema,
    ) -> DbResult<Arc<CollectionSchema>> {
        let schema = normalize_schema(collection, schema)?;
        let mut entries = self.entries.write().await;
        let current = entries
            .get(identity)
            .ok_or_else(|| DbError::invalid_connection(identity))?;

        let updated = Arc::new(current.with_collection(collection, schema));
        let stored = updated.collection(collection)?;
        entries.insert(identity.to_string(), updated);

        debug!(identity = %identity, collection = %collection, "Updated collection schema");
        Ok(stored)
    }

    /// Remove one identity, or every identity when `identity` is `None`.
    ///
    /// Pools are closed after the entries leave the map. Tearing down an
    /// identity that is not registered is a no-op.
    pub async fn teardown(&self, identity: Option<&str>) -> DbResult<()> {
        let removed: Vec<(String, Arc<RegistryEntry>)> = {
            let mut entries = self.entries.write().await;
            match identity {
                Some(id) => entries
                    .remove(id)
                    .map(|entry| vec![(id.to_string(), entry)])
                    .unwrap_or_default(),
                None => entries.drain().collect(),
            }
        };

        if removed.is_empty() {
            debug!(identity = ?identity, "Nothing to tear down");
        }

        for (id, entry) in removed {
            if let Some(pool) = entry.pool() {
                pool.close().await;
            }
            info!(identity = %id, "Connection torn down");
        }
        Ok(())
    }

    pub async fn identities(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    pub async fn contains(&self, identity: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry").finish_non_exhaustive()
    }
}

/// Fill an empty table name from the collection name and validate names.
fn normalize_schema(collection: &str, mut schema: CollectionSchema) -> DbResult<CollectionSchema> {
    if schema.table_name.is_empty() {
        schema.table_name = collection.to_string();
    }
    schema.validate()?;
    Ok(schema)
}
