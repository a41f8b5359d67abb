//! The ORM-facing operation set.
//!
//! [`Adapter`] is what an ORM runtime calls. [`SqlAdapter`] implements it for
//! every registered connection: it looks up the collection schema, builds
//! the statement, acquires a handle for the identity, runs the statement and
//! releases the handle.

use crate::db::driver::Driver;
use crate::db::executor;
use crate::db::provision::Provisioner;
use crate::db::registry::{ConnectionRegistry, RegistryEntry};
use crate::db::schema::SchemaInspector;
use crate::error::{DbError, DbResult};
use crate::models::{
    AttributeDefinition, Attributes, CollectionSchema, ConnectionConfig, DescribedSchema,
    FindOptions, QueryParam, QueryPlan, Row,
};
use crate::sql::StatementBuilder;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Operations an ORM runtime performs against a registered connection.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Register a connection and the collections that live on it.
    async fn register_connection(
        &self,
        config: ConnectionConfig,
        collections: HashMap<String, CollectionSchema>,
    ) -> DbResult<()>;

    /// Tear down one identity, or all of them.
    async fn teardown(&self, identity: Option<&str>) -> DbResult<()>;

    /// Describe a collection's table; `None` when the table does not exist.
    async fn describe(&self, identity: &str, collection: &str)
    -> DbResult<Option<DescribedSchema>>;

    /// Create the table (and its indexes) and return its description.
    async fn define(
        &self,
        identity: &str,
        collection: &str,
        attributes: Attributes,
    ) -> DbResult<Option<DescribedSchema>>;

    /// Drop the collection's table and the listed relation tables.
    async fn drop(&self, identity: &str, collection: &str, relations: &[String]) -> DbResult<()>;

    async fn find(&self, identity: &str, collection: &str, options: FindOptions)
    -> DbResult<Vec<Row>>;

    async fn create(&self, identity: &str, collection: &str, values: Row) -> DbResult<Row>;

    async fn create_each(
        &self,
        identity: &str,
        collection: &str,
        records: Vec<Row>,
    ) -> DbResult<Vec<Row>>;

    async fn update(
        &self,
        identity: &str,
        collection: &str,
        options: FindOptions,
        values: Row,
    ) -> DbResult<Vec<Row>>;

    async fn destroy(
        &self,
        identity: &str,
        collection: &str,
        options: FindOptions,
    ) -> DbResult<Vec<Row>>;

    /// Run caller-supplied SQL as-is.
    async fn query(&self, identity: &str, sql: &str, params: Vec<QueryParam>)
    -> DbResult<Vec<Row>>;

    async fn add_attribute(
        &self,
        identity: &str,
        collection: &str,
        name: &str,
        definition: AttributeDefinition,
    ) -> DbResult<()>;

    async fn remove_attribute(&self, identity: &str, collection: &str, name: &str)
    -> DbResult<()>;
}

/// SQL adapter over an injected [`Driver`].
#[derive(Debug, Clone)]
pub struct SqlAdapter {
    provisioner: Provisioner,
}

impl SqlAdapter {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_registry(ConnectionRegistry::new(driver))
    }

    pub fn with_registry(registry: ConnectionRegistry) -> Self {
        Self {
            provisioner: Provisioner::new(registry),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.provisioner.registry()
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Registry snapshot and collection schema for one call.
    async fn lookup(
        &self,
        identity: &str,
        collection: &str,
    ) -> DbResult<(Arc<RegistryEntry>, Arc<CollectionSchema>)> {
        let entry = self.registry().get(identity).await?;
        let schema = entry.collection(collection)?;
        Ok((entry, schema))
    }

    /// Run one plan on a freshly acquired handle.
    async fn run_plan(&self, identity: &str, plan: QueryPlan) -> DbResult<Vec<Row>> {
        self.provisioner
            .with_connection(identity, move |handle| {
                Box::pin(async move { executor::run(handle, &plan).await })
            })
            .await
    }
}

#[async_trait]
impl Adapter for SqlAdapter {
    async fn register_connection(
        &self,
        config: ConnectionConfig,
        collections: HashMap<String, CollectionSchema>,
    ) -> DbResult<()> {
        self.registry().register(config, collections).await
    }

    async fn teardown(&self, identity: Option<&str>) -> DbResult<()> {
        self.registry().teardown(identity).await
    }

    async fn describe(
        &self,
        identity: &str,
        collection: &str,
    ) -> DbResult<Option<DescribedSchema>> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let dialect = entry.config().dialect;
        debug!(identity = %identity, collection = %collection, "describe");

        self.provisioner
            .with_connection(identity, move |handle| {
                Box::pin(async move { SchemaInspector::new(dialect, &schema).describe(handle).await })
            })
            .await
    }

    async fn define(
        &self,
        identity: &str,
        collection: &str,
        attributes: Attributes,
    ) -> DbResult<Option<DescribedSchema>> {
        let entry = self.registry().get(identity).await?;
        let dialect = entry.config().dialect;
        let table_name = entry
            .collection(collection)
            .map(|existing| existing.table_name.clone())
            .unwrap_or_else(|_| collection.to_string());

        let schema = Arc::new(CollectionSchema::from_attributes(table_name, attributes));
        let builder = StatementBuilder::new(dialect, &schema);
        let create = builder.create_table()?;
        let indexes = builder.create_indexes();
        debug!(
            identity = %identity,
            collection = %collection,
            indexes = indexes.len(),
            "define"
        );

        let target = Arc::clone(&schema);
        let described = self
            .provisioner
            .with_connection(identity, move |handle| {
                Box::pin(async move {
                    executor::run(handle, &create).await?;
                    for plan in &indexes {
                        executor::run(handle, plan).await?;
                    }
                    SchemaInspector::new(dialect, &target).describe(handle).await
                })
            })
            .await?;

        self.registry()
            .set_collection(identity, collection, Arc::unwrap_or_clone(schema))
            .await?;
        info!(identity = %identity, collection = %collection, "Defined collection");
        Ok(described)
    }

    async fn drop(&self, identity: &str, collection: &str, relations: &[String]) -> DbResult<()> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let dialect = entry.config().dialect;

        let mut plans = relations
            .iter()
            .map(|relation| {
                let relation = CollectionSchema::new(relation.as_str());
                StatementBuilder::new(dialect, &relation).drop_table()
            })
            .collect::<DbResult<Vec<_>>>()?;
        plans.push(StatementBuilder::new(dialect, &schema).drop_table()?);
        debug!(identity = %identity, collection = %collection, tables = plans.len(), "drop");

        self.provisioner
            .with_connection(identity, move |handle| {
                Box::pin(async move {
                    for plan in &plans {
                        if executor::run_allow_missing(handle, plan).await?.is_none() {
                            debug!(sql = %plan.sql, "Table already absent");
                        }
                    }
                    Ok::<_, DbError>(())
                })
            })
            .await
    }

    async fn find(
        &self,
        identity: &str,
        collection: &str,
        options: FindOptions,
    ) -> DbResult<Vec<Row>> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan = StatementBuilder::new(entry.config().dialect, &schema).select(&options)?;
        self.run_plan(identity, plan).await
    }

    /// Returns the stored row, or the submitted values when the driver
    /// reports no row.
    async fn create(&self, identity: &str, collection: &str, values: Row) -> DbResult<Row> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan = StatementBuilder::new(entry.config().dialect, &schema).insert(&values)?;
        let rows = self.run_plan(identity, plan).await?;
        Ok(rows.into_iter().next().unwrap_or(values))
    }

    /// Inserts every record on one handle. Stops at the first failure.
    async fn create_each(
        &self,
        identity: &str,
        collection: &str,
        records: Vec<Row>,
    ) -> DbResult<Vec<Row>> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let builder = StatementBuilder::new(entry.config().dialect, &schema);
        let plans = records
            .iter()
            .map(|record| builder.insert(record))
            .collect::<DbResult<Vec<_>>>()?;
        debug!(identity = %identity, collection = %collection, records = plans.len(), "createEach");

        self.provisioner
            .with_connection(identity, move |handle| {
                Box::pin(async move {
                    let mut created = Vec::with_capacity(plans.len());
                    for (plan, record) in plans.iter().zip(records) {
                        let rows = executor::run(handle, plan).await?;
                        created.push(rows.into_iter().next().unwrap_or(record));
                    }
                    Ok::<_, DbError>(created)
                })
            })
            .await
    }

    async fn update(
        &self,
        identity: &str,
        collection: &str,
        options: FindOptions,
        values: Row,
    ) -> DbResult<Vec<Row>> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan = StatementBuilder::new(entry.config().dialect, &schema)
            .update(&options.where_clause, &values)?;
        self.run_plan(identity, plan).await
    }

    async fn destroy(
        &self,
        identity: &str,
        collection: &str,
        options: FindOptions,
    ) -> DbResult<Vec<Row>> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan =
            StatementBuilder::new(entry.config().dialect, &schema).delete(&options.where_clause)?;
        self.run_plan(identity, plan).await
    }

    async fn query(
        &self,
        identity: &str,
        sql: &str,
        params: Vec<QueryParam>,
    ) -> DbResult<Vec<Row>> {
        if sql.trim().is_empty() {
            return Err(DbError::invalid_input("SQL query cannot be empty"));
        }
        self.run_plan(identity, QueryPlan::with_params(sql, params))
            .await
    }

    async fn add_attribute(
        &self,
        identity: &str,
        collection: &str,
        name: &str,
        definition: AttributeDefinition,
    ) -> DbResult<()> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan =
            StatementBuilder::new(entry.config().dialect, &schema).add_column(name, &definition)?;
        self.run_plan(identity, plan).await?;

        let updated = Arc::unwrap_or_clone(schema).attribute(name, definition);
        self.registry()
            .set_collection(identity, collection, updated)
            .await?;
        info!(identity = %identity, collection = %collection, attribute = %name, "Added attribute");
        Ok(())
    }

    async fn remove_attribute(
        &self,
        identity: &str,
        collection: &str,
        name: &str,
    ) -> DbResult<()> {
        let (entry, schema) = self.lookup(identity, collection).await?;
        let plan = StatementBuilder::new(entry.config().dialect, &schema).drop_column(name)?;
        self.run_plan(identity, plan).await?;

        let mut updated = Arc::unwrap_or_clone(schema);
        updated.attributes.shift_remove(name);
        self.registry()
            .set_collection(identity, collection, updated)
            .await?;
        info!(identity = %identity, collection = %collection, attribute = %name, "Removed attribute");
        Ok(())
    }
}
