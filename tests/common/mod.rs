//! In-memory driver used by the integration tests.
//!
//! The stub records every statement, counts acquisitions and releases, and
//! answers queries from a queue of canned responses. With nothing queued it
//! echoes the statement's parameters back as a single row under `params`.

#![allow(dead_code)]

use async_trait::async_trait;
use sails_db2::config::PoolOptions;
use sails_db2::db::{Driver, Handle, Pool};
use sails_db2::error::{DbError, DbResult};
use sails_db2::models::{
    AttributeDefinition, AttributeType, CollectionSchema, ConnectionConfig, Dialect, QueryParam,
    Row,
};
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct StubState {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub pools_created: AtomicUsize,
    pub pools_closed: AtomicUsize,
    pub fail_acquire: AtomicBool,
    pub fail_close: AtomicBool,
    pub connection_strings: Mutex<Vec<String>>,
    pub statements: Mutex<Vec<(String, Vec<QueryParam>)>>,
    responses: Mutex<VecDeque<DbResult<Vec<Row>>>>,
}

impl StubState {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<(String, Vec<QueryParam>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    /// Queue the result of the next statement.
    pub fn respond(&self, response: DbResult<Vec<Row>>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn respond_rows(&self, rows: JsonValue) {
        self.respond(Ok(serde_json::from_value(rows).unwrap()));
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    fn next_response(&self, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        let echoed: Vec<JsonValue> = params.iter().map(QueryParam::to_json).collect();
        let mut row = Row::new();
        row.insert("params".to_string(), JsonValue::Array(echoed));
        Ok(vec![row])
    }
}

fn open_handle(state: &Arc<StubState>, connection_string: &str) -> DbResult<Box<dyn Handle>> {
    if state.fail_acquire.load(Ordering::SeqCst) {
        return Err(DbError::connection(
            "SQL30081N A communication error has been detected",
            "Check the host and port",
        ));
    }
    state
        .connection_strings
        .lock()
        .unwrap()
        .push(connection_string.to_string());
    state.acquired.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(StubHandle {
        state: Arc::clone(state),
    }))
}

#[derive(Clone, Default)]
pub struct StubDriver {
    pub state: Arc<StubState>,
}

impl StubDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for StubDriver {
    async fn open(&self, connection_string: &str) -> DbResult<Box<dyn Handle>> {
        open_handle(&self.state, connection_string)
    }

    fn create_pool(&self, _options: &PoolOptions) -> DbResult<Arc<dyn Pool>> {
        self.state.pools_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubPool {
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubPool {
    state: Arc<StubState>,
}

#[async_trait]
impl Pool for StubPool {
    async fn acquire(&self, connection_string: &str) -> DbResult<Box<dyn Handle>> {
        open_handle(&self.state, connection_string)
    }

    async fn close(&self) {
        self.state.pools_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct StubHandle {
    state: Arc<StubState>,
}

#[async_trait]
impl Handle for StubHandle {
    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.state.next_response(params)
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(DbError::connection(
                "SQL30081N A communication error has been detected",
                "Check the host and port",
            ));
        }
        Ok(())
    }
}

pub fn person_schema() -> CollectionSchema {
    CollectionSchema::new("person")
        .attribute("id", AttributeDefinition::identity())
        .attribute("name", AttributeDefinition::new(AttributeType::String))
        .attribute("age", AttributeDefinition::new(AttributeType::Integer))
}

pub fn collections() -> HashMap<String, CollectionSchema> {
    HashMap::from([("person".to_string(), person_schema())])
}

pub fn db2_config(identity: &str) -> ConnectionConfig {
    ConnectionConfig::new(identity, Dialect::Db2, "SAMPLE", "db2inst1", "s3cret")
        .with_host("db2.local")
}

pub fn object(value: JsonValue) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

/// A DB2 "undefined name" failure.
pub fn undefined_object() -> DbError {
    DbError::database(
        "SQL0204N \"DB2INST1.GHOST\" is an undefined name.",
        Some("42704".to_string()),
        Some(-204),
    )
}

pub fn echoed(values: &[JsonValue]) -> Vec<Row> {
    vec![object(json!({ "params": values }))]
}
