//! Scripted in-memory store for unit tests.
//!
//! Responses are queued against a SQL fragment; a statement consumes the
//! first queued response whose fragment it contains. Unmatched queries return
//! no rows and unmatched mutations report one affected row.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use sea_query::Value;

use crate::database::Database;
use crate::error::TideError;
use crate::executor::{Connection, Executor};
use crate::pool::{ConnectionManager, PoolConfig};
use crate::row::{Cursor, Row};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Statement(String),
    AutoCommit(bool),
    Commit,
    Rollback,
}

#[derive(Default)]
struct StoreState {
    script: VecDeque<(String, MockResponse)>,
    statements: Vec<(String, Vec<Value>)>,
    events: Vec<MockEvent>,
    fail_commit: bool,
    refuse_connections: bool,
    connects: usize,
}

/// Shared state behind every connection a [`MockManager`] opens
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `response` for the next statement containing `fragment`.
    pub fn respond(&self, fragment: &str, response: MockResponse) -> &Self {
        self.lock().script.push_back((fragment.to_string(), response));
        self
    }

    pub fn respond_rows(&self, fragment: &str, rows: Vec<Row>) -> &Self {
        self.respond(fragment, MockResponse::Rows(rows))
    }

    pub fn fail_on(&self, fragment: &str) -> &Self {
        self.respond(fragment, MockResponse::Fail(format!("scripted failure on `{fragment}`")))
    }

    pub fn fail_commit(&self) {
        self.lock().fail_commit = true;
    }

    pub fn refuse_connections(&self) {
        self.lock().refuse_connections = true;
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }

    /// SQL text of every statement, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Statements with their bound parameters
    pub fn statements_with_params(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().statements.clone()
    }

    pub fn manager(&self) -> MockManager {
        MockManager { store: self.clone() }
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection {
            store: self.clone(),
            auto_commit: true,
        }
    }

    /// A database over this store with a single pooled connection
    pub fn database(&self) -> Database<MockManager> {
        let config = PoolConfig {
            max_size: 1,
            min_idle: 0,
            ..PoolConfig::default()
        };
        Database::new(self.manager(), config)
    }

    fn record(&self, sql: &str, params: &[Value]) -> Option<MockResponse> {
        let mut state = self.lock();
        state.statements.push((sql.to_string(), params.to_vec()));
        state.events.push(MockEvent::Statement(sql.to_string()));
        let position = state
            .script
            .iter()
            .position(|(fragment, _)| sql.contains(fragment.as_str()));
        position
            .and_then(|idx| state.script.remove(idx))
            .map(|(_, response)| response)
    }
}

pub struct MockConnection {
    store: MockStore,
    auto_commit: bool,
}

impl Executor for MockConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, TideError> {
        match self.store.record(sql, params) {
            None => Ok(1),
            Some(MockResponse::Affected(count)) => Ok(count),
            Some(MockResponse::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockResponse::Fail(message)) => Err(TideError::execution(message)),
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, TideError> {
        match self.store.record(sql, params) {
            None | Some(MockResponse::Affected(_)) => Ok(Cursor::empty()),
            Some(MockResponse::Rows(rows)) => Ok(Cursor::new(rows)),
            Some(MockResponse::Fail(message)) => Err(TideError::execution(message)),
        }
    }
}

impl Connection for MockConnection {
    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), TideError> {
        self.store.lock().events.push(MockEvent::AutoCommit(enabled));
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TideError> {
        let mut state = self.store.lock();
        if state.fail_commit {
            return Err(TideError::execution("scripted commit failure"));
        }
        state.events.push(MockEvent::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), TideError> {
        self.store.lock().events.push(MockEvent::Rollback);
        Ok(())
    }

    fn is_valid(&mut self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct MockManager {
    store: MockStore,
}

impl ConnectionManager for MockManager {
    type Connection = MockConnection;

    fn connect(&self) -> Result<MockConnection, TideError> {
        let mut state = self.store.lock();
        if state.refuse_connections {
            return Err(TideError::execution("connection refused"));
        }
        state.connects += 1;
        drop(state);
        Ok(self.store.connection())
    }
}

/// Row with an `id` column followed by `columns`
pub fn row_with_id(id: i64, columns: &[(&str, Value)]) -> Row {
    let mut row = Row::with_capacity(columns.len() + 1);
    row.push("id", Value::BigInt(Some(id)));
    for (column, value) in columns {
        row.push(*column, value.clone());
    }
    row
}
