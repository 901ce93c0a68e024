//! The entry point: a connection pool plus the descriptor registry.

use std::sync::Arc;

use sea_query::Value;

use crate::config::{DatabaseConfig, PoolConfig};
use crate::connection::PgManager;
use crate::descriptor::{Entity, EntityDescriptor, Registry};
use crate::error::TideError;
use crate::pool::{ConnectionManager, ConnectionPool};
use crate::row::Row;
use crate::session::Session;
use crate::transaction::run_in_transaction;

/// Mapping runtime over a pooled store.
///
/// Every operation is its own transaction on its own pooled connection; use
/// [`transaction`](Self::transaction) to group several operations.
///
/// ```no_run
/// use tideline::{Database, DatabaseConfig};
///
/// # fn main() -> Result<(), tideline::TideError> {
/// let db = Database::connect(&DatabaseConfig::load()?)?;
/// let rows = db.query_raw("SELECT 1 AS one", Vec::new())?;
/// assert_eq!(rows.len(), 1);
/// db.close();
/// # Ok(())
/// # }
/// ```
pub struct Database<M: ConnectionManager> {
    pool: ConnectionPool<M>,
    registry: Registry,
}

impl Database<PgManager> {
    /// Open a PostgreSQL-backed runtime and warm its pool up to `min_idle`.
    ///
    /// # Errors
    ///
    /// `Configuration` for an unusable connection string, `Resource` when
    /// the initial connections cannot be opened.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, TideError> {
        let manager = PgManager::from_config(config)?;
        let database = Self::new(manager, config.pool_config());
        database.pool.warm_up()?;
        log::info!(
            "database opened (pool max {}, min idle {})",
            database.pool.config().max_size,
            database.pool.config().min_idle
        );
        Ok(database)
    }
}

impl<M: ConnectionManager> Database<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            pool: ConnectionPool::new(manager, config),
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }

    pub fn descriptor<E: Entity>(&self) -> Result<Arc<EntityDescriptor>, TideError> {
        self.registry.resolve::<E>()
    }

    /// Run `work` in one transaction on one connection.
    ///
    /// The connection goes back to the pool afterwards, also when `work`
    /// fails or panics.
    pub fn transaction<T, F>(&self, work: F) -> Result<T, TideError>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T, TideError>,
    {
        let mut conn = self.pool.acquire()?;
        run_in_transaction(&mut *conn, |conn| {
            let mut session = Session::new(conn, &self.registry);
            work(&mut session)
        })
    }

    pub fn find_by_id<E: Entity>(&self, id: impl Into<Value>) -> Result<Option<E>, TideError> {
        self.transaction(|session| session.find_by_id::<E>(id))
    }

    pub fn find_all<E: Entity>(&self) -> Result<Vec<E>, TideError> {
        self.transaction(|session| session.find_all::<E>())
    }

    pub fn find_by<E: Entity>(&self, conditions: &[(&str, Value)]) -> Result<Vec<E>, TideError> {
        self.transaction(|session| session.find_by::<E>(conditions))
    }

    pub fn insert<E: Entity>(&self, entity: &mut E) -> Result<(), TideError> {
        self.transaction(|session| session.insert(entity))
    }

    pub fn update<E: Entity>(&self, entity: &mut E) -> Result<(), TideError> {
        self.transaction(|session| session.update(entity))
    }

    pub fn save<E: Entity>(&self, entity: &mut E) -> Result<(), TideError> {
        self.transaction(|session| session.save(entity))
    }

    pub fn delete<E: Entity>(&self, entity: &E) -> Result<bool, TideError> {
        self.transaction(|session| session.delete(entity))
    }

    pub fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, TideError> {
        self.transaction(|session| session.execute(sql, params))
    }

    pub fn query_as<E: Entity>(&self, sql: &str, params: Vec<Value>) -> Result<Vec<E>, TideError> {
        self.transaction(|session| session.query_as::<E>(sql, params))
    }

    pub fn query_raw(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, TideError> {
        self.transaction(|session| session.query_raw(sql, params))
    }

    pub fn load_relation<E: Entity>(&self, entity: &mut E, field: &str) -> Result<(), TideError> {
        self.transaction(|session| session.load_relation(entity, field))
    }

    /// Close the pool. Connections still on loan are closed when returned.
    pub fn close(&self) {
        self.pool.close();
        log::info!("database closed");
    }
}
