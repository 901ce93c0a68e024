//! Executor and connection traits.
//!
//! Everything above the pool talks to the store through these two traits:
//! [`Executor`] runs parameterized SQL, [`Connection`] adds the
//! transaction-mode controls the coordinator needs. The PostgreSQL adapter
//! lives in [`crate::connection`]; tests script an in-memory implementation.

use sea_query::Value;

use crate::error::TideError;
use crate::row::Cursor;

/// Runs parameterized SQL.
///
/// Placeholders are `$1..$n`, matched positionally against `params`.
pub trait Executor {
    /// Execute a statement and return the affected row count.
    ///
    /// # Errors
    ///
    /// Returns `TideError::Execution` wrapping the driver error when the
    /// statement fails.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, TideError>;

    /// Execute a query and return its rows.
    ///
    /// # Errors
    ///
    /// Returns `TideError::Execution` wrapping the driver error when the
    /// query fails.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Cursor, TideError>;
}

/// A single store connection with explicit transaction control.
///
/// With auto-commit on, every statement is its own transaction. With it off,
/// statements accumulate until [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
pub trait Connection: Executor + Send {
    fn auto_commit(&self) -> bool;

    /// Switch auto-commit. Turning it back on commits any open transaction.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), TideError>;

    fn commit(&mut self) -> Result<(), TideError>;

    fn rollback(&mut self) -> Result<(), TideError>;

    /// Cheap liveness probe used by the pool before handing out a
    /// long-idle connection.
    fn is_valid(&mut self) -> bool {
        self.query("SELECT 1", &[]).is_ok()
    }
}
