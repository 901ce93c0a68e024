//! Connection pooling.
//!
//! [`ConnectionPool`] bounds the number of open connections, hands them out as
//! [`PooledConnection`] guards and takes them back on drop. Connections come
//! from a [`ConnectionManager`]; [`crate::connection::PgManager`] is the
//! PostgreSQL one.

pub mod config;
pub mod manager;

pub use config::{DatabaseConfig, PoolConfig};
pub use manager::{ConnectionManager, ConnectionPool, PoolState, PooledConnection};
