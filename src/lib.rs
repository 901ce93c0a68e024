//! # Tideline
//!
//! Descriptor-driven relational mapping for PostgreSQL.
//!
//! Entity types describe their table, columns and relations once through
//! [`Entity::describe`]. From those descriptors the runtime builds
//! parameterized statements, runs them in transactions on pooled
//! connections, hydrates rows back into typed values and follows declared
//! relations (eager or lazy, with cascading saves and orphan-removing
//! deletes).
//!
//! ```rust,ignore
//! use tideline::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Customer {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! impl Entity for Customer {
//!     fn describe(def: &mut EntityDef<Self>) {
//!         def.table("customers");
//!         def.id("id", |c| &c.id, |c| &mut c.id).generated();
//!         def.column("name", |c| &c.name, |c| &mut c.name);
//!     }
//! }
//!
//! let db = Database::connect(&DatabaseConfig::load()?)?;
//! let mut customer = Customer { id: None, name: "Ada".into() };
//! db.save(&mut customer)?;
//! let found: Option<Customer> = db.find_by_id(customer.id)?;
//! ```

pub mod config;
pub mod connection;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod metrics;
pub mod pool;
pub mod query;
mod relation;
pub mod row;
pub mod session;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests_cfg;

pub use sea_query;
pub use sea_query::Value;

pub use config::{DatabaseConfig, PoolConfig};
pub use connection::{PgConnection, PgManager};
pub use database::Database;
pub use descriptor::{Entity, EntityDef, EntityDescriptor, Registry};
pub use error::TideError;
pub use executor::{Connection, Executor};
pub use row::{Cursor, Row};
pub use session::Session;
pub use transaction::run_in_transaction;

pub mod prelude {
    pub use crate::descriptor::{Entity, EntityDef};
    pub use crate::value::{DbEnum, FieldValue};
    pub use crate::{Database, DatabaseConfig, Row, Session, TideError, Value};
}
