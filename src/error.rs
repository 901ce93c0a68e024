//! Error types for tideline operations.
//!
//! Every public operation returns [`TideError`]. The four variants follow the
//! runtime's failure taxonomy:
//!
//! - `Configuration` - an entity binding is incomplete or references something
//!   that does not exist. Never retried; the operation was never attempted.
//! - `Validation` - a statement builder received malformed input.
//! - `Execution` - the store failed while preparing, executing, fetching,
//!   committing or rolling back. Always carries the original cause when one
//!   exists.
//! - `Resource` - a connection could not be obtained from the pool.

use std::error::Error as StdError;
use std::fmt;

/// Boxed cause carried by [`TideError::Execution`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error type for all tideline operations
#[derive(Debug)]
pub enum TideError {
    /// Missing or unresolvable entity/relation binding
    Configuration(String),
    /// Malformed builder input (e.g. empty column-value set)
    Validation(String),
    /// Store failure, wrapping the original cause
    Execution {
        message: String,
        source: Option<BoxError>,
    },
    /// Connection pool acquisition failure or timeout
    Resource(String),
}

impl TideError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TideError::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TideError::Validation(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        TideError::Resource(message.into())
    }

    /// Execution error without an underlying cause
    pub fn execution(message: impl Into<String>) -> Self {
        TideError::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Execution error wrapping `cause`
    pub fn execution_caused_by<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        TideError::Execution {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, TideError::Configuration(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TideError::Validation(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, TideError::Execution { .. })
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, TideError::Resource(_))
    }

    /// Whether the error means the operation was never attempted against the store.
    ///
    /// Such errors propagate out of a transaction unchanged instead of being
    /// wrapped as `Execution`.
    pub(crate) fn is_precondition(&self) -> bool {
        self.is_configuration() || self.is_validation()
    }

    /// Walk the `source()` chain down to the innermost cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

impl fmt::Display for TideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TideError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            TideError::Validation(msg) => write!(f, "Validation error: {msg}"),
            TideError::Execution { message, source } => match source {
                Some(cause) => write!(f, "Execution error: {message}: {cause}"),
                None => write!(f, "Execution error: {message}"),
            },
            TideError::Resource(msg) => write!(f, "Resource error: {msg}"),
        }
    }
}

impl StdError for TideError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TideError::Execution {
                source: Some(cause),
                ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for TideError {
    fn from(err: config::ConfigError) -> Self {
        TideError::Configuration(err.to_string())
    }
}

impl From<may_postgres::Error> for TideError {
    fn from(err: may_postgres::Error) -> Self {
        TideError::execution_caused_by("PostgreSQL error", err)
    }
}
