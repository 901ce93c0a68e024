//! Value type system for tideline
//!
//! `sea_query::Value` is the currency for parameters and row data. This module
//! adds the pieces the mapping runtime needs around it:
//!
//! - **`FieldValue`** - conversion between entity fields and values
//! - **`DbEnum`** - enumerations stored by name, read by name or ordinal
//! - **`ValueKind`** - declared field shapes driving read-side coercion
//! - conversion helpers for both directions (`convert`) and the PostgreSQL
//!   parameter/row adapters (`postgres`)

pub mod convert;
pub mod enums;
pub mod kind;
pub(crate) mod postgres;
pub mod types;

pub use convert::{coerce_for_bind, coerce_for_read, is_null};
pub use enums::{enum_from_value, DbEnum};
pub use kind::ValueKind;
pub use types::FieldValue;
