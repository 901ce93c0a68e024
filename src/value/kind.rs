//! Declared field kinds.
//!
//! A column binding records the kind of the Rust field it maps to, so raw
//! store values can be coerced to that shape before the field is written.

use std::fmt;

/// Shape of a bound field, as seen by the read-side converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Bytes,
    Json,
    Uuid,
    /// Calendar date without time
    Date,
    /// Time of day without date
    Time,
    /// Timestamp without zone
    DateTime,
    /// Timestamp normalized to UTC
    DateTimeUtc,
    /// Enumeration stored by name (or read back by ordinal)
    Enum,
}

impl ValueKind {
    pub fn is_integer(self) -> bool {
        matches!(self, ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt)
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ValueKind::Date | ValueKind::Time | ValueKind::DateTime | ValueKind::DateTimeUtc
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::SmallInt => "smallint",
            ValueKind::Int => "int",
            ValueKind::BigInt => "bigint",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Json => "json",
            ValueKind::Uuid => "uuid",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::DateTime => "datetime",
            ValueKind::DateTimeUtc => "datetime (utc)",
            ValueKind::Enum => "enum",
        };
        f.write_str(name)
    }
}
