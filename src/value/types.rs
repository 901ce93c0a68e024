//! `FieldValue` trait for entity field conversions
//!
//! Every type that can back a column binding implements `FieldValue`. It maps
//! the Rust field to its `sea_query::Value` variant and back, and declares the
//! [`ValueKind`] used by the read-side converter.
//!
//! Implemented for:
//!
//! - Integers: `i16`, `i32`, `i64`
//! - Floating point: `f32`, `f64`
//! - `bool`, `String`, `Vec<u8>`
//! - `rust_decimal::Decimal`, `uuid::Uuid`, `serde_json::Value`
//! - `chrono::NaiveDate`, `NaiveTime`, `NaiveDateTime`, `DateTime<Utc>`
//! - `Option<T>` for all of the above (NULL maps to `None`)
//!
//! Enumerations get an implementation from the [`db_enum!`](crate::db_enum) macro.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_query::{Value, ValueType};
use uuid::Uuid;

use crate::error::TideError;
use crate::value::convert::{as_decimal, as_f64, as_i64, is_null};
use crate::value::ValueKind;

/// Conversion between an entity field and a store value.
///
/// `from_value` receives values that already went through the read-side
/// coercion for `KIND`, so implementations only accept their own family.
pub trait FieldValue: Sized + Send + 'static {
    /// Declared kind of the field
    const KIND: ValueKind;

    /// Current field content as a parameter value
    fn to_value(&self) -> Value;

    /// Decode a row value into the field type.
    ///
    /// NULL into a non-optional type is an `Execution` error.
    fn from_value(value: Value) -> Result<Self, TideError>;

    /// Typed NULL for this field, used by `Option<T>` when empty
    fn null_value() -> Value;
}

pub(crate) fn mismatch(target: &str, value: &Value) -> TideError {
    if is_null(value) {
        TideError::execution(format!("NULL cannot be assigned to a non-optional {target} field"))
    } else {
        TideError::execution(format!("cannot convert {value:?} into {target}"))
    }
}

macro_rules! integer_field {
    ($ty:ty, $kind:expr, $variant:ident) => {
        impl FieldValue for $ty {
            const KIND: ValueKind = $kind;

            fn to_value(&self) -> Value {
                Value::$variant(Some(*self))
            }

            fn from_value(value: Value) -> Result<Self, TideError> {
                let n = as_i64(&value).ok_or_else(|| mismatch(stringify!($ty), &value))?;
                <$ty as TryFrom<_>>::try_from(n).map_err(|_| {
                    TideError::execution(format!("value {n} is out of range for {}", stringify!($ty)))
                })
            }

            fn null_value() -> Value {
                Value::$variant(None)
            }
        }
    };
}

integer_field!(i16, ValueKind::SmallInt, SmallInt);
integer_field!(i32, ValueKind::Int, Int);
integer_field!(i64, ValueKind::BigInt, BigInt);

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(Some(*self))
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        as_f64(&value).map(|f| f as f32).ok_or_else(|| mismatch("f32", &value))
    }

    fn null_value() -> Value {
        Value::Float(None)
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(Some(*self))
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        as_f64(&value).ok_or_else(|| mismatch("f64", &value))
    }

    fn null_value() -> Value {
        Value::Double(None)
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(Some(*self))
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        match value {
            Value::Bool(Some(b)) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn null_value() -> Value {
        Value::Bool(None)
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::String(Some(self.clone().into()))
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        match value {
            Value::String(Some(s)) => Ok(s.to_string()),
            Value::Char(Some(c)) => Ok(c.to_string()),
            other => Err(mismatch("String", &other)),
        }
    }

    fn null_value() -> Value {
        Value::String(None)
    }
}

impl FieldValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(Some(self.clone().into()))
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        match value {
            Value::Bytes(Some(bytes)) => Ok(bytes.to_vec()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }

    fn null_value() -> Value {
        Value::Bytes(None)
    }
}

impl FieldValue for Decimal {
    const KIND: ValueKind = ValueKind::Decimal;

    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        as_decimal(&value).ok_or_else(|| mismatch("Decimal", &value))
    }

    fn null_value() -> Value {
        Value::Decimal(None)
    }
}

/// Implement `FieldValue` for types whose variant is only reachable through
/// `sea_query::ValueType` (boxed or feature-gated variants).
macro_rules! native_field {
    ($ty:ty, $kind:expr, $variant:ident, $to:expr) => {
        impl FieldValue for $ty {
            const KIND: ValueKind = $kind;

            fn to_value(&self) -> Value {
                let to: fn(&$ty) -> $ty = $to;
                Value::from(to(self))
            }

            fn from_value(value: Value) -> Result<Self, TideError> {
                <$ty as ValueType>::try_from(value.clone()).map_err(|_| mismatch(stringify!($ty), &value))
            }

            fn null_value() -> Value {
                Value::$variant(None)
            }
        }
    };
}

native_field!(Uuid, ValueKind::Uuid, Uuid, |v| *v);
native_field!(serde_json::Value, ValueKind::Json, Json, |v| v.clone());
native_field!(NaiveDate, ValueKind::Date, ChronoDate, |v| *v);
native_field!(NaiveTime, ValueKind::Time, ChronoTime, |v| *v);
native_field!(NaiveDateTime, ValueKind::DateTime, ChronoDateTime, |v| *v);
native_field!(DateTime<Utc>, ValueKind::DateTimeUtc, ChronoDateTimeUtc, |v| *v);

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => T::null_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self, TideError> {
        if is_null(&value) {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn null_value() -> Value {
        T::null_value()
    }
}
