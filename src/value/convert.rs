//! Value coercion between the store's representation and field kinds.
//!
//! Two directions are handled here:
//!
//! - **read**: a raw value decoded from a result row is reshaped to the kind
//!   declared by the column binding (integer widths, zoned to naive
//!   timestamps, textual dates, decimal/double, enum ordinals).
//! - **bind**: a parameter value is normalized before it is handed to the
//!   driver (unsigned and tiny integers are widened to signed kinds, single
//!   characters become text).
//!
//! Values that already match, and null values, pass through untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sea_query::{Value, ValueType};
use uuid::Uuid;

use crate::error::TideError;
use crate::value::ValueKind;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Whether `value` is a typed SQL NULL.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Bool(v) => v.is_none(),
        Value::TinyInt(v) => v.is_none(),
        Value::SmallInt(v) => v.is_none(),
        Value::Int(v) => v.is_none(),
        Value::BigInt(v) => v.is_none(),
        Value::TinyUnsigned(v) => v.is_none(),
        Value::SmallUnsigned(v) => v.is_none(),
        Value::Unsigned(v) => v.is_none(),
        Value::BigUnsigned(v) => v.is_none(),
        Value::Float(v) => v.is_none(),
        Value::Double(v) => v.is_none(),
        Value::String(v) => v.is_none(),
        Value::Char(v) => v.is_none(),
        Value::Bytes(v) => v.is_none(),
        Value::Json(v) => v.is_none(),
        Value::ChronoDate(v) => v.is_none(),
        Value::ChronoTime(v) => v.is_none(),
        Value::ChronoDateTime(v) => v.is_none(),
        Value::ChronoDateTimeUtc(v) => v.is_none(),
        Value::Uuid(v) => v.is_none(),
        Value::Decimal(v) => v.is_none(),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Integer view of any integer variant. Unsigned values above `i64::MAX` yield `None`.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(Some(n)) => Some(i64::from(*n)),
        Value::SmallInt(Some(n)) => Some(i64::from(*n)),
        Value::Int(Some(n)) => Some(i64::from(*n)),
        Value::BigInt(Some(n)) => Some(*n),
        Value::TinyUnsigned(Some(n)) => Some(i64::from(*n)),
        Value::SmallUnsigned(Some(n)) => Some(i64::from(*n)),
        Value::Unsigned(Some(n)) => Some(i64::from(*n)),
        Value::BigUnsigned(Some(n)) => <i64 as TryFrom<_>>::try_from(*n).ok(),
        _ => None,
    }
}

/// Floating-point view of any numeric variant
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(f)) => Some(f64::from(*f)),
        Value::Double(Some(d)) => Some(*d),
        Value::Decimal(_) => as_decimal(value).and_then(|d| d.to_f64()),
        other => as_i64(other).map(|n| n as f64),
    }
}

/// Decimal view of any numeric variant
pub fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(_) => <Decimal as ValueType>::try_from(value.clone()).ok(),
        Value::Float(Some(f)) => Decimal::from_f32(*f),
        Value::Double(Some(d)) => Decimal::from_f64(*d),
        other => as_i64(other).map(Decimal::from),
    }
}

pub fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(Some(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Whether an identity value marks an entity that has not been persisted yet.
///
/// Null and numeric zero both count as "new".
pub fn is_absent_identity(value: &Value) -> bool {
    if is_null(value) {
        return true;
    }
    if let Some(n) = as_i64(value) {
        return n == 0;
    }
    match value {
        Value::Float(_) | Value::Double(_) | Value::Decimal(_) => {
            as_decimal(value).is_some_and(|d| d.is_zero())
        }
        _ => false,
    }
}

/// Reshape a raw row value to the declared kind of the field it feeds.
///
/// Conversion is best effort: when no rule applies the raw value is returned
/// and the field's own decoder reports the mismatch.
pub fn coerce_for_read(kind: ValueKind, raw: Value) -> Value {
    if is_null(&raw) {
        return raw;
    }
    let coerced = match kind {
        ValueKind::Bool => read_bool(&raw),
        ValueKind::SmallInt => read_integer(&raw).and_then(|n| <i16 as TryFrom<_>>::try_from(n).ok()).map(|n| Value::SmallInt(Some(n))),
        ValueKind::Int => read_integer(&raw).and_then(|n| <i32 as TryFrom<_>>::try_from(n).ok()).map(|n| Value::Int(Some(n))),
        ValueKind::BigInt => read_integer(&raw).map(|n| Value::BigInt(Some(n))),
        ValueKind::Float => as_f64(&raw).map(|f| Value::Float(Some(f as f32))),
        ValueKind::Double => as_f64(&raw).map(|f| Value::Double(Some(f))),
        ValueKind::Decimal => read_decimal(&raw).map(Value::from),
        ValueKind::Text => read_text(&raw),
        ValueKind::Uuid => as_str(&raw)
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::from),
        ValueKind::Json => as_str(&raw)
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
            .map(Value::from),
        ValueKind::Bytes => as_str(&raw).map(|s| Value::Bytes(Some(s.as_bytes().to_vec().into()))),
        ValueKind::Date => read_date(&raw).map(Value::from),
        ValueKind::Time => read_time(&raw).map(Value::from),
        ValueKind::DateTime => read_datetime(&raw).map(Value::from),
        ValueKind::DateTimeUtc => read_datetime_utc(&raw).map(Value::from),
        ValueKind::Enum => None,
    };
    coerced.unwrap_or(raw)
}

/// Normalize a parameter before it is bound.
///
/// Fails only for unsigned values that do not fit a signed 64-bit integer.
pub fn coerce_for_bind(value: Value) -> Result<Value, TideError> {
    let coerced = match value {
        Value::TinyInt(n) => Value::SmallInt(n.map(i16::from)),
        Value::TinyUnsigned(n) => Value::SmallInt(n.map(i16::from)),
        Value::SmallUnsigned(n) => Value::Int(n.map(i32::from)),
        Value::Unsigned(n) => Value::BigInt(n.map(i64::from)),
        Value::BigUnsigned(Some(n)) => {
            let signed = <i64 as TryFrom<_>>::try_from(n).map_err(|_| {
                TideError::validation(format!("unsigned value {n} does not fit a BIGINT parameter"))
            })?;
            Value::BigInt(Some(signed))
        }
        Value::BigUnsigned(None) => Value::BigInt(None),
        Value::Char(c) => Value::String(c.map(|c| c.to_string().into())),
        other => other,
    };
    Ok(coerced)
}

fn read_integer(raw: &Value) -> Option<i64> {
    if let Some(n) = as_i64(raw) {
        return Some(n);
    }
    match raw {
        Value::Decimal(_) => as_decimal(raw).filter(|d| d.fract().is_zero()).and_then(|d| d.to_i64()),
        Value::Bool(Some(b)) => Some(i64::from(*b)),
        Value::String(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_bool(raw: &Value) -> Option<Value> {
    let flag = match raw {
        Value::Bool(Some(b)) => *b,
        Value::String(Some(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" | "y" | "yes" => true,
            "f" | "false" | "0" | "n" | "no" => false,
            _ => return None,
        },
        other => as_i64(other)? != 0,
    };
    Some(Value::Bool(Some(flag)))
}

fn read_decimal(raw: &Value) -> Option<Decimal> {
    match raw {
        Value::String(Some(s)) => s.trim().parse().ok(),
        other => as_decimal(other),
    }
}

fn read_text(raw: &Value) -> Option<Value> {
    let text = match raw {
        Value::Char(Some(c)) => c.to_string(),
        Value::Uuid(_) => <Uuid as ValueType>::try_from(raw.clone()).ok()?.to_string(),
        Value::Decimal(_) => as_decimal(raw)?.to_string(),
        other => as_i64(other)?.to_string(),
    };
    Some(Value::String(Some(text.into())))
}

fn read_date(raw: &Value) -> Option<NaiveDate> {
    match raw {
        Value::ChronoDateTime(_) => read_datetime(raw).map(|dt| dt.date()),
        Value::ChronoDateTimeUtc(_) => read_datetime_utc(raw).map(|dt| dt.date_naive()),
        Value::String(Some(s)) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.date())),
        _ => None,
    }
}

fn read_time(raw: &Value) -> Option<NaiveTime> {
    match raw {
        Value::ChronoDateTime(_) => read_datetime(raw).map(|dt| dt.time()),
        Value::ChronoDateTimeUtc(_) => read_datetime_utc(raw).map(|dt| dt.time()),
        Value::String(Some(s)) => TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok()),
        _ => None,
    }
}

fn read_datetime(raw: &Value) -> Option<NaiveDateTime> {
    match raw {
        Value::ChronoDateTime(_) => <NaiveDateTime as ValueType>::try_from(raw.clone()).ok(),
        Value::ChronoDateTimeUtc(_) => read_datetime_utc(raw).map(|dt| dt.naive_utc()),
        Value::ChronoDate(_) => <NaiveDate as ValueType>::try_from(raw.clone())
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        Value::String(Some(s)) => parse_datetime(s),
        _ => None,
    }
}

fn read_datetime_utc(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::ChronoDateTimeUtc(_) => <DateTime<Utc> as ValueType>::try_from(raw.clone()).ok(),
        Value::ChronoDateTime(_) | Value::ChronoDate(_) => read_datetime(raw).map(|dt| dt.and_utc()),
        Value::String(Some(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_datetime(s).map(|dt| dt.and_utc())),
        _ => None,
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}
