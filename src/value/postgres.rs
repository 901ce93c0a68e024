//! Binding `sea_query::Value` parameters to PostgreSQL and decoding result
//! columns back into values.

use std::error::Error as StdError;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use may_postgres::types::ToSql;
use postgres_types::{to_sql_checked, FromSql, IsNull, Kind, Type};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_query::{Value, ValueType};
use uuid::Uuid;

use crate::error::TideError;
use crate::row::Row;
use crate::value::convert::{as_i64, is_null};

type BindResult = Result<IsNull, Box<dyn StdError + Sync + Send>>;

/// A parameter adapted to the column type the server expects.
///
/// Integers are narrowed or widened to the placeholder's integer width, text
/// can target enum, json and uuid columns, and temporal values follow the
/// zoned/naive flavour of the target.
#[derive(Debug)]
pub(crate) struct BoundParam<'a>(pub &'a Value);

impl ToSql for BoundParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        let value = self.0;
        if is_null(value) {
            return Ok(IsNull::Yes);
        }
        match value {
            Value::Bool(Some(b)) => {
                if is_text(ty) {
                    b.to_string().to_sql(ty, out)
                } else {
                    b.to_sql(ty, out)
                }
            }
            Value::String(Some(s)) => bind_text(s.as_str(), ty, out),
            Value::Bytes(Some(bytes)) => bytes.as_slice().to_sql(ty, out),
            Value::Float(Some(f)) => bind_float(f64::from(*f), ty, out),
            Value::Double(Some(d)) => bind_float(*d, ty, out),
            Value::Decimal(_) => bind_decimal(native::<Decimal>(value)?, ty, out),
            Value::Uuid(_) => {
                let id = native::<Uuid>(value)?;
                if is_text(ty) {
                    id.to_string().to_sql(ty, out)
                } else {
                    id.to_sql(ty, out)
                }
            }
            Value::Json(_) => {
                let json = native::<serde_json::Value>(value)?;
                if is_text(ty) {
                    json.to_string().to_sql(ty, out)
                } else {
                    json.to_sql(ty, out)
                }
            }
            Value::ChronoDate(_) => native::<NaiveDate>(value)?.to_sql(ty, out),
            Value::ChronoTime(_) => native::<NaiveTime>(value)?.to_sql(ty, out),
            Value::ChronoDateTime(_) => {
                let ts = native::<NaiveDateTime>(value)?;
                if *ty == Type::TIMESTAMPTZ {
                    ts.and_utc().to_sql(ty, out)
                } else {
                    ts.to_sql(ty, out)
                }
            }
            Value::ChronoDateTimeUtc(_) => {
                let ts = native::<DateTime<Utc>>(value)?;
                if *ty == Type::TIMESTAMP {
                    ts.naive_utc().to_sql(ty, out)
                } else {
                    ts.to_sql(ty, out)
                }
            }
            other => match as_i64(other) {
                Some(n) => bind_integer(n, ty, out),
                None => Err(format!("unsupported parameter {other:?} for {ty}").into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn native<T: ValueType>(value: &Value) -> Result<T, Box<dyn StdError + Sync + Send>> {
    <T as ValueType>::try_from(value.clone())
        .map_err(|_| format!("unexpected parameter representation {value:?}").into())
}

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
        || *ty == Type::UNKNOWN
}

fn bind_integer(n: i64, ty: &Type, out: &mut BytesMut) -> BindResult {
    if *ty == Type::INT2 {
        <i16 as TryFrom<_>>::try_from(n)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        <i32 as TryFrom<_>>::try_from(n)?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        n.to_sql(ty, out)
    } else if *ty == Type::OID {
        <u32 as TryFrom<_>>::try_from(n)?.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(n).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (n as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (n as f64).to_sql(ty, out)
    } else if *ty == Type::BOOL {
        (n != 0).to_sql(ty, out)
    } else if is_text(ty) {
        n.to_string().to_sql(ty, out)
    } else {
        Err(format!("cannot bind integer {n} to {ty}").into())
    }
}

fn bind_float(f: f64, ty: &Type, out: &mut BytesMut) -> BindResult {
    if *ty == Type::FLOAT8 {
        f.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (f as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        <Decimal as TryFrom<_>>::try_from(f)?.to_sql(ty, out)
    } else if is_text(ty) {
        f.to_string().to_sql(ty, out)
    } else {
        Err(format!("cannot bind float {f} to {ty}").into())
    }
}

fn bind_decimal(d: Decimal, ty: &Type, out: &mut BytesMut) -> BindResult {
    if *ty == Type::NUMERIC {
        d.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 || *ty == Type::FLOAT4 {
        let f = d.to_f64().ok_or_else(|| format!("decimal {d} does not fit a float"))?;
        bind_float(f, ty, out)
    } else if *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 {
        let n = d.to_i64().ok_or_else(|| format!("decimal {d} does not fit an integer"))?;
        bind_integer(n, ty, out)
    } else if is_text(ty) {
        d.to_string().to_sql(ty, out)
    } else {
        Err(format!("cannot bind decimal {d} to {ty}").into())
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> BindResult {
    if is_text(ty) {
        s.to_sql(ty, out)
    } else if matches!(ty.kind(), Kind::Enum(_)) {
        // Enum labels travel as their raw text in the binary protocol
        out.extend_from_slice(s.as_bytes());
        Ok(IsNull::No)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
    } else if *ty == Type::UUID {
        Uuid::parse_str(s)?.to_sql(ty, out)
    } else {
        Err(format!("cannot bind text to {ty}").into())
    }
}

/// Run `f` with `params` converted to the driver's parameter slice.
pub(crate) fn with_converted_params<R>(
    params: &[Value],
    f: impl FnOnce(&[&dyn ToSql]) -> R,
) -> R {
    let bound: Vec<BoundParam<'_>> = params.iter().map(BoundParam).collect();
    let refs: Vec<&dyn ToSql> = bound.iter().map(|p| p as &dyn ToSql).collect();
    f(&refs)
}

/// Any column rendered through its text representation.
///
/// Used for enum labels and for types without a dedicated decoder.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(RawText(String::from_utf8_lossy(raw).into_owned()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode a driver row into an ordered [`Row`].
pub(crate) fn decode_row(row: &may_postgres::Row) -> Result<Row, TideError> {
    let mut decoded = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_()).map_err(|e| {
            TideError::execution_caused_by(format!("failed to decode column `{}`", column.name()), e)
        })?;
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &may_postgres::Row, idx: usize, ty: &Type) -> Result<Value, may_postgres::Error> {
    let value = if *ty == Type::BOOL {
        Value::Bool(row.try_get::<usize, Option<bool>>(idx)?)
    } else if *ty == Type::INT2 {
        Value::SmallInt(row.try_get::<usize, Option<i16>>(idx)?)
    } else if *ty == Type::INT4 {
        Value::Int(row.try_get::<usize, Option<i32>>(idx)?)
    } else if *ty == Type::INT8 {
        Value::BigInt(row.try_get::<usize, Option<i64>>(idx)?)
    } else if *ty == Type::OID {
        Value::BigInt(row.try_get::<usize, Option<u32>>(idx)?.map(i64::from))
    } else if *ty == Type::FLOAT4 {
        Value::Float(row.try_get::<usize, Option<f32>>(idx)?)
    } else if *ty == Type::FLOAT8 {
        Value::Double(row.try_get::<usize, Option<f64>>(idx)?)
    } else if *ty == Type::NUMERIC {
        Value::from(row.try_get::<usize, Option<Decimal>>(idx)?)
    } else if is_text(ty) {
        Value::from(row.try_get::<usize, Option<String>>(idx)?)
    } else if *ty == Type::BYTEA {
        Value::from(row.try_get::<usize, Option<Vec<u8>>>(idx)?)
    } else if *ty == Type::UUID {
        Value::from(row.try_get::<usize, Option<Uuid>>(idx)?)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        Value::from(row.try_get::<usize, Option<serde_json::Value>>(idx)?)
    } else if *ty == Type::DATE {
        Value::from(row.try_get::<usize, Option<NaiveDate>>(idx)?)
    } else if *ty == Type::TIME {
        Value::from(row.try_get::<usize, Option<NaiveTime>>(idx)?)
    } else if *ty == Type::TIMESTAMP {
        Value::from(row.try_get::<usize, Option<NaiveDateTime>>(idx)?)
    } else if *ty == Type::TIMESTAMPTZ {
        Value::from(row.try_get::<usize, Option<DateTime<Utc>>>(idx)?)
    } else {
        let text = row.try_get::<usize, Option<RawText>>(idx)?;
        Value::from(text.map(|t| t.0))
    };
    Ok(value)
}
