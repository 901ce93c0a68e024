//! Enumeration fields.
//!
//! Enumerations are written by name and read back either by name or by
//! ordinal, so integer-backed legacy columns keep working.

use sea_query::Value;

use crate::error::TideError;
use crate::value::convert::{as_i64, as_str};
use crate::value::types::mismatch;

/// A fieldless enumeration stored as its variant name.
///
/// Implement through [`db_enum!`](crate::db_enum), which also provides the
/// matching [`FieldValue`](crate::value::FieldValue) implementation.
pub trait DbEnum: Sized + Copy + Send + 'static {
    /// Variants in declaration order; the index is the ordinal
    const VARIANTS: &'static [Self];

    /// Stored name of this variant
    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.name() == name)
    }

    fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::VARIANTS.get(idx).copied())
    }

    fn ordinal(&self) -> usize {
        let name = self.name();
        Self::VARIANTS
            .iter()
            .position(|v| v.name() == name)
            .unwrap_or_default()
    }
}

/// Decode an enumeration from a name or an ordinal.
pub fn enum_from_value<E: DbEnum>(value: Value) -> Result<E, TideError> {
    let type_name = std::any::type_name::<E>();
    if let Some(name) = as_str(&value) {
        return E::from_name(name).ok_or_else(|| {
            TideError::execution(format!("`{name}` is not a variant of {type_name}"))
        });
    }
    match as_i64(&value) {
        Some(ordinal) => E::from_ordinal(ordinal).ok_or_else(|| {
            TideError::execution(format!("ordinal {ordinal} is out of range for {type_name}"))
        }),
        None => Err(mismatch(type_name, &value)),
    }
}

/// Bind a fieldless enum as a stored enumeration.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// pub enum OrderStatus {
///     #[default]
///     New,
///     Paid,
/// }
///
/// tideline::db_enum!(OrderStatus { New => "NEW", Paid => "PAID" });
/// ```
#[macro_export]
macro_rules! db_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $crate::value::DbEnum for $ty {
            const VARIANTS: &'static [Self] = &[$($ty::$variant),+];

            fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl $crate::value::FieldValue for $ty {
            const KIND: $crate::value::ValueKind = $crate::value::ValueKind::Enum;

            fn to_value(&self) -> $crate::sea_query::Value {
                $crate::sea_query::Value::from($crate::value::DbEnum::name(self))
            }

            fn from_value(
                value: $crate::sea_query::Value,
            ) -> ::std::result::Result<Self, $crate::TideError> {
                $crate::value::enum_from_value(value)
            }

            fn null_value() -> $crate::sea_query::Value {
                $crate::sea_query::Value::String(None)
            }
        }
    };
}
