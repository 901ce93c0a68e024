//! Relation resolution.
//!
//! - [`load`] fills relation slots from the store (explicit loads and eager
//!   expansion)
//! - [`cascade`] propagates saves and orphan-removing deletes to related
//!   instances
//!
//! Everything here runs on the caller's connection, inside the caller's
//! transaction.

pub(crate) mod cascade;
pub(crate) mod load;

use crate::descriptor::{EntityDescriptor, Ownership};
use crate::error::TideError;

/// Column on `target` that an inverse relation's `mapped_by` points at.
///
/// `mapped_by` names either a column field of the target, or an owning
/// relation of the target whose join column is then used.
pub(crate) fn mapped_by_column<'a>(
    target: &'a EntityDescriptor,
    mapped_by: &str,
) -> Result<&'a str, TideError> {
    if let Some(column) = target.column_by_field(mapped_by) {
        return Ok(column.name());
    }
    if let Some(relation) = target.relation(mapped_by) {
        if let Ownership::Owning { join_column } = relation.ownership() {
            return Ok(join_column);
        }
    }
    Err(TideError::configuration(format!(
        "mapped-by field `{mapped_by}` is neither a column nor an owning relation of {}",
        target.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Registry;
    use crate::tests_cfg::entities::{Order, OrderLine};

    #[test]
    fn test_mapped_by_column_field_or_owning_relation() {
        let registry = Registry::new();
        let line = registry.resolve::<OrderLine>().unwrap();
        // a column field
        assert_eq!(mapped_by_column(&line, "order_id").unwrap(), "order_id");

        let order = registry.resolve::<Order>().unwrap();
        // an owning relation resolves to its join column
        assert_eq!(mapped_by_column(&order, "customer").unwrap(), "customer_id");
        assert!(mapped_by_column(&order, "nope").unwrap_err().is_configuration());
        // an inverse relation is not a valid target
        assert!(mapped_by_column(&order, "lines").unwrap_err().is_configuration());
    }
}
