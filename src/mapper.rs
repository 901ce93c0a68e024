//! Turns result rows into entity instances.
//!
//! Columns are matched to fields by column label. Labels the descriptor does
//! not know are skipped, so `SELECT *` over a wider table is fine. Each value
//! is coerced by the column's declared kind before it reaches the field.

use std::any::Any;

use crate::descriptor::{Entity, EntityDescriptor};
use crate::error::TideError;
use crate::row::{Cursor, Row};

/// Erased entity instance, as produced by a descriptor's factory
pub type Instance = Box<dyn Any + Send>;

/// Build one instance from `row`.
pub fn hydrate(descriptor: &EntityDescriptor, row: Row) -> Result<Instance, TideError> {
    let mut instance = descriptor.instantiate();
    for (label, value) in row {
        if let Some(column) = descriptor.column(&label) {
            column.write(instance.as_mut(), value)?;
        }
    }
    Ok(instance)
}

/// Materialize the first remaining row, if any. Later rows stay in the cursor.
pub fn materialize_one(
    cursor: &mut Cursor,
    descriptor: &EntityDescriptor,
) -> Result<Option<Instance>, TideError> {
    cursor
        .next_row()
        .map(|row| hydrate(descriptor, row))
        .transpose()
}

/// Materialize every remaining row, in result order.
pub fn materialize_all(
    cursor: &mut Cursor,
    descriptor: &EntityDescriptor,
) -> Result<Vec<Instance>, TideError> {
    let mut instances = Vec::with_capacity(cursor.remaining());
    while let Some(row) = cursor.next_row() {
        instances.push(hydrate(descriptor, row)?);
    }
    Ok(instances)
}

/// Remaining rows as plain column/value mappings
pub fn materialize_raw(cursor: &mut Cursor) -> Vec<Row> {
    cursor.collect()
}

/// Recover the concrete type of an instance.
pub fn downcast<E: Entity>(instance: Instance) -> Result<E, TideError> {
    instance.downcast::<E>().map(|boxed| *boxed).map_err(|_| {
        TideError::configuration(format!(
            "materialized instance is not a {}",
            std::any::type_name::<E>()
        ))
    })
}

pub fn downcast_all<E: Entity>(instances: Vec<Instance>) -> Result<Vec<E>, TideError> {
    instances.into_iter().map(downcast::<E>).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Registry;
    use crate::tests_cfg::entities::{Customer, Order, OrderStatus};
    use rust_decimal::Decimal;
    use sea_query::Value;

    fn order_row(id: i64, total: i64, status: &str) -> Row {
        Row::new()
            .with("id", id)
            .with("total", Decimal::new(total, 0))
            .with("status", status)
            .with("customer_id", Value::BigInt(None))
    }

    #[test]
    fn test_materialize_one_leaves_remaining_rows() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut cursor = Cursor::from(vec![order_row(1, 10, "NEW"), order_row(2, 20, "PAID")]);

        let first = materialize_one(&mut cursor, &descriptor).unwrap().unwrap();
        let order = downcast::<Order>(first).unwrap();
        assert_eq!(order.id, Some(1));
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_materialize_one_empty() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut cursor = Cursor::empty();
        assert!(materialize_one(&mut cursor, &descriptor).unwrap().is_none());
    }

    #[test]
    fn test_materialize_all_ignores_unknown_columns() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let rows = vec![
            order_row(1, 10, "NEW").with("row_number", 1i64),
            order_row(2, 20, "SHIPPED").with("row_number", 2i64),
        ];
        let orders =
            downcast_all::<Order>(materialize_all(&mut Cursor::from(rows), &descriptor).unwrap())
                .unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].status, OrderStatus::Shipped);
        assert!(orders[0].customer_id.is_none());
    }

    #[test]
    fn test_enum_by_ordinal_and_numeric_widening() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let row = Row::new()
            .with("id", 3i32)
            .with("total", 100.5f64)
            .with("status", 1i32);
        let order = downcast::<Order>(hydrate(&descriptor, row).unwrap()).unwrap();
        assert_eq!(order.id, Some(3));
        assert_eq!(order.total, Decimal::new(1005, 1));
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn test_null_into_required_field_is_execution() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let row = Row::new().with("id", 1i64).with("total", Value::Decimal(None));
        let err = hydrate(&descriptor, row).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn test_downcast_wrong_type() {
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let instance = hydrate(&descriptor, Row::new().with("id", 1i64)).unwrap();
        assert!(downcast::<Customer>(instance).unwrap_err().is_configuration());
    }

    #[test]
    fn test_materialize_raw() {
        let mut cursor = Cursor::from(vec![Row::new().with("n", 1i64), Row::new().with("n", 2i64)]);
        let rows = materialize_raw(&mut cursor);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("n"), Some(&Value::BigInt(Some(2))));
        assert_eq!(cursor.remaining(), 0);
    }
}
