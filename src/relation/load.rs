//! Fetching related instances into relation slots.

use std::any::Any;

use crate::descriptor::{EntityDescriptor, Ownership, Registry, RelationDescriptor};
use crate::error::TideError;
use crate::executor::Executor;
use crate::mapper::{materialize_all, materialize_one, Instance};
use crate::query::{SelectBuilder, Statement};
use crate::relation::mapped_by_column;
use crate::value::is_null;

/// Reload one relation of `owner`, replacing whatever the slot held.
pub(crate) fn load_relation<X: Executor + ?Sized>(
    exec: &mut X,
    registry: &Registry,
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    owner: &mut dyn Any,
) -> Result<(), TideError> {
    let related = fetch_related(exec, registry, descriptor, relation, owner)?;
    relation.take(owner)?;
    match related {
        Some(related) => relation.assign(owner, related),
        None => Ok(()),
    }
}

/// Resolve the eager relations of `owner` that are still unset.
///
/// One level only: the related instances are not expanded in turn.
pub(crate) fn expand_eager<X: Executor + ?Sized>(
    exec: &mut X,
    registry: &Registry,
    descriptor: &EntityDescriptor,
    owner: &mut dyn Any,
) -> Result<(), TideError> {
    for relation in descriptor.eager_relations() {
        if relation.is_loaded(owner)? {
            continue;
        }
        if let Some(related) = fetch_related(exec, registry, descriptor, relation, owner)? {
            relation.assign(owner, related)?;
        }
    }
    Ok(())
}

/// Query the instances `relation` links `owner` to.
///
/// `None` when the link key is null, so the slot should stay unset.
pub(crate) fn fetch_related<X: Executor + ?Sized>(
    exec: &mut X,
    registry: &Registry,
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    owner: &dyn Any,
) -> Result<Option<Vec<Instance>>, TideError> {
    let target = relation.target_descriptor(registry)?;
    let Some(statement) = related_statement(descriptor, &target, relation, owner)? else {
        return Ok(None);
    };

    let (sql, params) = statement.into_parts();
    let mut cursor = exec.query(&sql, &params)?;

    let related = match relation.ownership() {
        Ownership::Owning { .. } => materialize_one(&mut cursor, &target)?.into_iter().collect(),
        Ownership::Inverse { .. } if !relation.relation_type().is_collection() => {
            let mut matches = materialize_all(&mut cursor, &target)?;
            if matches.len() > 1 {
                log::warn!(
                    "one-to-one relation `{}` of {} matched {} rows; keeping the first",
                    relation.field(),
                    descriptor.type_name(),
                    matches.len()
                );
                matches.truncate(1);
            }
            matches
        }
        _ => materialize_all(&mut cursor, &target)?,
    };
    Ok(Some(related))
}

fn related_statement(
    descriptor: &EntityDescriptor,
    target: &EntityDescriptor,
    relation: &RelationDescriptor,
    owner: &dyn Any,
) -> Result<Option<Statement>, TideError> {
    let statement = match relation.ownership() {
        Ownership::Owning { join_column } => {
            let column = descriptor.column(join_column).ok_or_else(|| {
                TideError::configuration(format!(
                    "join column `{join_column}` of relation `{}` is not bound on {}",
                    relation.field(),
                    descriptor.type_name()
                ))
            })?;
            let key = column.read(owner)?;
            if is_null(&key) {
                return Ok(None);
            }
            SelectBuilder::from(target.table())
                .where_eq(target.identity().name(), key)
                .build()?
        }
        Ownership::Inverse { mapped_by } => {
            let column = mapped_by_column(target, mapped_by)?;
            let id = descriptor.identity_value(owner)?;
            if is_null(&id) {
                return Ok(None);
            }
            SelectBuilder::from(target.table()).where_eq(column, id).build()?
        }
        Ownership::Bridge(join_table) => {
            let id = descriptor.identity_value(owner)?;
            if is_null(&id) {
                return Ok(None);
            }
            SelectBuilder::from_as(target.table(), "t")
                .column("t.*")
                .inner_join(
                    &join_table.table,
                    "j",
                    &format!("t.{}", target.identity().name()),
                    &format!("j.{}", join_table.inverse_column),
                )
                .where_eq(&format!("j.{}", join_table.owner_column), id)
                .build()?
        }
    };
    Ok(Some(statement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use crate::test_helpers::{row_with_id, MockStore};
    use crate::tests_cfg::entities::{Customer, Misdirected, Order, Profile, Tag};
    use sea_query::Value;

    fn order_with_customer(customer_id: Option<i64>) -> Order {
        Order {
            id: Some(1),
            customer_id,
            ..Order::default()
        }
    }

    #[test]
    fn test_many_to_one_loads_by_join_column() {
        let store = MockStore::new();
        store.respond_rows(
            r#"FROM "customers""#,
            vec![row_with_id(7, &[("name", Value::from("Ada"))])],
        );
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut order = order_with_customer(Some(7));

        expand_eager(&mut store.connection(), &registry, &descriptor, &mut order).unwrap();

        let customer = order.customer.as_deref().unwrap();
        assert_eq!(customer.id, Some(7));
        assert_eq!(customer.name, "Ada");
        // one level only: the customer's own eager profile is not resolved
        assert!(customer.profile.is_none());

        let statements = store.statements_with_params();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].0, r#"SELECT * FROM "customers" WHERE "id" = $1"#);
        assert_eq!(statements[0].1, vec![Value::BigInt(Some(7))]);
    }

    #[test]
    fn test_null_join_column_leaves_slot_unset() {
        let store = MockStore::new();
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut order = order_with_customer(None);

        expand_eager(&mut store.connection(), &registry, &descriptor, &mut order).unwrap();
        assert!(order.customer.is_none());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_expand_eager_keeps_assigned_slots() {
        let store = MockStore::new();
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut order = order_with_customer(Some(7));
        order.customer = Some(Box::new(Customer {
            id: Some(7),
            name: "kept".to_string(),
            ..Customer::default()
        }));

        expand_eager(&mut store.connection(), &registry, &descriptor, &mut order).unwrap();
        assert_eq!(order.customer.unwrap().name, "kept");
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_inverse_one_to_one_keeps_first_match() {
        let store = MockStore::new();
        store.respond_rows(
            r#"FROM "profiles""#,
            vec![
                row_with_id(1, &[("customer_id", Value::from(3i64)), ("bio", Value::from("first"))]),
                row_with_id(2, &[("customer_id", Value::from(3i64)), ("bio", Value::from("second"))]),
            ],
        );
        let registry = Registry::new();
        let descriptor = registry.resolve::<Customer>().unwrap();
        let mut customer = Customer {
            id: Some(3),
            ..Customer::default()
        };

        expand_eager(&mut store.connection(), &registry, &descriptor, &mut customer).unwrap();
        assert_eq!(
            customer.profile.as_deref(),
            Some(&Profile {
                id: Some(1),
                customer_id: Some(3),
                bio: "first".to_string()
            })
        );
        assert_eq!(
            store.statements()[0],
            r#"SELECT * FROM "profiles" WHERE "customer_id" = $1"#
        );
    }

    #[test]
    fn test_one_to_many_through_owning_relation() {
        let store = MockStore::new();
        store.respond_rows(
            r#"FROM "orders""#,
            vec![
                row_with_id(10, &[("total", Value::from(5i64)), ("status", Value::from("NEW"))]),
                row_with_id(11, &[("total", Value::from(6i64)), ("status", Value::from("PAID"))]),
            ],
        );
        let registry = Registry::new();
        let descriptor = registry.resolve::<Customer>().unwrap();
        let relation = descriptor.relation("orders").unwrap();
        let mut customer = Customer {
            id: Some(3),
            ..Customer::default()
        };

        load_relation(&mut store.connection(), &registry, &descriptor, relation, &mut customer).unwrap();
        let orders = customer.orders.unwrap();
        assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![Some(10), Some(11)]);
        // `mapped_by("customer")` resolves to the customer relation's join column
        assert_eq!(
            store.statements()[0],
            r#"SELECT * FROM "orders" WHERE "customer_id" = $1"#
        );
    }

    #[test]
    fn test_load_relation_refreshes_to_empty_collection() {
        let store = MockStore::new();
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let relation = descriptor.relation("lines").unwrap();
        let mut order = order_with_customer(None);
        order.lines = Some(vec![Default::default()]);

        load_relation(&mut store.connection(), &registry, &descriptor, relation, &mut order).unwrap();
        assert_eq!(order.lines, Some(Vec::new()));
    }

    #[test]
    fn test_null_identity_leaves_collection_unset() {
        let store = MockStore::new();
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let relation = descriptor.relation("lines").unwrap();
        let mut order = Order::default();

        load_relation(&mut store.connection(), &registry, &descriptor, relation, &mut order).unwrap();
        assert!(order.lines.is_none());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_many_to_many_through_bridge() {
        let store = MockStore::new();
        store.respond_rows(
            "order_tags",
            vec![
                row_with_id(1, &[("name", Value::from("gift"))]),
                row_with_id(2, &[("name", Value::from("rush"))]),
                row_with_id(2, &[("name", Value::from("rush"))]),
            ],
        );
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let relation = descriptor.relation("tags").unwrap();
        let mut order = order_with_customer(None);

        load_relation(&mut store.connection(), &registry, &descriptor, relation, &mut order).unwrap();
        let tags = order.tags.unwrap();
        // set semantics collapse the duplicate
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(&Tag {
            id: Some(1),
            name: "gift".to_string()
        }));

        let sql = &store.statements()[0];
        assert!(sql.starts_with(r#"SELECT "t".* FROM "tags" AS "t" INNER JOIN "order_tags" AS "j""#));
        assert!(sql.contains(r#"ON "t"."id" = "j"."tag_id""#));
        assert!(sql.ends_with(r#"WHERE "j"."order_id" = $1"#));
    }

    #[test]
    fn test_unresolvable_mapped_by_is_configuration() {
        let store = MockStore::new();
        let registry = Registry::new();
        let descriptor = registry.resolve::<Misdirected>().unwrap();
        let mut owner = Misdirected {
            id: Some(1),
            lines: None,
        };

        let err = expand_eager(&mut store.connection(), &registry, &descriptor, &mut owner).unwrap_err();
        assert!(err.is_configuration());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn test_unconvertible_related_row_is_execution() {
        let store = MockStore::new();
        store.respond_rows(
            r#"FROM "customers""#,
            vec![Row::new().with("id", "not a number")],
        );
        let registry = Registry::new();
        let descriptor = registry.resolve::<Order>().unwrap();
        let mut order = order_with_customer(Some(7));

        let err = expand_eager(&mut store.connection(), &registry, &descriptor, &mut order).unwrap_err();
        assert!(err.is_execution());
    }
}
