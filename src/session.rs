//! One unit of work on one connection.
//!
//! A [`Session`] is what [`Database::transaction`](crate::Database::transaction)
//! hands to its closure: every operation runs on the same connection inside
//! the same transaction, relation round trips included.

use std::any::Any;
use std::sync::Arc;

use sea_query::Value;

use crate::descriptor::{Entity, EntityDescriptor, Registry};
use crate::error::TideError;
use crate::executor::Connection;
use crate::mapper::{self, Instance};
use crate::query::{DeleteBuilder, InsertBuilder, Predicate, SelectBuilder, Statement, UpdateBuilder};
use crate::relation::{cascade, load};
use crate::row::{Cursor, Row};
use crate::value::convert::{is_absent_identity, is_null};

pub struct Session<'a> {
    conn: &'a mut dyn Connection,
    registry: &'a Registry,
}

impl<'a> Session<'a> {
    pub fn new(conn: &'a mut dyn Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub(crate) fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }

    pub fn descriptor<E: Entity>(&self) -> Result<Arc<EntityDescriptor>, TideError> {
        self.registry.resolve::<E>()
    }

    /// Entity whose identity equals `id`, with eager relations resolved.
    pub fn find_by_id<E: Entity>(&mut self, id: impl Into<Value>) -> Result<Option<E>, TideError> {
        let descriptor = self.descriptor::<E>()?;
        let statement = SelectBuilder::from(descriptor.table())
            .where_eq(descriptor.identity().name(), id)
            .build()?;
        let mut cursor = self.run_query(statement)?;
        // the identity is unique, anything past the first row is ignored
        let Some(mut instance) = mapper::materialize_one(&mut cursor, &descriptor)? else {
            return Ok(None);
        };
        self.expand(&descriptor, instance.as_mut())?;
        mapper::downcast::<E>(instance).map(Some)
    }

    pub fn find_all<E: Entity>(&mut self) -> Result<Vec<E>, TideError> {
        let descriptor = self.descriptor::<E>()?;
        mapper::downcast_all(self.fetch_where(&descriptor, Vec::new())?)
    }

    /// Entities matching every `column = value` condition. A null value
    /// matches `IS NULL`.
    pub fn find_by<E: Entity>(&mut self, conditions: &[(&str, Value)]) -> Result<Vec<E>, TideError> {
        let descriptor = self.descriptor::<E>()?;
        let predicates = conditions
            .iter()
            .map(|(column, value)| Predicate::eq(*column, value.clone()))
            .collect();
        mapper::downcast_all(self.fetch_where(&descriptor, predicates)?)
    }

    /// Insert `entity`, reading back a generated identity.
    pub fn insert<E: Entity>(&mut self, entity: &mut E) -> Result<(), TideError> {
        let descriptor = self.descriptor::<E>()?;
        self.insert_row(&descriptor, entity)?;
        self.expand(&descriptor, entity)
    }

    /// Update the row of `entity`.
    ///
    /// # Errors
    ///
    /// `Execution` when no row has the entity's identity.
    pub fn update<E: Entity>(&mut self, entity: &mut E) -> Result<(), TideError> {
        let descriptor = self.descriptor::<E>()?;
        self.update_row(&descriptor, entity)?;
        self.expand(&descriptor, entity)
    }

    /// Insert when the identity is unset (null or zero), update otherwise,
    /// then save cascade relations.
    pub fn save<E: Entity>(&mut self, entity: &mut E) -> Result<(), TideError> {
        let descriptor = self.descriptor::<E>()?;
        self.save_erased(&descriptor, entity)
    }

    /// Delete `entity` after its orphan-removal children. Returns whether a
    /// row was deleted.
    pub fn delete<E: Entity>(&mut self, entity: &E) -> Result<bool, TideError> {
        let descriptor = self.descriptor::<E>()?;
        self.delete_erased(&descriptor, entity)
    }

    /// Raw mutation with `$n` placeholders; returns the affected row count.
    pub fn execute(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, TideError> {
        let (sql, params) = Statement::raw(sql, params)?.into_parts();
        self.conn.execute(&sql, &params)
    }

    /// Raw query materialized as entities, eager relations resolved.
    pub fn query_as<E: Entity>(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<E>, TideError> {
        let descriptor = self.descriptor::<E>()?;
        let mut cursor = self.run_query(Statement::raw(sql, params)?)?;
        let instances = self.expand_all(&descriptor, &mut cursor)?;
        mapper::downcast_all(instances)
    }

    /// Raw query returned as plain rows
    pub fn query_raw(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, TideError> {
        let mut cursor = self.run_query(Statement::raw(sql, params)?)?;
        Ok(mapper::materialize_raw(&mut cursor))
    }

    /// (Re)load the relation bound to `field`, whatever its fetch policy.
    ///
    /// # Errors
    ///
    /// `Configuration` when `E` has no relation on `field`.
    pub fn load_relation<E: Entity>(&mut self, entity: &mut E, field: &str) -> Result<(), TideError> {
        let descriptor = self.descriptor::<E>()?;
        let relation = descriptor.relation(field).ok_or_else(|| {
            TideError::configuration(format!(
                "{} has no relation `{field}`",
                descriptor.type_name()
            ))
        })?;
        load::load_relation(&mut *self.conn, self.registry, &descriptor, relation, entity)
    }

    fn run_query(&mut self, statement: Statement) -> Result<Cursor, TideError> {
        let (sql, params) = statement.into_parts();
        self.conn.query(&sql, &params)
    }

    fn run_execute(&mut self, statement: Statement) -> Result<u64, TideError> {
        let (sql, params) = statement.into_parts();
        self.conn.execute(&sql, &params)
    }

    fn expand(&mut self, descriptor: &EntityDescriptor, entity: &mut dyn Any) -> Result<(), TideError> {
        load::expand_eager(&mut *self.conn, self.registry, descriptor, entity)
    }

    fn expand_all(
        &mut self,
        descriptor: &EntityDescriptor,
        cursor: &mut Cursor,
    ) -> Result<Vec<Instance>, TideError> {
        let mut instances = mapper::materialize_all(cursor, descriptor)?;
        for instance in &mut instances {
            self.expand(descriptor, instance.as_mut())?;
        }
        Ok(instances)
    }

    pub(crate) fn fetch_where(
        &mut self,
        descriptor: &EntityDescriptor,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Instance>, TideError> {
        let statement = predicates
            .into_iter()
            .fold(SelectBuilder::from(descriptor.table()), SelectBuilder::filter)
            .build()?;
        let mut cursor = self.run_query(statement)?;
        self.expand_all(descriptor, &mut cursor)
    }

    fn insert_row(&mut self, descriptor: &EntityDescriptor, entity: &mut dyn Any) -> Result<(), TideError> {
        let builder = InsertBuilder::into_table(descriptor.table()).values(descriptor.insert_values(entity)?);
        if !descriptor.is_identity_generated() {
            self.run_execute(builder.build()?)?;
            return Ok(());
        }

        let id_column = descriptor.identity().name();
        let mut cursor = self.run_query(builder.returning(id_column).build()?)?;
        let row = cursor.next_row().ok_or_else(|| {
            TideError::execution(format!("insert into `{}` returned no identity", descriptor.table()))
        })?;
        let id = row
            .get(id_column)
            .or_else(|| row.value_at(0))
            .cloned()
            .ok_or_else(|| {
                TideError::execution(format!("insert into `{}` returned an empty row", descriptor.table()))
            })?;
        descriptor.set_identity(entity, id)
    }

    fn update_row(&mut self, descriptor: &EntityDescriptor, entity: &mut dyn Any) -> Result<(), TideError> {
        let id = descriptor.identity_value(entity)?;
        let statement = UpdateBuilder::table(descriptor.table())
            .set_all(descriptor.update_values(entity)?)
            .where_eq(descriptor.identity().name(), id.clone())
            .build()?;
        if self.run_execute(statement)? == 0 {
            return Err(TideError::execution(format!(
                "no row of `{}` was updated for identity {id:?}",
                descriptor.table()
            )));
        }
        Ok(())
    }

    pub(crate) fn save_erased(
        &mut self,
        descriptor: &EntityDescriptor,
        entity: &mut dyn Any,
    ) -> Result<(), TideError> {
        if is_absent_identity(&descriptor.identity_value(entity)?) {
            self.insert_row(descriptor, entity)?;
        } else {
            self.update_row(descriptor, entity)?;
        }
        cascade::save_cascades(self, descriptor, entity)?;
        self.expand(descriptor, entity)
    }

    pub(crate) fn delete_erased(
        &mut self,
        descriptor: &EntityDescriptor,
        entity: &dyn Any,
    ) -> Result<bool, TideError> {
        let id = descriptor.identity_value(entity)?;
        if is_null(&id) {
            return Ok(false);
        }
        cascade::remove_orphans(self, descriptor, entity)?;
        let statement = DeleteBuilder::from(descriptor.table())
            .where_eq(descriptor.identity().name(), id)
            .build()?;
        Ok(self.run_execute(statement)? > 0)
    }
}
