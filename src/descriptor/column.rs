//! Column descriptors and erased field access.

use std::any::Any;
use std::fmt;

use sea_query::Value;

use crate::descriptor::Entity;
use crate::error::TideError;
use crate::value::{coerce_for_read, FieldValue, ValueKind};

/// Reads and writes one field of a concrete entity behind `dyn Any`.
///
/// Returns `None` when handed an instance of another type.
pub(crate) trait ColumnAccess: Send + Sync {
    fn read(&self, entity: &dyn Any) -> Option<Value>;

    fn write(&self, entity: &mut dyn Any, value: Value) -> Option<Result<(), TideError>>;
}

pub(crate) struct FieldAccess<E, F> {
    pub(crate) get: fn(&E) -> &F,
    pub(crate) get_mut: fn(&mut E) -> &mut F,
}

impl<E: Entity, F: FieldValue> ColumnAccess for FieldAccess<E, F> {
    fn read(&self, entity: &dyn Any) -> Option<Value> {
        entity.downcast_ref::<E>().map(|e| (self.get)(e).to_value())
    }

    fn write(&self, entity: &mut dyn Any, value: Value) -> Option<Result<(), TideError>> {
        let entity = entity.downcast_mut::<E>()?;
        Some(F::from_value(value).map(|decoded| *(self.get_mut)(entity) = decoded))
    }
}

/// A field bound to a column
pub struct ColumnDescriptor {
    pub(crate) field: String,
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
    pub(crate) insertable: bool,
    pub(crate) updatable: bool,
    pub(crate) access: Box<dyn ColumnAccess>,
}

impl ColumnDescriptor {
    /// Rust field identifier
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Column label
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_insertable(&self) -> bool {
        self.insertable
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Current field value of `entity`.
    pub fn read(&self, entity: &dyn Any) -> Result<Value, TideError> {
        self.access.read(entity).ok_or_else(|| self.wrong_entity())
    }

    /// Assign a raw row value, coercing it to the declared kind first.
    ///
    /// # Errors
    ///
    /// `Execution` when the value cannot be converted (including NULL into a
    /// non-optional field), `Configuration` when `entity` is of another type.
    pub fn write(&self, entity: &mut dyn Any, value: Value) -> Result<(), TideError> {
        let value = coerce_for_read(self.kind, value);
        match self.access.write(entity, value) {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => Err(TideError::execution_caused_by(
                format!("cannot assign column `{}` to field `{}`", self.name, self.field),
                err,
            )),
            None => Err(self.wrong_entity()),
        }
    }

    fn wrong_entity(&self) -> TideError {
        TideError::configuration(format!(
            "column `{}` was used with an entity of another type",
            self.name
        ))
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("field", &self.field)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("insertable", &self.insertable)
            .field("updatable", &self.updatable)
            .finish()
    }
}
