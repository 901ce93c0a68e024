use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use sea_query::Value;

use crate::descriptor::column::ColumnDescriptor;
use crate::descriptor::relation::RelationDescriptor;
use crate::descriptor::{Entity, EntityDef};
use crate::error::TideError;

/// Immutable mapping metadata for one entity type.
///
/// Built once per type by the [`Registry`](crate::descriptor::Registry) from
/// the type's [`Entity::describe`] bindings, then shared read-only.
pub struct EntityDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// Table name, schema-qualified when a schema was bound
    pub(crate) table: String,
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) identity: usize,
    pub(crate) identity_generated: bool,
    pub(crate) relations: Vec<RelationDescriptor>,
    pub(crate) column_by_name: HashMap<String, usize>,
    pub(crate) column_by_field: HashMap<String, usize>,
    pub(crate) relation_by_field: HashMap<String, usize>,
    pub(crate) factory: fn() -> Box<dyn Any + Send>,
}

impl EntityDescriptor {
    /// Run the type's bindings and validate them.
    pub(crate) fn build<E: Entity>() -> Result<Self, TideError> {
        let mut def = EntityDef::<E>::new();
        E::describe(&mut def);
        def.compile()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// All column bindings, identity included, in binding order
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn identity(&self) -> &ColumnDescriptor {
        &self.columns[self.identity]
    }

    pub fn is_identity_generated(&self) -> bool {
        self.identity_generated
    }

    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// Column binding by column label
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.column_by_name.get(name).map(|&idx| &self.columns[idx])
    }

    /// Column binding by Rust field identifier
    pub fn column_by_field(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.column_by_field.get(field).map(|&idx| &self.columns[idx])
    }

    /// Relation binding by Rust field identifier
    pub fn relation(&self, field: &str) -> Option<&RelationDescriptor> {
        self.relation_by_field.get(field).map(|&idx| &self.relations[idx])
    }

    pub fn eager_relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.iter().filter(|r| r.is_eager())
    }

    /// A default-constructed instance of the described type
    pub(crate) fn instantiate(&self) -> Box<dyn Any + Send> {
        (self.factory)()
    }

    pub fn identity_value(&self, entity: &dyn Any) -> Result<Value, TideError> {
        self.identity().read(entity)
    }

    pub(crate) fn set_identity(&self, entity: &mut dyn Any, value: Value) -> Result<(), TideError> {
        self.identity().write(entity, value)
    }

    /// Column/value pairs for an INSERT: insertable columns, minus a
    /// store-generated identity.
    pub fn insert_values(&self, entity: &dyn Any) -> Result<Vec<(String, Value)>, TideError> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, column)| {
                column.is_insertable() && !(*idx == self.identity && self.identity_generated)
            })
            .map(|(_, column)| Ok((column.name().to_string(), column.read(entity)?)))
            .collect()
    }

    /// Column/value pairs for an UPDATE: updatable columns, identity excluded.
    pub fn update_values(&self, entity: &dyn Any) -> Result<Vec<(String, Value)>, TideError> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, column)| column.is_updatable() && *idx != self.identity)
            .map(|(_, column)| Ok((column.name().to_string(), column.read(entity)?)))
            .collect()
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("identity", &self.identity().name())
            .field("identity_generated", &self.identity_generated)
            .field("columns", &self.columns)
            .field("relations", &self.relations)
            .finish()
    }
}
