//! Entity descriptors.
//!
//! An entity type describes its table, identity, columns and relations once,
//! in [`Entity::describe`]. The [`Registry`] turns those bindings into an
//! immutable [`EntityDescriptor`] the first time the type is used and shares it
//! from then on. Every query, insert, update, delete, hydration, eager load and
//! cascade is driven by these descriptors.

pub mod builder;
pub mod column;
pub mod entity;
pub mod registry;
pub mod relation;

pub use builder::{ColumnBinding, EntityDef, RelationBinding};
pub use column::ColumnDescriptor;
pub use entity::EntityDescriptor;
pub use registry::Registry;
pub use relation::{
    CollectionKind, EntityCollection, FetchPolicy, JoinTable, Ownership, RelationDescriptor,
    RelationType, TargetRef,
};

use std::any::Any;

/// A type mapped to a table.
///
/// `Default` provides the blank instance rows are hydrated into; relation
/// slots start out unloaded (`None`).
pub trait Entity: Any + Send + Default {
    /// Record the table, identity, column and relation bindings.
    fn describe(def: &mut EntityDef<Self>);
}
