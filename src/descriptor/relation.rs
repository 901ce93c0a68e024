//! Relation descriptors and erased relation slots.
//!
//! A relation slot is the entity field holding related instances:
//!
//! - single-valued (`ManyToOne`, `OneToOne`): `Option<Box<T>>`
//! - collection-valued (`OneToMany`, `ManyToMany`): `Option<C>` where `C` is
//!   a [`EntityCollection`] (`Vec`, `HashSet` or `BTreeSet`)
//!
//! `None` means "not loaded"; a loaded collection may be empty.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::descriptor::{Entity, EntityDescriptor, Registry};
use crate::error::TideError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationType {
    pub fn is_collection(self) -> bool {
        matches!(self, RelationType::OneToMany | RelationType::ManyToMany)
    }

    /// Fetch policy used when the binding does not choose one
    pub fn default_fetch(self) -> FetchPolicy {
        match self {
            RelationType::ManyToOne | RelationType::OneToOne => FetchPolicy::Eager,
            RelationType::OneToMany | RelationType::ManyToMany => FetchPolicy::Lazy,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationType::OneToOne => "one-to-one",
            RelationType::OneToMany => "one-to-many",
            RelationType::ManyToOne => "many-to-one",
            RelationType::ManyToMany => "many-to-many",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchPolicy {
    /// Resolved whenever the owner is materialized
    Eager,
    /// Resolved only through an explicit load
    Lazy,
}

/// Collection flavour of a collection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered, duplicates kept
    Sequence,
    /// Unordered, duplicates collapsed
    Set,
}

/// Bridge table of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub table: String,
    /// Bridge column referencing the owner's identity
    pub owner_column: String,
    /// Bridge column referencing the target's identity
    pub inverse_column: String,
}

/// Which side stores the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// The owner's table has a foreign-key column
    Owning { join_column: String },
    /// The target holds the link; `mapped_by` names the target field
    /// (a column field or an owning relation) pointing back
    Inverse { mapped_by: String },
    /// Linked through a bridge table
    Bridge(JoinTable),
}

/// Collection types usable as a to-many relation slot.
pub trait EntityCollection: Send + 'static {
    type Item: Entity;

    const KIND: CollectionKind;

    fn from_members(items: Vec<Self::Item>) -> Self;

    fn members(&self) -> Vec<&Self::Item>;

    fn into_members(self) -> Vec<Self::Item>;
}

impl<T: Entity> EntityCollection for Vec<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Sequence;

    fn from_members(items: Vec<T>) -> Self {
        items
    }

    fn members(&self) -> Vec<&T> {
        self.iter().collect()
    }

    fn into_members(self) -> Vec<T> {
        self
    }
}

impl<T: Entity + Eq + Hash> EntityCollection for HashSet<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Set;

    fn from_members(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }

    fn members(&self) -> Vec<&T> {
        self.iter().collect()
    }

    fn into_members(self) -> Vec<T> {
        self.into_iter().collect()
    }
}

impl<T: Entity + Ord> EntityCollection for BTreeSet<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Set;

    fn from_members(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }

    fn members(&self) -> Vec<&T> {
        self.iter().collect()
    }

    fn into_members(self) -> Vec<T> {
        self.into_iter().collect()
    }
}

pub(crate) type Member = Box<dyn Any + Send>;

/// Erased access to a relation slot. `None` signals an owner of another type.
pub(crate) trait RelationAccess: Send + Sync {
    fn is_loaded(&self, owner: &dyn Any) -> Option<bool>;

    /// Store `related` in the slot. A single-valued slot takes the first
    /// instance and is left untouched when there is none; a collection slot
    /// is always set.
    fn assign(&self, owner: &mut dyn Any, related: Vec<Member>) -> Option<()>;

    fn members<'a>(&self, owner: &'a dyn Any) -> Option<Vec<&'a dyn Any>>;

    /// Move the slot content out, leaving the slot unloaded.
    /// The inner `None` means the slot was not loaded.
    fn take(&self, owner: &mut dyn Any) -> Option<Option<Vec<Member>>>;

    /// Put back what `take` returned.
    fn restore(&self, owner: &mut dyn Any, members: Vec<Member>) -> Option<()>;
}

pub(crate) struct SingleSlot<E, T> {
    pub(crate) get: fn(&E) -> &Option<Box<T>>,
    pub(crate) get_mut: fn(&mut E) -> &mut Option<Box<T>>,
}

impl<E: Entity, T: Entity> RelationAccess for SingleSlot<E, T> {
    fn is_loaded(&self, owner: &dyn Any) -> Option<bool> {
        owner.downcast_ref::<E>().map(|e| (self.get)(e).is_some())
    }

    fn assign(&self, owner: &mut dyn Any, related: Vec<Member>) -> Option<()> {
        let owner = owner.downcast_mut::<E>()?;
        if let Some(first) = related.into_iter().next() {
            *(self.get_mut)(owner) = Some(first.downcast::<T>().ok()?);
        }
        Some(())
    }

    fn members<'a>(&self, owner: &'a dyn Any) -> Option<Vec<&'a dyn Any>> {
        let owner = owner.downcast_ref::<E>()?;
        Some(
            (self.get)(owner)
                .as_deref()
                .map(|t| t as &dyn Any)
                .into_iter()
                .collect(),
        )
    }

    fn take(&self, owner: &mut dyn Any) -> Option<Option<Vec<Member>>> {
        let owner = owner.downcast_mut::<E>()?;
        Some((self.get_mut)(owner).take().map(|t| vec![t as Member]))
    }

    fn restore(&self, owner: &mut dyn Any, members: Vec<Member>) -> Option<()> {
        let owner = owner.downcast_mut::<E>()?;
        let restored = match members.into_iter().next() {
            Some(member) => Some(member.downcast::<T>().ok()?),
            None => None,
        };
        *(self.get_mut)(owner) = restored;
        Some(())
    }
}

pub(crate) struct CollectionSlot<E, C> {
    pub(crate) get: fn(&E) -> &Option<C>,
    pub(crate) get_mut: fn(&mut E) -> &mut Option<C>,
}

fn downcast_members<T: Entity>(members: Vec<Member>) -> Option<Vec<T>> {
    members
        .into_iter()
        .map(|m| m.downcast::<T>().ok().map(|boxed| *boxed))
        .collect()
}

impl<E: Entity, C: EntityCollection> RelationAccess for CollectionSlot<E, C> {
    fn is_loaded(&self, owner: &dyn Any) -> Option<bool> {
        owner.downcast_ref::<E>().map(|e| (self.get)(e).is_some())
    }

    fn assign(&self, owner: &mut dyn Any, related: Vec<Member>) -> Option<()> {
        let owner = owner.downcast_mut::<E>()?;
        let items = downcast_members::<C::Item>(related)?;
        *(self.get_mut)(owner) = Some(C::from_members(items));
        Some(())
    }

    fn members<'a>(&self, owner: &'a dyn Any) -> Option<Vec<&'a dyn Any>> {
        let owner = owner.downcast_ref::<E>()?;
        Some(match (self.get)(owner) {
            Some(collection) => collection.members().into_iter().map(|t| t as &dyn Any).collect(),
            None => Vec::new(),
        })
    }

    fn take(&self, owner: &mut dyn Any) -> Option<Option<Vec<Member>>> {
        let owner = owner.downcast_mut::<E>()?;
        Some((self.get_mut)(owner).take().map(|collection| {
            collection
                .into_members()
                .into_iter()
                .map(|t| Box::new(t) as Member)
                .collect()
        }))
    }

    fn restore(&self, owner: &mut dyn Any, members: Vec<Member>) -> Option<()> {
        let owner = owner.downcast_mut::<E>()?;
        let items = downcast_members::<C::Item>(members)?;
        *(self.get_mut)(owner) = Some(C::from_members(items));
        Some(())
    }
}

/// Lazily resolvable reference to a relation's target entity type.
#[derive(Clone, Copy)]
pub struct TargetRef {
    type_id: TypeId,
    type_name: &'static str,
    resolve: fn(&Registry) -> Result<Arc<EntityDescriptor>, TideError>,
}

impl TargetRef {
    pub(crate) fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            resolve: resolve_target::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Descriptor of the target, built on first use.
    pub fn descriptor(&self, registry: &Registry) -> Result<Arc<EntityDescriptor>, TideError> {
        (self.resolve)(registry)
    }
}

fn resolve_target<T: Entity>(registry: &Registry) -> Result<Arc<EntityDescriptor>, TideError> {
    registry.resolve::<T>()
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A relation binding, validated and ready for loading and cascading
pub struct RelationDescriptor {
    pub(crate) field: String,
    pub(crate) relation_type: RelationType,
    pub(crate) target: TargetRef,
    pub(crate) ownership: Ownership,
    pub(crate) fetch: FetchPolicy,
    pub(crate) cascade: bool,
    pub(crate) orphan_removal: bool,
    pub(crate) collection: Option<CollectionKind>,
    pub(crate) access: Box<dyn RelationAccess>,
}

impl RelationDescriptor {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn fetch(&self) -> FetchPolicy {
        self.fetch
    }

    pub fn is_eager(&self) -> bool {
        self.fetch == FetchPolicy::Eager
    }

    pub fn is_cascade(&self) -> bool {
        self.cascade
    }

    pub fn is_orphan_removal(&self) -> bool {
        self.orphan_removal
    }

    /// `None` for single-valued relations
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        self.collection
    }

    pub(crate) fn target_descriptor(&self, registry: &Registry) -> Result<Arc<EntityDescriptor>, TideError> {
        self.target.descriptor(registry)
    }

    pub fn is_loaded(&self, owner: &dyn Any) -> Result<bool, TideError> {
        self.access.is_loaded(owner).ok_or_else(|| self.wrong_owner())
    }

    pub(crate) fn assign(&self, owner: &mut dyn Any, related: Vec<Member>) -> Result<(), TideError> {
        self.access.assign(owner, related).ok_or_else(|| self.wrong_slot())
    }

    /// Related instances currently held by the slot
    pub fn members<'a>(&self, owner: &'a dyn Any) -> Result<Vec<&'a dyn Any>, TideError> {
        self.access.members(owner).ok_or_else(|| self.wrong_owner())
    }

    pub(crate) fn take(&self, owner: &mut dyn Any) -> Result<Option<Vec<Member>>, TideError> {
        self.access.take(owner).ok_or_else(|| self.wrong_owner())
    }

    pub(crate) fn restore(&self, owner: &mut dyn Any, members: Vec<Member>) -> Result<(), TideError> {
        self.access.restore(owner, members).ok_or_else(|| self.wrong_slot())
    }

    fn wrong_owner(&self) -> TideError {
        TideError::configuration(format!(
            "relation `{}` was used with an owner of another type",
            self.field
        ))
    }

    fn wrong_slot(&self) -> TideError {
        TideError::configuration(format!(
            "relation `{}` received instances that are not {}",
            self.field, self.target.type_name
        ))
    }
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("field", &self.field)
            .field("relation_type", &self.relation_type)
            .field("target", &self.target)
            .field("ownership", &self.ownership)
            .field("fetch", &self.fetch)
            .field("cascade", &self.cascade)
            .field("orphan_removal", &self.orphan_removal)
            .field("collection", &self.collection)
            .finish()
    }
}
