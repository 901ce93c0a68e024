//! Cascading saves and orphan-removing deletes.

use std::any::Any;

use sea_query::Value;

use crate::descriptor::{
    ColumnDescriptor, EntityDescriptor, Ownership, RelationDescriptor, RelationType,
};
use crate::descriptor::relation::Member;
use crate::error::TideError;
use crate::relation::{load, mapped_by_column};
use crate::session::Session;

/// Save the members of every cascade relation of `owner`.
///
/// Members are moved out of their slot for the duration and put back
/// afterwards, also when a save fails.
pub(crate) fn save_cascades(
    session: &mut Session<'_>,
    descriptor: &EntityDescriptor,
    owner: &mut dyn Any,
) -> Result<(), TideError> {
    for relation in descriptor.relations().iter().filter(|r| r.is_cascade()) {
        let Some(mut members) = relation.take(owner)? else {
            continue;
        };
        let saved = save_members(session, descriptor, relation, owner, &mut members);
        relation.restore(owner, members)?;
        saved?;
    }
    Ok(())
}

fn save_members(
    session: &mut Session<'_>,
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    owner: &dyn Any,
    members: &mut [Member],
) -> Result<(), TideError> {
    let target = relation.target_descriptor(session.registry())?;
    let back_reference = back_reference(descriptor, &target, relation, owner)?;

    for member in members.iter_mut() {
        if let Some((column, parent_id)) = &back_reference {
            column.write(member.as_mut(), parent_id.clone())?;
        }
        session.save_erased(&target, member.as_mut())?;
    }
    Ok(())
}

/// For a one-to-many, the member column pointing at the owner and the
/// owner's identity to write into it.
fn back_reference<'t>(
    descriptor: &EntityDescriptor,
    target: &'t EntityDescriptor,
    relation: &RelationDescriptor,
    owner: &dyn Any,
) -> Result<Option<(&'t ColumnDescriptor, Value)>, TideError> {
    let (RelationType::OneToMany, Ownership::Inverse { mapped_by }) =
        (relation.relation_type(), relation.ownership())
    else {
        return Ok(None);
    };
    let name = mapped_by_column(target, mapped_by)?;
    let column = target.column(name).ok_or_else(|| {
        TideError::configuration(format!(
            "column `{name}` is not bound on {}",
            target.type_name()
        ))
    })?;
    Ok(Some((column, descriptor.identity_value(owner)?)))
}

/// Delete, depth first, the current children of every orphan-removal
/// relation of `owner`. The children are read from the store, not from the
/// slot, so an unloaded lazy relation is covered too.
pub(crate) fn remove_orphans(
    session: &mut Session<'_>,
    descriptor: &EntityDescriptor,
    owner: &dyn Any,
) -> Result<(), TideError> {
    for relation in descriptor.relations().iter().filter(|r| r.is_orphan_removal()) {
        let target = relation.target_descriptor(session.registry())?;
        let registry = session.registry();
        let children = load::fetch_related(session.connection(), registry, descriptor, relation, owner)?;
        for child in children.unwrap_or_default() {
            session.delete_erased(&target, child.as_ref())?;
        }
    }
    Ok(())
}
