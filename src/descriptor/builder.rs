//! Binding API used inside [`Entity::describe`].
//!
//! ```rust,ignore
//! impl Entity for Order {
//!     fn describe(def: &mut EntityDef<Self>) {
//!         def.table("orders");
//!         def.id("id", |o| &o.id, |o| &mut o.id).generated();
//!         def.column("total", |o| &o.total, |o| &mut o.total);
//!         def.many_to_one("customer", |o| &o.customer, |o| &mut o.customer)
//!             .join_column("customer_id");
//!         def.one_to_many("lines", |o| &o.lines, |o| &mut o.lines)
//!             .mapped_by("order_id")
//!             .cascade()
//!             .orphan_removal();
//!     }
//! }
//! ```
//!
//! Bindings are only recorded here; [`EntityDef::compile`] validates them
//! when the registry builds the descriptor.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::descriptor::column::{ColumnAccess, ColumnDescriptor, FieldAccess};
use crate::descriptor::entity::EntityDescriptor;
use crate::descriptor::relation::{
    CollectionKind, CollectionSlot, EntityCollection, FetchPolicy, JoinTable, Ownership,
    RelationAccess, RelationDescriptor, RelationType, SingleSlot, TargetRef,
};
use crate::descriptor::Entity;
use crate::error::TideError;
use crate::value::{FieldValue, ValueKind};

/// A recorded column binding
pub struct ColumnBinding {
    field: String,
    name: String,
    kind: ValueKind,
    identity: bool,
    generated: bool,
    insertable: bool,
    updatable: bool,
    access: Box<dyn ColumnAccess>,
}

impl ColumnBinding {
    /// Mark the identity as assigned by the store; it is then left out of
    /// INSERT statements and read back from the insert's result.
    pub fn generated(&mut self) -> &mut Self {
        self.generated = true;
        self
    }

    /// Rust field identifier, when it differs from the column label.
    /// `mapped_by` on the other side of a relation refers to this name.
    pub fn field(&mut self, field: &str) -> &mut Self {
        self.field = field.to_string();
        self
    }

    pub fn insertable(&mut self, insertable: bool) -> &mut Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(&mut self, updatable: bool) -> &mut Self {
        self.updatable = updatable;
        self
    }
}

/// A recorded relation binding
pub struct RelationBinding {
    field: String,
    relation_type: RelationType,
    target: TargetRef,
    join_column: Option<String>,
    mapped_by: Option<String>,
    join_table: Option<JoinTable>,
    fetch: Option<FetchPolicy>,
    cascade: bool,
    orphan_removal: bool,
    collection: Option<CollectionKind>,
    access: Box<dyn RelationAccess>,
}

impl RelationBinding {
    /// Foreign-key column on the owner's table (owning side). Defaults to
    /// `<field>_id`.
    pub fn join_column(&mut self, column: &str) -> &mut Self {
        self.join_column = Some(column.to_string());
        self
    }

    /// Target field pointing back at this entity (inverse side).
    pub fn mapped_by(&mut self, field: &str) -> &mut Self {
        self.mapped_by = Some(field.to_string());
        self
    }

    /// Bridge table of a many-to-many relation.
    pub fn join_table(&mut self, table: &str, owner_column: &str, inverse_column: &str) -> &mut Self {
        self.join_table = Some(JoinTable {
            table: table.to_string(),
            owner_column: owner_column.to_string(),
            inverse_column: inverse_column.to_string(),
        });
        self
    }

    pub fn eager(&mut self) -> &mut Self {
        self.fetch = Some(FetchPolicy::Eager);
        self
    }

    pub fn lazy(&mut self) -> &mut Self {
        self.fetch = Some(FetchPolicy::Lazy);
        self
    }

    /// Save related instances together with the owner.
    pub fn cascade(&mut self) -> &mut Self {
        self.cascade = true;
        self
    }

    /// Delete related instances before the owner (one-to-many only).
    pub fn orphan_removal(&mut self) -> &mut Self {
        self.orphan_removal = true;
        self
    }
}

/// Collects the bindings of entity type `E`
pub struct EntityDef<E: Entity> {
    table: Option<String>,
    schema: Option<String>,
    columns: Vec<ColumnBinding>,
    relations: Vec<RelationBinding>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for EntityDef<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn new_instance<E: Entity>() -> Box<dyn Any + Send> {
    Box::new(E::default())
}

impl<E: Entity> EntityDef<E> {
    pub fn new() -> Self {
        Self {
            table: None,
            schema: None,
            columns: Vec::new(),
            relations: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    /// Qualify the table with a schema
    pub fn schema(&mut self, schema: &str) -> &mut Self {
        self.schema = Some(schema.to_string());
        self
    }

    /// Bind the identity column.
    pub fn id<F: FieldValue>(
        &mut self,
        column: &str,
        get: fn(&E) -> &F,
        get_mut: fn(&mut E) -> &mut F,
    ) -> &mut ColumnBinding {
        self.push_column(column, true, get, get_mut)
    }

    /// Bind a plain column. The field identifier defaults to the column label.
    pub fn column<F: FieldValue>(
        &mut self,
        column: &str,
        get: fn(&E) -> &F,
        get_mut: fn(&mut E) -> &mut F,
    ) -> &mut ColumnBinding {
        self.push_column(column, false, get, get_mut)
    }

    fn push_column<F: FieldValue>(
        &mut self,
        column: &str,
        identity: bool,
        get: fn(&E) -> &F,
        get_mut: fn(&mut E) -> &mut F,
    ) -> &mut ColumnBinding {
        self.columns.push(ColumnBinding {
            field: column.to_string(),
            name: column.to_string(),
            kind: F::KIND,
            identity,
            generated: false,
            insertable: true,
            updatable: true,
            access: Box::new(FieldAccess { get, get_mut }),
        });
        let idx = self.columns.len() - 1;
        &mut self.columns[idx]
    }

    /// Single-valued relation where this table holds the foreign key.
    /// Eager unless told otherwise.
    pub fn many_to_one<T: Entity>(
        &mut self,
        field: &str,
        get: fn(&E) -> &Option<Box<T>>,
        get_mut: fn(&mut E) -> &mut Option<Box<T>>,
    ) -> &mut RelationBinding {
        self.push_single(field, RelationType::ManyToOne, get, get_mut)
    }

    /// Single-valued relation, owning (`join_column`) or inverse (`mapped_by`).
    /// Eager unless told otherwise.
    pub fn one_to_one<T: Entity>(
        &mut self,
        field: &str,
        get: fn(&E) -> &Option<Box<T>>,
        get_mut: fn(&mut E) -> &mut Option<Box<T>>,
    ) -> &mut RelationBinding {
        self.push_single(field, RelationType::OneToOne, get, get_mut)
    }

    /// Collection of targets pointing back through `mapped_by`. Lazy unless
    /// told otherwise.
    pub fn one_to_many<C: EntityCollection>(
        &mut self,
        field: &str,
        get: fn(&E) -> &Option<C>,
        get_mut: fn(&mut E) -> &mut Option<C>,
    ) -> &mut RelationBinding {
        self.push_collection(field, RelationType::OneToMany, get, get_mut)
    }

    /// Collection linked through a `join_table`. Lazy unless told otherwise.
    pub fn many_to_many<C: EntityCollection>(
        &mut self,
        field: &str,
        get: fn(&E) -> &Option<C>,
        get_mut: fn(&mut E) -> &mut Option<C>,
    ) -> &mut RelationBinding {
        self.push_collection(field, RelationType::ManyToMany, get, get_mut)
    }

    fn push_single<T: Entity>(
        &mut self,
        field: &str,
        relation_type: RelationType,
        get: fn(&E) -> &Option<Box<T>>,
        get_mut: fn(&mut E) -> &mut Option<Box<T>>,
    ) -> &mut RelationBinding {
        self.push_relation(
            field,
            relation_type,
            TargetRef::of::<T>(),
            None,
            Box::new(SingleSlot { get, get_mut }),
        )
    }

    fn push_collection<C: EntityCollection>(
        &mut self,
        field: &str,
        relation_type: RelationType,
        get: fn(&E) -> &Option<C>,
        get_mut: fn(&mut E) -> &mut Option<C>,
    ) -> &mut RelationBinding {
        self.push_relation(
            field,
            relation_type,
            TargetRef::of::<C::Item>(),
            Some(C::KIND),
            Box::new(CollectionSlot { get, get_mut }),
        )
    }

    fn push_relation(
        &mut self,
        field: &str,
        relation_type: RelationType,
        target: TargetRef,
        collection: Option<CollectionKind>,
        access: Box<dyn RelationAccess>,
    ) -> &mut RelationBinding {
        self.relations.push(RelationBinding {
            field: field.to_string(),
            relation_type,
            target,
            join_column: None,
            mapped_by: None,
            join_table: None,
            fetch: None,
            cascade: false,
            orphan_removal: false,
            collection,
            access,
        });
        let idx = self.relations.len() - 1;
        &mut self.relations[idx]
    }

    /// Validate the recorded bindings and produce the descriptor.
    ///
    /// # Errors
    ///
    /// `TideError::Configuration` when the table or identity binding is
    /// missing, a column or field is bound twice, or a relation references a
    /// join column that is not bound or lacks the mapping it needs.
    pub fn compile(self) -> Result<EntityDescriptor, TideError> {
        let type_name = std::any::type_name::<E>();

        let table = self
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TideError::configuration(format!("{type_name} has no table binding")))?;
        let table = match self.schema.filter(|s| !s.trim().is_empty()) {
            Some(schema) => format!("{schema}.{table}"),
            None => table,
        };

        let mut identity = None;
        let mut column_by_name = HashMap::new();
        let mut column_by_field = HashMap::new();
        let mut columns = Vec::with_capacity(self.columns.len());

        for (idx, binding) in self.columns.into_iter().enumerate() {
            if binding.identity {
                if identity.is_some() {
                    return Err(TideError::configuration(format!(
                        "{type_name} binds more than one identity column"
                    )));
                }
                identity = Some((idx, binding.generated));
            } else if binding.generated {
                return Err(TideError::configuration(format!(
                    "column `{}` of {type_name} is marked generated but is not the identity",
                    binding.name
                )));
            }
            if column_by_name.insert(binding.name.clone(), idx).is_some() {
                return Err(TideError::configuration(format!(
                    "column `{}` is bound twice on {type_name}",
                    binding.name
                )));
            }
            if column_by_field.insert(binding.field.clone(), idx).is_some() {
                return Err(TideError::configuration(format!(
                    "field `{}` is bound twice on {type_name}",
                    binding.field
                )));
            }
            columns.push(ColumnDescriptor {
                field: binding.field,
                name: binding.name,
                kind: binding.kind,
                insertable: binding.insertable,
                updatable: binding.updatable,
                access: binding.access,
            });
        }

        let (identity, identity_generated) = identity
            .ok_or_else(|| TideError::configuration(format!("{type_name} has no identity binding")))?;

        let mut relation_by_field = HashMap::new();
        let mut relations = Vec::with_capacity(self.relations.len());
        for (idx, binding) in self.relations.into_iter().enumerate() {
            if column_by_field.contains_key(&binding.field)
                || relation_by_field.insert(binding.field.clone(), idx).is_some()
            {
                return Err(TideError::configuration(format!(
                    "field `{}` is bound twice on {type_name}",
                    binding.field
                )));
            }
            relations.push(compile_relation(type_name, binding, &column_by_name)?);
        }

        Ok(EntityDescriptor {
            type_id: TypeId::of::<E>(),
            type_name,
            table,
            columns,
            identity,
            identity_generated,
            relations,
            column_by_name,
            column_by_field,
            relation_by_field,
            factory: new_instance::<E>,
        })
    }
}

fn compile_relation(
    type_name: &str,
    binding: RelationBinding,
    column_by_name: &HashMap<String, usize>,
) -> Result<RelationDescriptor, TideError> {
    let field = binding.field;
    let relation_type = binding.relation_type;

    let owning = |join_column: Option<String>| -> Result<Ownership, TideError> {
        let join_column = join_column.unwrap_or_else(|| format!("{field}_id"));
        if !column_by_name.contains_key(&join_column) {
            return Err(TideError::configuration(format!(
                "join column `{join_column}` of relation `{field}` is not a bound column of {type_name}"
            )));
        }
        Ok(Ownership::Owning { join_column })
    };

    let ownership = match relation_type {
        RelationType::ManyToOne => {
            if binding.mapped_by.is_some() {
                return Err(TideError::configuration(format!(
                    "many-to-one relation `{field}` of {type_name} cannot be mapped by the other side"
                )));
            }
            owning(binding.join_column)?
        }
        RelationType::OneToOne => match (binding.mapped_by, binding.join_column) {
            (Some(_), Some(_)) => {
                return Err(TideError::configuration(format!(
                    "one-to-one relation `{field}` of {type_name} sets both a join column and mapped_by"
                )))
            }
            (Some(mapped_by), None) => Ownership::Inverse { mapped_by },
            (None, join_column) => owning(join_column)?,
        },
        RelationType::OneToMany => {
            let mapped_by = binding.mapped_by.ok_or_else(|| {
                TideError::configuration(format!(
                    "one-to-many relation `{field}` of {type_name} needs mapped_by"
                ))
            })?;
            Ownership::Inverse { mapped_by }
        }
        RelationType::ManyToMany => {
            let join_table = binding.join_table.ok_or_else(|| {
                TideError::configuration(format!(
                    "many-to-many relation `{field}` of {type_name} needs a join table"
                ))
            })?;
            Ownership::Bridge(join_table)
        }
    };

    let orphan_removal = if binding.orphan_removal && relation_type != RelationType::OneToMany {
        log::warn!("orphan removal on {relation_type} relation `{field}` of {type_name} is ignored");
        false
    } else {
        binding.orphan_removal
    };

    Ok(RelationDescriptor {
        fetch: binding.fetch.unwrap_or_else(|| relation_type.default_fetch()),
        field,
        relation_type,
        target: binding.target,
        ownership,
        cascade: binding.cascade,
        orphan_removal,
        collection: binding.collection,
        access: binding.access,
    })
}
