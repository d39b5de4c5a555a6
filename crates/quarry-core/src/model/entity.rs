use crate::{model::field::FieldModel, traits::EntityKind};
use std::{any::TypeId, fmt, hash};

///
/// EntityModel
/// Static runtime model for one entity type.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified Rust type path (for diagnostics and metrics).
    pub path: &'static str,
    /// Logical entity name.
    pub name: &'static str,
    /// Physical table name.
    pub table: &'static str,
    /// Ordered field list; order drives column order in projections.
    pub fields: &'static [FieldModel],
}

impl EntityModel {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Key fields in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &'static FieldModel> {
        self.fields.iter().filter(|field| field.key)
    }
}

///
/// EntityRef
///
/// Type-identity handle for an entity: the `TypeId` keys the shape cache,
/// the model carries the static metadata.
///

#[derive(Clone, Copy)]
pub struct EntityRef {
    type_id: TypeId,
    model: &'static EntityModel,
}

impl EntityRef {
    #[must_use]
    pub fn of<E: EntityKind>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            model: E::MODEL,
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.model.path
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.model.name
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({})", self.model.path)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityRef {}

impl hash::Hash for EntityRef {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}
