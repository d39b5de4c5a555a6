use crate::{model::EntityModel, value::Value};

// ============================================================================
// ENTITY SCHEMA
// ============================================================================
//
// These traits describe *what an entity is*; the compiler resolves tables
// and columns from `MODEL` through the shape cache.
//

///
/// EntityKind
/// Declared schema facts for an entity type.
///

pub trait EntityKind: 'static {
    const MODEL: &'static EntityModel;
}

// ============================================================================
// ENTITY VALUES
// ============================================================================
//
// These traits describe *instances* of entities, used by the snapshot
// command helpers.
//

///
/// FieldValues
/// Read one logical field of an entity instance.
///

pub trait FieldValues {
    fn get_value(&self, field: &str) -> Option<Value>;
}

///
/// EntityValue
/// A concrete entity instance that can be written back as a command.
///

pub trait EntityValue: EntityKind + FieldValues {}

impl<T> EntityValue for T where T: EntityKind + FieldValues {}
