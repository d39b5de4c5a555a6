//! Runtime data model definitions.
//!
//! Static, declaration-time descriptions of entities and their fields.
//! Table shapes are derived from these models; the compiler never reads them
//! directly except through `shape`.
//!
//! In general:
//! - Entity declarations define *what exists*
//! - `shape` defines *how it maps to tables*

pub mod entity;
pub mod field;

// re-exports
pub use entity::{EntityModel, EntityRef};
pub use field::{FieldAccess, FieldModel, TokenKind};
