//! Table shapes: per-entity mapping of logical fields to physical columns.
//!
//! Shapes are immutable once built. `ModelShapes` derives them from static
//! entity models through the process-wide cache in `cache`.

mod cache;


use crate::{
    error::{CompileError, ErrorOrigin},
    model::{EntityModel, EntityRef, FieldAccess, TokenKind},
    value::{ScalarKind, TypeRef},
};
use std::sync::Arc;

// re-exports
pub use cache::{cached_shape_count, shape_for};

///
/// ShapeProvider
///
/// Resolves the table shape for an entity type. Implementations must be safe
/// to call from concurrent compiles.
///

pub trait ShapeProvider: Send + Sync {
    fn resolve(&self, entity: EntityRef) -> Result<Arc<TableShape>, CompileError>;
}

///
/// ModelShapes
/// Default provider: derive shapes from `EntityModel` statics, cached per type.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct ModelShapes;

impl ShapeProvider for ModelShapes {
    fn resolve(&self, entity: EntityRef) -> Result<Arc<TableShape>, CompileError> {
        shape_for(entity)
    }
}

///
/// ColumnShape
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnShape {
    pub field: String,
    pub column: String,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub access: FieldAccess,
}

impl ColumnShape {
    #[must_use]
    pub const fn type_ref(&self) -> TypeRef {
        TypeRef::Scalar {
            kind: self.kind,
            nullable: self.nullable,
        }
    }

    /// True when the physical column name differs from the logical name.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.field != self.column
    }
}

///
/// TokenColumn
///

#[derive(Clone, Copy, Debug)]
pub struct TokenColumn {
    pub field: &'static str,
    pub kind: TokenKind,
}

///
/// TableShape
///
/// Table name, ordered columns, key fields and token columns for one entity.
/// The read / write views filter `columns` by access.
///

#[derive(Clone, Debug)]
pub struct TableShape {
    pub entity: &'static str,
    pub table: String,
    pub columns: Vec<ColumnShape>,
    pub keys: Vec<String>,
    pub tokens: Vec<TokenColumn>,
}

impl TableShape {
    /// Build a shape from a static model.
    pub fn from_model(model: &EntityModel) -> Result<Self, CompileError> {
        if model.table.trim().is_empty() {
            return Err(CompileError::syntax(
                ErrorOrigin::Shape,
                format!("entity '{}' has an empty table name", model.path),
            ));
        }

        let columns = model
            .fields
            .iter()
            .map(|field| ColumnShape {
                field: field.name.to_string(),
                column: field.column_name().to_string(),
                kind: field.kind,
                nullable: field.nullable,
                access: field.access,
            })
            .collect();
        let keys = model.keys().map(|field| field.name.to_string()).collect();
        let tokens = model
            .fields
            .iter()
            .filter_map(|field| {
                field.token.map(|kind| TokenColumn {
                    field: field.name,
                    kind,
                })
            })
            .collect();

        Ok(Self {
            entity: model.path,
            table: model.table.to_string(),
            columns,
            keys,
            tokens,
        })
    }

    #[must_use]
    pub fn column(&self, field: &str) -> Option<&ColumnShape> {
        self.columns.iter().find(|column| column.field == field)
    }

    /// Readable view: columns that may appear in projections and predicates.
    pub fn read_columns(&self) -> impl Iterator<Item = &ColumnShape> {
        self.columns.iter().filter(|column| column.access.readable())
    }

    /// Writable view: columns that may be assigned by commands.
    pub fn write_columns(&self) -> impl Iterator<Item = &ColumnShape> {
        self.columns.iter().filter(|column| column.access.writable())
    }

    /// Resolve a field for reading.
    pub fn readable(&self, field: &str) -> Result<&ColumnShape, CompileError> {
        let column = self.require(field)?;
        if !column.access.readable() {
            return Err(CompileError::field_access(self.entity, field, "readable"));
        }

        Ok(column)
    }

    /// Resolve a field for writing.
    pub fn writable(&self, field: &str) -> Result<&ColumnShape, CompileError> {
        let column = self.require(field)?;
        if !column.access.writable() {
            return Err(CompileError::field_access(self.entity, field, "writable"));
        }

        Ok(column)
    }

    /// Key columns in declaration order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnShape> {
        self.keys.iter().filter_map(|key| self.column(key))
    }

    #[must_use]
    pub fn is_key(&self, field: &str) -> bool {
        self.keys.iter().any(|key| key == field)
    }

    #[must_use]
    pub fn token(&self, field: &str) -> Option<&TokenColumn> {
        self.tokens.iter().find(|token| token.field == field)
    }

    fn require(&self, field: &str) -> Result<&ColumnShape, CompileError> {
        self.column(field).ok_or_else(|| {
            CompileError::unsupported(
                ErrorOrigin::Shape,
                format!("field '{field}' not found on '{}'", self.entity),
            )
        })
    }
}
