use crate::value::{ScalarKind, TypeRef, Value};
use std::fmt;

///
/// FieldModel
/// Runtime field metadata used by shape resolution.
///
/// Built with const builders so entity declarations stay `static`:
///
/// `FieldModel::new("Id", ScalarKind::Int).column("uid").key()`
///

#[derive(Clone, Copy, Debug)]
pub struct FieldModel {
    /// Logical field name, as used by member access.
    pub name: &'static str,
    /// Physical column name; `None` means same as `name`.
    pub column: Option<&'static str>,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub access: FieldAccess,
    /// Part of the entity key.
    pub key: bool,
    /// Auto-populated value source, if any.
    pub token: Option<TokenKind>,
}

impl FieldModel {
    #[must_use]
    pub const fn new(name: &'static str, kind: ScalarKind) -> Self {
        Self {
            name,
            column: None,
            kind,
            nullable: false,
            access: FieldAccess::ReadWrite,
            key: false,
            token: None,
        }
    }

    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn key(mut self) -> Self {
        self.key = true;
        self
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.access = FieldAccess::Read;
        self
    }

    #[must_use]
    pub const fn write_only(mut self) -> Self {
        self.access = FieldAccess::Write;
        self
    }

    #[must_use]
    pub const fn token(mut self, token: TokenKind) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub const fn column_name(&self) -> &'static str {
        match self.column {
            Some(column) => column,
            None => self.name,
        }
    }

    #[must_use]
    pub const fn type_ref(&self) -> TypeRef {
        TypeRef::Scalar {
            kind: self.kind,
            nullable: self.nullable,
        }
    }
}

///
/// FieldAccess
/// Which column views a field participates in.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldAccess {
    Read,
    Write,
    ReadWrite,
}

impl FieldAccess {
    #[must_use]
    pub const fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

///
/// TokenKind
///
/// Auto-value source for a token column. Identity columns are generated by
/// the database and never written; every other kind is filled in by the
/// command compiler when the caller leaves the column unbound.
///

#[derive(Clone, Copy)]
pub enum TokenKind {
    Identity,
    Guid,
    Timestamp,
    Version,
    Custom(fn() -> Value),
}

impl TokenKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Guid => "guid",
            Self::Timestamp => "timestamp",
            Self::Version => "version",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKind::{}", self.label())
    }
}
