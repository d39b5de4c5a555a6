#[cfg(test)]
mod tests;

use crate::model::EntityRef;
use chrono::{DateTime, Utc};
use std::{cmp::Ordering, fmt, sync::Arc};
use uuid::Uuid;

///
/// ScalarKind
/// Column-level scalar family; drives parameter typing and text routing.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
    Bool,
    Bytes,
    Float,
    Guid,
    Int,
    Text,
    Timestamp,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::Float => "float",
            Self::Guid => "guid",
            Self::Int => "int",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
        };
        write!(f, "{label}")
    }
}

///
/// TypeRef
///
/// Static result type carried by every expression node.
/// Entities and records resolve member types by name; `Object` is the
/// escape hatch for values the builder cannot type.
///

#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
    Scalar { kind: ScalarKind, nullable: bool },
    Entity(EntityRef),
    Record(Arc<RecordType>),
    Sequence(Box<Self>),
    Object,
}

impl TypeRef {
    #[must_use]
    pub const fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar {
            kind,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn nullable(kind: ScalarKind) -> Self {
        Self::Scalar {
            kind,
            nullable: true,
        }
    }

    #[must_use]
    pub const fn bool() -> Self {
        Self::scalar(ScalarKind::Bool)
    }

    #[must_use]
    pub const fn int() -> Self {
        Self::scalar(ScalarKind::Int)
    }

    #[must_use]
    pub const fn text() -> Self {
        Self::nullable(ScalarKind::Text)
    }

    #[must_use]
    pub fn sequence(element: Self) -> Self {
        Self::Sequence(Box::new(element))
    }

    #[must_use]
    pub const fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(
            self,
            Self::Scalar {
                kind: ScalarKind::Bool,
                ..
            }
        )
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            Self::Scalar {
                kind: ScalarKind::Text,
                ..
            }
        )
    }

    /// True when the type admits null (nullable scalars and reference-like types).
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        match self {
            Self::Scalar { nullable, .. } => *nullable,
            Self::Entity(_) | Self::Record(_) | Self::Sequence(_) | Self::Object => true,
        }
    }

    #[must_use]
    pub const fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    /// Element type of a sequence, or `Object` for non-sequences.
    #[must_use]
    pub fn element(&self) -> Self {
        match self {
            Self::Sequence(inner) => (**inner).clone(),
            _ => Self::Object,
        }
    }

    /// Same type with nullability stripped (the `.Value` of a nullable scalar).
    #[must_use]
    pub fn non_null(&self) -> Self {
        match self {
            Self::Scalar { kind, .. } => Self::scalar(*kind),
            other => other.clone(),
        }
    }

    /// Same type with nullability added.
    #[must_use]
    pub fn or_null(&self) -> Self {
        match self {
            Self::Scalar { kind, .. } => Self::nullable(*kind),
            other => other.clone(),
        }
    }

    /// Resolve the static type of a named member.
    #[must_use]
    pub fn member(&self, name: &str) -> Self {
        match self {
            Self::Entity(entity) => entity
                .model()
                .field(name)
                .map_or(Self::Object, |field| field.type_ref()),
            Self::Record(record) => record.field(name).cloned().unwrap_or(Self::Object),
            Self::Scalar { nullable: true, .. } if name == "Value" => self.non_null(),
            Self::Scalar { nullable: true, .. } if name == "HasValue" => Self::bool(),
            Self::Scalar {
                kind: ScalarKind::Text,
                ..
            } if name == "Length" => Self::int(),
            _ => Self::Object,
        }
    }

    /// Logical member names exposed by an entity or record type.
    #[must_use]
    pub fn member_names(&self) -> Vec<String> {
        match self {
            Self::Entity(entity) => entity
                .model()
                .fields
                .iter()
                .map(|field| field.name.to_string())
                .collect(),
            Self::Record(record) => record.fields.iter().map(|(name, _)| name.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<ScalarKind> for TypeRef {
    fn from(kind: ScalarKind) -> Self {
        Self::scalar(kind)
    }
}

///
/// RecordType
/// Shape of an anonymous construction (projection records, captured closures).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordType {
    pub fields: Vec<(String, TypeRef)>,
}

impl RecordType {
    #[must_use]
    pub const fn new(fields: Vec<(String, TypeRef)>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&TypeRef> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }
}

///
/// Value
///
/// Runtime value of a compile-time constant: literals, captured variables,
/// in-memory sequences and entity snapshots.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Bytes(Vec<u8>),
    Float(f64),
    Guid(Uuid),
    Int(i64),
    /// In-memory sequence; membership and `Any`/`All` enumerate it eagerly.
    List(Vec<Self>),
    /// Named members of a captured closure or entity snapshot.
    Record(Vec<(String, Self)>),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a named member of a record value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Build a record value from `(name, value)` pairs.
    pub fn record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Best-effort static type of this value.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Self::Null => TypeRef::Object,
            Self::Bool(_) => TypeRef::scalar(ScalarKind::Bool),
            Self::Bytes(_) => TypeRef::nullable(ScalarKind::Bytes),
            Self::Float(_) => TypeRef::scalar(ScalarKind::Float),
            Self::Guid(_) => TypeRef::scalar(ScalarKind::Guid),
            Self::Int(_) => TypeRef::scalar(ScalarKind::Int),
            Self::Text(_) => TypeRef::nullable(ScalarKind::Text),
            Self::Timestamp(_) => TypeRef::scalar(ScalarKind::Timestamp),
            Self::List(items) => TypeRef::sequence(
                items
                    .iter()
                    .find(|item| !item.is_null())
                    .map_or(TypeRef::Object, Self::type_ref),
            ),
            Self::Record(fields) => TypeRef::Record(Arc::new(RecordType::new(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.type_ref()))
                    .collect(),
            ))),
        }
    }

    /// Total order used for constant folding of comparisons.
    /// Mixed int/float compare numerically; other mixed kinds are unordered.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            #[expect(clippy::cast_precision_loss)]
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            #[expect(clippy::cast_precision_loss)]
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            (Self::Guid(a), Self::Guid(b)) => a.partial_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.partial_cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Float(v) => write!(f, "{v}"),
            Self::Guid(g) => write!(f, "{g}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Record(fields) => write!(f, "{{{} fields}}", fields.len()),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

#[macro_export]
macro_rules! impl_value_from {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for $crate::value::Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from! {
    bool          => Bool,
    i8            => Int,
    i16           => Int,
    i32           => Int,
    i64           => Int,
    u8            => Int,
    u16           => Int,
    u32           => Int,
    f32           => Float,
    f64           => Float,
    &str          => Text,
    String        => Text,
    Vec<u8>       => Bytes,
    Uuid          => Guid,
    DateTime<Utc> => Timestamp,
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
