//! Typed composition API.
//!
//! `Query` and `Command` wrap a chain of method-call nodes rooted at a table;
//! the combinators on `Expr` build lambda bodies. Nothing here validates
//! chain order: the compilers reject illegal shapes.

use crate::{
    expr::{
        BinaryOp, CustomMethod, Expr, Lambda, Method, MethodCall, Param, SwitchCase, UnaryOp,
        UnsupportedNode,
    },
    model::{EntityRef, FieldAccess},
    traits::{EntityKind, EntityValue},
    value::{RecordType, ScalarKind, TypeRef, Value},
};
use chrono::{DateTime, Utc};
use derive_more::Deref;
use std::sync::Arc;
use uuid::Uuid;

///
/// IntoExpr
/// Conversion used by every builder operand: expressions pass through,
/// plain values become constants.
///

pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::constant(self)
    }
}

macro_rules! impl_into_expr {
    ( $( $type:ty ),* $(,)? ) => {
        $(
            impl IntoExpr for $type {
                fn into_expr(self) -> Expr {
                    Expr::constant(Value::from(self))
                }
            }
        )*
    };
}

impl_into_expr!(bool, i32, i64, u32, f64, &str, String, Uuid, DateTime<Utc>);

impl<T: Into<Value>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::constant(Value::from(self))
    }
}

// ----------------------------------------------------------------------------
// Node constructors and combinators
// ----------------------------------------------------------------------------

#[allow(clippy::should_implement_trait)]
impl Expr {
    /// Literal constant typed from its value.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.type_ref();

        Self::Constant { value, ty }
    }

    /// Literal constant with an explicit static type.
    pub fn typed_constant(value: impl Into<Value>, ty: TypeRef) -> Self {
        Self::Constant {
            value: value.into(),
            ty,
        }
    }

    /// Literal null.
    #[must_use]
    pub const fn null() -> Self {
        Self::Constant {
            value: Value::Null,
            ty: TypeRef::Object,
        }
    }

    /// Captured variable: member `name` of a constant closure record.
    /// Folds to a parameter named after the variable.
    pub fn captured(name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = match &value {
            Value::Null => TypeRef::Object,
            other => other.type_ref(),
        };
        let closure = Self::Constant {
            ty: TypeRef::Record(Arc::new(RecordType::new(vec![(
                name.to_string(),
                ty.clone(),
            )]))),
            value: Value::Record(vec![(name.to_string(), value)]),
        };

        Self::Member {
            target: Box::new(closure),
            name: name.to_string(),
            ty,
        }
    }

    /// In-memory sequence constant.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::constant(Value::List(values.into_iter().map(Into::into).collect()))
    }

    /// Captured in-memory sequence (named like a captured variable).
    pub fn captured_list<I, V>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::captured(
            name,
            Value::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Free-standing lambda parameter node.
    pub fn param(name: &str, ty: TypeRef) -> Self {
        Self::Parameter(Param::new(name, ty))
    }

    /// Member access; the type resolves through the target's entity or record.
    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        Self::Member {
            ty: self.ty().member(name),
            target: Box::new(self.clone()),
            name: name.to_string(),
        }
    }

    /// `.Value` of a nullable scalar.
    #[must_use]
    pub fn value(&self) -> Self {
        self.field("Value")
    }

    /// `.HasValue` of a nullable scalar.
    #[must_use]
    pub fn has_value(&self) -> Self {
        self.field("HasValue")
    }

    /// `.Length` of a text value.
    #[must_use]
    pub fn length(&self) -> Self {
        self.field("Length")
    }

    fn binary(self, op: BinaryOp, rhs: impl IntoExpr, ty: TypeRef) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
            ty,
        }
    }

    fn compare(self, op: BinaryOp, rhs: impl IntoExpr) -> Self {
        self.binary(op, rhs, TypeRef::bool())
    }

    #[must_use]
    pub fn eq(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Eq, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Ne, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Lt, rhs)
    }

    #[must_use]
    pub fn le(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Le, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Gt, rhs)
    }

    #[must_use]
    pub fn ge(self, rhs: impl IntoExpr) -> Self {
        self.compare(BinaryOp::Ge, rhs)
    }

    #[must_use]
    pub fn and(self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::And, rhs, TypeRef::bool())
    }

    #[must_use]
    pub fn or(self, rhs: impl IntoExpr) -> Self {
        self.binary(BinaryOp::Or, rhs, TypeRef::bool())
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
            ty: TypeRef::bool(),
        }
    }

    fn arithmetic(self, op: BinaryOp, rhs: impl IntoExpr) -> Self {
        let rhs = rhs.into_expr();
        let ty = match (self.ty(), rhs.ty()) {
            (left, _) if left.is_text() => left,
            (
                TypeRef::Scalar {
                    kind: ScalarKind::Float,
                    nullable,
                },
                _,
            )
            | (
                _,
                TypeRef::Scalar {
                    kind: ScalarKind::Float,
                    nullable,
                },
            ) => TypeRef::Scalar {
                kind: ScalarKind::Float,
                nullable,
            },
            (left, _) => left,
        };

        self.binary(op, rhs, ty)
    }

    /// `+`; text operands lower to the dialect's concatenation.
    #[must_use]
    pub fn add(self, rhs: impl IntoExpr) -> Self {
        self.arithmetic(BinaryOp::Add, rhs)
    }

    #[must_use]
    pub fn sub(self, rhs: impl IntoExpr) -> Self {
        self.arithmetic(BinaryOp::Sub, rhs)
    }

    #[must_use]
    pub fn mul(self, rhs: impl IntoExpr) -> Self {
        self.arithmetic(BinaryOp::Mul, rhs)
    }

    #[must_use]
    pub fn div(self, rhs: impl IntoExpr) -> Self {
        self.arithmetic(BinaryOp::Div, rhs)
    }

    #[must_use]
    pub fn rem(self, rhs: impl IntoExpr) -> Self {
        self.arithmetic(BinaryOp::Rem, rhs)
    }

    #[must_use]
    pub fn neg(self) -> Self {
        let ty = self.ty();
        Self::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
            ty,
        }
    }

    /// Static conversion to `ty`.
    #[must_use]
    pub fn convert(self, ty: TypeRef) -> Self {
        Self::Unary {
            op: UnaryOp::Convert,
            operand: Box::new(self),
            ty,
        }
    }

    /// `left ?? right`.
    #[must_use]
    pub fn coalesce(self, rhs: impl IntoExpr) -> Self {
        let rhs = rhs.into_expr();
        let ty = rhs.ty();

        Self::Coalesce {
            left: Box::new(self),
            right: Box::new(rhs),
            ty,
        }
    }

    /// `test ? if_true : if_false`.
    pub fn conditional(test: impl IntoExpr, if_true: impl IntoExpr, if_false: impl IntoExpr) -> Self {
        let if_true = if_true.into_expr();
        let ty = if_true.ty();

        Self::Conditional {
            test: Box::new(test.into_expr()),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false.into_expr()),
            ty,
        }
    }

    /// `switch (value) { case ... }` with an optional default arm.
    pub fn switch<I>(value: impl IntoExpr, cases: I, default: Option<Self>) -> Self
    where
        I: IntoIterator<Item = (Vec<Self>, Self)>,
    {
        let cases: Vec<SwitchCase> = cases
            .into_iter()
            .map(|(tests, body)| SwitchCase { tests, body })
            .collect();
        let ty = cases
            .first()
            .map(|case| case.body.ty())
            .or_else(|| default.as_ref().map(Self::ty))
            .unwrap_or(TypeRef::Object);

        Self::Switch {
            value: Box::new(value.into_expr()),
            cases,
            default: default.map(Box::new),
            ty,
        }
    }

    /// Anonymous construction; the record type is inferred from the bindings.
    pub fn new_record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        let fields: Vec<(String, Self)> = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let record = RecordType::new(
            fields
                .iter()
                .map(|(name, expr)| (name.clone(), expr.ty()))
                .collect(),
        );

        Self::New {
            fields,
            ty: TypeRef::Record(Arc::new(record)),
        }
    }

    /// Entity construction with member bindings.
    pub fn member_init<E, I, K>(bindings: I) -> Self
    where
        E: EntityKind,
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::MemberInit {
            ty: TypeRef::Entity(EntityRef::of::<E>()),
            bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Node kinds without a SQL lowering; compiling one always fails.
    #[must_use]
    pub const fn unsupported(kind: UnsupportedNode) -> Self {
        Self::Unsupported(kind)
    }

    /// Generic method-call node.
    pub fn call(method: Method, target: Option<Self>, args: Vec<Self>, ty: TypeRef) -> Self {
        Self::Call(Box::new(MethodCall {
            method,
            target,
            args,
            ty,
        }))
    }

    /// Application-defined call routed through dialect rewriters.
    pub fn custom(method: CustomMethod, operands: Vec<Self>, ty: TypeRef) -> Self {
        Self::call(Method::Custom(method), None, operands, ty)
    }

    /// `date.AddDays(days)`.
    #[must_use]
    pub fn add_days(self, days: impl IntoExpr) -> Self {
        let ty = self.ty();
        Self::custom(CustomMethod::ADD_DAYS, vec![self, days.into_expr()], ty)
    }

    /// The database server's current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self::custom(
            CustomMethod::NOW,
            Vec::new(),
            TypeRef::scalar(ScalarKind::Timestamp),
        )
    }

    fn text_call(self, method: Method, args: Vec<Self>, ty: TypeRef) -> Self {
        Self::call(method, Some(self), args, ty)
    }

    #[must_use]
    pub fn starts_with(self, pattern: impl IntoExpr) -> Self {
        self.text_call(Method::StartsWith, vec![pattern.into_expr()], TypeRef::bool())
    }

    #[must_use]
    pub fn ends_with(self, pattern: impl IntoExpr) -> Self {
        self.text_call(Method::EndsWith, vec![pattern.into_expr()], TypeRef::bool())
    }

    /// Text containment (`LIKE`) or sequence membership, by receiver type.
    #[must_use]
    pub fn contains(self, item: impl IntoExpr) -> Self {
        self.text_call(Method::Contains, vec![item.into_expr()], TypeRef::bool())
    }

    /// `string.IsNullOrEmpty(self)`.
    #[must_use]
    pub fn is_null_or_empty(self) -> Self {
        Self::call(Method::IsNullOrEmpty, None, vec![self], TypeRef::bool())
    }

    #[must_use]
    pub fn substring(self, start: impl IntoExpr) -> Self {
        self.text_call(Method::Substring, vec![start.into_expr()], TypeRef::text())
    }

    #[must_use]
    pub fn substring_len(self, start: impl IntoExpr, length: impl IntoExpr) -> Self {
        self.text_call(
            Method::Substring,
            vec![start.into_expr(), length.into_expr()],
            TypeRef::text(),
        )
    }

    #[must_use]
    pub fn trim(self) -> Self {
        self.text_call(Method::Trim, Vec::new(), TypeRef::text())
    }

    #[must_use]
    pub fn trim_start(self) -> Self {
        self.text_call(Method::TrimStart, Vec::new(), TypeRef::text())
    }

    #[must_use]
    pub fn trim_end(self) -> Self {
        self.text_call(Method::TrimEnd, Vec::new(), TypeRef::text())
    }

    #[must_use]
    pub fn to_upper(self) -> Self {
        self.text_call(Method::ToUpper, Vec::new(), TypeRef::text())
    }

    #[must_use]
    pub fn to_lower(self) -> Self {
        self.text_call(Method::ToLower, Vec::new(), TypeRef::text())
    }

    #[must_use]
    pub fn index_of(self, needle: impl IntoExpr) -> Self {
        self.text_call(Method::IndexOf, vec![needle.into_expr()], TypeRef::int())
    }

    #[must_use]
    pub fn index_of_from(self, needle: impl IntoExpr, start: impl IntoExpr) -> Self {
        self.text_call(
            Method::IndexOf,
            vec![needle.into_expr(), start.into_expr()],
            TypeRef::int(),
        )
    }

    #[must_use]
    pub fn index_of_range(
        self,
        needle: impl IntoExpr,
        start: impl IntoExpr,
        count: impl IntoExpr,
    ) -> Self {
        self.text_call(
            Method::IndexOf,
            vec![needle.into_expr(), start.into_expr(), count.into_expr()],
            TypeRef::int(),
        )
    }

    /// `Any()` over an in-memory sequence.
    #[must_use]
    pub fn exists(self) -> Self {
        Self::call(Method::Any, Some(self), Vec::new(), TypeRef::bool())
    }

    /// `Any(pred)` over an in-memory sequence.
    #[must_use]
    pub fn any_where(self, name: &str, f: impl FnOnce(&Self) -> Self) -> Self {
        let lambda = Lambda::unary(name, self.ty().element(), f);
        Self::call(
            Method::Any,
            Some(self),
            vec![Self::Lambda(lambda)],
            TypeRef::bool(),
        )
    }

    /// `All(pred)` over an in-memory sequence.
    #[must_use]
    pub fn all_where(self, name: &str, f: impl FnOnce(&Self) -> Self) -> Self {
        let lambda = Lambda::unary(name, self.ty().element(), f);
        Self::call(
            Method::All,
            Some(self),
            vec![Self::Lambda(lambda)],
            TypeRef::bool(),
        )
    }

    /// `Count()` over an in-memory sequence.
    #[must_use]
    pub fn count(self) -> Self {
        Self::call(Method::Count, Some(self), Vec::new(), TypeRef::int())
    }
}

// ----------------------------------------------------------------------------
// Query
// ----------------------------------------------------------------------------

///
/// Query
///
/// A read-query chain. Operators return a new `Query`; terminal operators
/// return the finished `Expr`. Dereferences to the underlying tree so it can
/// be passed straight to the compiler.
///

#[derive(Clone, Debug, Deref)]
pub struct Query {
    expr: Expr,
}

impl Query {
    /// Root a query at an entity's table.
    #[must_use]
    pub fn table<E: EntityKind>() -> Self {
        Self {
            expr: Expr::Table {
                entity: EntityRef::of::<E>(),
            },
        }
    }

    /// Wrap an existing query-shaped tree.
    #[must_use]
    pub const fn from_expr(expr: Expr) -> Self {
        Self { expr }
    }

    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// Element type of the sequence this query produces.
    #[must_use]
    pub fn element(&self) -> TypeRef {
        self.expr.ty().element()
    }

    fn lambda(&self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        Expr::Lambda(Lambda::unary(name, self.element(), f))
    }

    fn chain(self, method: Method, args: Vec<Expr>, element: TypeRef) -> Self {
        Self {
            expr: Expr::call(method, Some(self.expr), args, TypeRef::sequence(element)),
        }
    }

    fn same(self, method: Method, args: Vec<Expr>) -> Self {
        let element = self.element();
        self.chain(method, args, element)
    }

    fn terminal(self, method: Method, args: Vec<Expr>, ty: TypeRef) -> Expr {
        Expr::call(method, Some(self.expr), args, ty)
    }

    #[must_use]
    pub fn filter(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let predicate = self.lambda(name, f);
        self.same(Method::Where, vec![predicate])
    }

    #[must_use]
    pub fn select(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let selector = self.lambda(name, f);
        let element = selector.ty();
        self.chain(Method::Select, vec![selector], element)
    }

    #[must_use]
    pub fn order_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let key = self.lambda(name, f);
        self.same(Method::OrderBy, vec![key])
    }

    #[must_use]
    pub fn order_by_desc(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let key = self.lambda(name, f);
        self.same(Method::OrderByDescending, vec![key])
    }

    #[must_use]
    pub fn then_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let key = self.lambda(name, f);
        self.same(Method::ThenBy, vec![key])
    }

    #[must_use]
    pub fn then_by_desc(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let key = self.lambda(name, f);
        self.same(Method::ThenByDescending, vec![key])
    }

    #[must_use]
    pub fn reverse(self) -> Self {
        self.same(Method::Reverse, Vec::new())
    }

    #[must_use]
    pub fn take(self, count: impl IntoExpr) -> Self {
        self.same(Method::Take, vec![count.into_expr()])
    }

    #[must_use]
    pub fn skip(self, count: impl IntoExpr) -> Self {
        self.same(Method::Skip, vec![count.into_expr()])
    }

    #[must_use]
    pub fn take_while(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let predicate = self.lambda(name, f);
        self.same(Method::TakeWhile, vec![predicate])
    }

    #[must_use]
    pub fn skip_while(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let predicate = self.lambda(name, f);
        self.same(Method::SkipWhile, vec![predicate])
    }

    #[must_use]
    pub fn take_last(self, count: impl IntoExpr) -> Self {
        self.same(Method::TakeLast, vec![count.into_expr()])
    }

    #[must_use]
    pub fn skip_last(self, count: impl IntoExpr) -> Self {
        self.same(Method::SkipLast, vec![count.into_expr()])
    }

    #[must_use]
    pub fn distinct(self) -> Self {
        self.same(Method::Distinct, Vec::new())
    }

    /// Inner join on key equality, projecting through `result`.
    ///
    /// The inner query may only carry `Where` filters; composite keys are
    /// expressed with `Expr::new_record` on both sides.
    #[must_use]
    pub fn join(
        self,
        inner: Self,
        (outer_name, outer_key): (&str, impl FnOnce(&Expr) -> Expr),
        (inner_name, inner_key): (&str, impl FnOnce(&Expr) -> Expr),
        result: impl FnOnce(&Expr, &Expr) -> Expr,
    ) -> Self {
        let outer_ty = self.element();
        let inner_ty = inner.element();
        let outer_key = self.lambda(outer_name, outer_key);
        let inner_key = Expr::Lambda(Lambda::unary(inner_name, inner_ty.clone(), inner_key));
        let result = Lambda::binary((outer_name, outer_ty), (inner_name, inner_ty), result);
        let element = result.body.ty();

        self.chain(
            Method::Join,
            vec![inner.expr, outer_key, inner_key, Expr::Lambda(result)],
            element,
        )
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.same(Method::Union, vec![other.expr])
    }

    #[must_use]
    pub fn concat(self, other: Self) -> Self {
        self.same(Method::Concat, vec![other.expr])
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        self.same(Method::Intersect, vec![other.expr])
    }

    #[must_use]
    pub fn except(self, other: Self) -> Self {
        self.same(Method::Except, vec![other.expr])
    }

    /// Narrow the element type to `E`; selected columns are limited to the
    /// field names `E` shares with the source.
    #[must_use]
    pub fn cast<E: EntityKind>(self) -> Self {
        let entity = EntityRef::of::<E>();
        self.chain(Method::Cast(entity), Vec::new(), TypeRef::Entity(entity))
    }

    /// Client-side fallback value returned when the result is empty.
    #[must_use]
    pub fn default_if_empty(self, value: impl Into<Value>) -> Self {
        self.same(Method::DefaultIfEmpty, vec![Expr::constant(value)])
    }

    // terminal operators

    #[must_use]
    pub fn any(self) -> Expr {
        self.terminal(Method::Any, Vec::new(), TypeRef::bool())
    }

    #[must_use]
    pub fn any_where(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        let predicate = self.lambda(name, f);
        self.terminal(Method::Any, vec![predicate], TypeRef::bool())
    }

    #[must_use]
    pub fn all(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        let predicate = self.lambda(name, f);
        self.terminal(Method::All, vec![predicate], TypeRef::bool())
    }

    #[must_use]
    pub fn contains(self, item: impl IntoExpr) -> Expr {
        self.terminal(Method::Contains, vec![item.into_expr()], TypeRef::bool())
    }

    #[must_use]
    pub fn count(self) -> Expr {
        self.terminal(Method::Count, Vec::new(), TypeRef::int())
    }

    #[must_use]
    pub fn count_where(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        let predicate = self.lambda(name, f);
        self.terminal(Method::Count, vec![predicate], TypeRef::int())
    }

    #[must_use]
    pub fn long_count(self) -> Expr {
        self.terminal(Method::LongCount, Vec::new(), TypeRef::int())
    }

    fn aggregate(self, method: Method) -> Expr {
        let ty = match self.element() {
            TypeRef::Scalar { kind, nullable } => TypeRef::Scalar { kind, nullable },
            _ => TypeRef::Object,
        };
        self.terminal(method, Vec::new(), ty)
    }

    fn aggregate_by(self, method: Method, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        let selector = self.lambda(name, f);
        let ty = selector.ty();
        self.terminal(method, vec![selector], ty)
    }

    #[must_use]
    pub fn max(self) -> Expr {
        self.aggregate(Method::Max)
    }

    #[must_use]
    pub fn max_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        self.aggregate_by(Method::Max, name, f)
    }

    #[must_use]
    pub fn min(self) -> Expr {
        self.aggregate(Method::Min)
    }

    #[must_use]
    pub fn min_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        self.aggregate_by(Method::Min, name, f)
    }

    #[must_use]
    pub fn sum(self) -> Expr {
        self.aggregate(Method::Sum)
    }

    #[must_use]
    pub fn sum_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        self.aggregate_by(Method::Sum, name, f)
    }

    #[must_use]
    pub fn average(self) -> Expr {
        self.aggregate(Method::Average)
    }

    #[must_use]
    pub fn average_by(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        self.aggregate_by(Method::Average, name, f)
    }

    fn element_op(self, method: Method, args: Vec<Expr>) -> Expr {
        let element = self.element();
        self.terminal(method, args, element)
    }

    #[must_use]
    pub fn first(self) -> Expr {
        self.element_op(Method::First, Vec::new())
    }

    #[must_use]
    pub fn first_where(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Expr {
        let predicate = self.lambda(name, f);
        self.element_op(Method::First, vec![predicate])
    }

    #[must_use]
    pub fn first_or_default(self) -> Expr {
        self.element_op(Method::FirstOrDefault, Vec::new())
    }

    /// `FirstOrDefault(value)`: `value` is returned client-side when empty.
    #[must_use]
    pub fn first_or(self, value: impl Into<Value>) -> Expr {
        self.element_op(Method::FirstOrDefault, vec![Expr::constant(value)])
    }

    #[must_use]
    pub fn single(self) -> Expr {
        self.element_op(Method::Single, Vec::new())
    }

    #[must_use]
    pub fn single_or_default(self) -> Expr {
        self.element_op(Method::SingleOrDefault, Vec::new())
    }

    #[must_use]
    pub fn single_or(self, value: impl Into<Value>) -> Expr {
        self.element_op(Method::SingleOrDefault, vec![Expr::constant(value)])
    }

    #[must_use]
    pub fn last(self) -> Expr {
        self.element_op(Method::Last, Vec::new())
    }

    #[must_use]
    pub fn last_or_default(self) -> Expr {
        self.element_op(Method::LastOrDefault, Vec::new())
    }

    #[must_use]
    pub fn element_at(self, index: impl IntoExpr) -> Expr {
        self.element_op(Method::ElementAt, vec![index.into_expr()])
    }

    #[must_use]
    pub fn element_at_or_default(self, index: impl IntoExpr) -> Expr {
        self.element_op(Method::ElementAtOrDefault, vec![index.into_expr()])
    }
}

impl From<Query> for Expr {
    fn from(query: Query) -> Self {
        query.expr
    }
}

impl IntoExpr for Query {
    fn into_expr(self) -> Expr {
        self.expr
    }
}

// ----------------------------------------------------------------------------
// Command
// ----------------------------------------------------------------------------

///
/// Command
///
/// A write-command chain: `Table` root, optional table-name override,
/// filters, exactly one of insert/update/delete, optional timeout.
///

#[derive(Clone, Debug, Deref)]
pub struct Command {
    expr: Expr,
}

impl Command {
    #[must_use]
    pub fn table<E: EntityKind>() -> Self {
        Self {
            expr: Expr::Table {
                entity: EntityRef::of::<E>(),
            },
        }
    }

    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn row_type(&self) -> TypeRef {
        self.expr
            .root_entity()
            .map_or(TypeRef::Object, TypeRef::Entity)
    }

    fn chain(self, method: Method, args: Vec<Expr>) -> Self {
        let ty = self.expr.ty();
        Self {
            expr: Expr::call(method, Some(self.expr), args, ty),
        }
    }

    /// Override the physical table name for this command.
    #[must_use]
    pub fn table_name(self, name: impl Into<String>) -> Self {
        self.chain(Method::Table, vec![Expr::constant(Value::Text(name.into()))])
    }

    #[must_use]
    pub fn filter(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let predicate = Expr::Lambda(Lambda::unary(name, self.row_type(), f));
        self.chain(Method::Where, vec![predicate])
    }

    /// `UPDATE`: `f` returns a construction whose bindings become the SET list.
    #[must_use]
    pub fn update(self, name: &str, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let setter = Expr::Lambda(Lambda::unary(name, self.row_type(), f));
        self.chain(Method::Update, vec![setter])
    }

    #[must_use]
    pub fn delete(self) -> Self {
        self.chain(Method::Delete, Vec::new())
    }

    /// `INSERT ... VALUES` from a parameterless construction.
    #[must_use]
    pub fn insert(self, f: impl FnOnce() -> Expr) -> Self {
        let values = Expr::Lambda(Lambda::new(Vec::new(), f()));
        self.chain(Method::Insert, vec![values])
    }

    /// `INSERT ... SELECT` from a query ending in a construction `Select`.
    #[must_use]
    pub fn insert_from(self, source: Query) -> Self {
        self.chain(Method::Insert, vec![source.into_expr()])
    }

    #[must_use]
    pub fn timeout(self, seconds: u32) -> Self {
        self.chain(Method::Timeout, vec![Expr::constant(Value::from(seconds))])
    }

    /// Update every writable non-key field of `entity`, matched by `keys`.
    ///
    /// Token columns are left unbound so the compiler populates them.
    #[must_use]
    pub fn update_entity<E: EntityValue>(entity: &E, keys: &[&str]) -> Self {
        let model = E::MODEL;
        let bindings: Vec<(String, Expr)> = model
            .fields
            .iter()
            .filter(|field| {
                field.access != FieldAccess::Read
                    && field.token.is_none()
                    && !keys.contains(&field.name)
            })
            .filter_map(|field| {
                entity
                    .get_value(field.name)
                    .map(|value| (field.name.to_string(), Expr::captured(field.name, value)))
            })
            .collect();
        let keys: Vec<(&str, Value)> = keys
            .iter()
            .map(|key| (*key, entity.get_value(key).unwrap_or(Value::Null)))
            .collect();

        Self::table::<E>()
            .filter("x", |x| {
                keys.into_iter()
                    .map(|(key, value)| x.field(key).eq(Expr::captured(key, value)))
                    .reduce(|acc, next| acc.and(next))
                    .unwrap_or_else(|| Expr::constant(true))
            })
            .update("x", |_| Expr::member_init::<E, _, _>(bindings))
    }

    /// Insert every writable field of `entity`; token columns are populated
    /// by the compiler.
    #[must_use]
    pub fn insert_entity<E: EntityValue>(entity: &E) -> Self {
        let bindings: Vec<(String, Expr)> = E::MODEL
            .fields
            .iter()
            .filter(|field| field.access != FieldAccess::Read && field.token.is_none())
            .filter_map(|field| {
                entity
                    .get_value(field.name)
                    .map(|value| (field.name.to_string(), Expr::captured(field.name, value)))
            })
            .collect();

        Self::table::<E>().insert(|| Expr::member_init::<E, _, _>(bindings))
    }
}

impl From<Command> for Expr {
    fn from(command: Command) -> Self {
        command.expr
    }
}
