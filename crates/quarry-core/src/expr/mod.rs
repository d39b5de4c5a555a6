//! Query expression tree.
//!
//! A closed tagged union of typed nodes. Trees are built once through the
//! builder API (`Query`, `Command`, and the combinators on `Expr`) and are
//! read-only to the compiler.

mod build;
mod eval;
mod method;


use crate::{
    model::EntityRef,
    value::{TypeRef, Value},
};

// re-exports
pub use build::{Command, IntoExpr, Query};
pub use method::{CustomEval, CustomMethod, Method};

pub(crate) use eval::{evaluate, is_evaluable, member_of};

///
/// Param
/// Lambda parameter; identity is the name within its lambda.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

///
/// Lambda
///

#[derive(Clone, Debug)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<Expr>,
}

impl Lambda {
    #[must_use]
    pub fn new(params: Vec<Param>, body: Expr) -> Self {
        Self {
            params,
            body: Box::new(body),
        }
    }

    /// Build a one-parameter lambda from a closure over the parameter node.
    pub fn unary(name: &str, ty: TypeRef, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let param = Param::new(name, ty);
        let body = f(&Expr::Parameter(param.clone()));

        Self::new(vec![param], body)
    }

    /// Build a two-parameter lambda (join result selectors).
    pub fn binary(
        (left, left_ty): (&str, TypeRef),
        (right, right_ty): (&str, TypeRef),
        f: impl FnOnce(&Expr, &Expr) -> Expr,
    ) -> Self {
        let left = Param::new(left, left_ty);
        let right = Param::new(right, right_ty);
        let body = f(
            &Expr::Parameter(left.clone()),
            &Expr::Parameter(right.clone()),
        );

        Self::new(vec![left, right], body)
    }
}

///
/// MethodCall
///
/// `target` is the receiver (the upstream query for sequence methods, the
/// text operand for text methods); static helpers such as `IsNullOrEmpty`
/// have no target and take their operand from `args`.
///

#[derive(Clone, Debug)]
pub struct MethodCall {
    pub method: Method,
    pub target: Option<Expr>,
    pub args: Vec<Expr>,
    pub ty: TypeRef,
}

impl MethodCall {
    /// Receiver followed by arguments; templates index into this list.
    pub fn operands(&self) -> impl Iterator<Item = &Expr> {
        self.target.iter().chain(self.args.iter())
    }

    /// The lambda argument at `index`, if present.
    #[must_use]
    pub fn lambda(&self, index: usize) -> Option<&Lambda> {
        match self.args.get(index) {
            Some(Expr::Lambda(lambda)) => Some(lambda),
            _ => None,
        }
    }
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem
        )
    }
}

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Not,
    Negate,
    /// Static type conversion; the node type is the target type.
    Convert,
}

///
/// UnsupportedNode
/// Statement-level node kinds that have no SQL lowering.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnsupportedNode {
    Block,
    Loop,
    Try,
    Goto,
    Label,
    NewArray,
}

///
/// SwitchCase
///

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub tests: Vec<Expr>,
    pub body: Expr,
}

///
/// Expr
///

#[derive(Clone, Debug)]
pub enum Expr {
    /// Query root over an entity's table; typed as a sequence of the entity.
    Table { entity: EntityRef },
    Lambda(Lambda),
    Parameter(Param),
    Member {
        target: Box<Self>,
        name: String,
        ty: TypeRef,
    },
    Call(Box<MethodCall>),
    Binary {
        op: BinaryOp,
        left: Box<Self>,
        right: Box<Self>,
        ty: TypeRef,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Self>,
        ty: TypeRef,
    },
    Conditional {
        test: Box<Self>,
        if_true: Box<Self>,
        if_false: Box<Self>,
        ty: TypeRef,
    },
    Coalesce {
        left: Box<Self>,
        right: Box<Self>,
        ty: TypeRef,
    },
    /// Anonymous construction (`new { a, b }`).
    New {
        fields: Vec<(String, Self)>,
        ty: TypeRef,
    },
    /// Named-type construction with member bindings.
    MemberInit {
        ty: TypeRef,
        bindings: Vec<(String, Self)>,
    },
    Constant {
        value: Value,
        ty: TypeRef,
    },
    Switch {
        value: Box<Self>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Self>>,
        ty: TypeRef,
    },
    Unsupported(UnsupportedNode),
}

impl Expr {
    /// Static result type of this node.
    #[must_use]
    pub fn ty(&self) -> TypeRef {
        match self {
            Self::Table { entity } => TypeRef::sequence(TypeRef::Entity(*entity)),
            Self::Lambda(lambda) => lambda.body.ty(),
            Self::Parameter(param) => param.ty.clone(),
            Self::Call(call) => call.ty.clone(),
            Self::Member { ty, .. }
            | Self::Binary { ty, .. }
            | Self::Unary { ty, .. }
            | Self::Conditional { ty, .. }
            | Self::Coalesce { ty, .. }
            | Self::New { ty, .. }
            | Self::MemberInit { ty, .. }
            | Self::Constant { ty, .. }
            | Self::Switch { ty, .. } => ty.clone(),
            Self::Unsupported(_) => TypeRef::Object,
        }
    }

    #[must_use]
    pub const fn as_call(&self) -> Option<&MethodCall> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// True for a literal null constant.
    #[must_use]
    pub const fn is_null_literal(&self) -> bool {
        matches!(
            self,
            Self::Constant {
                value: Value::Null,
                ..
            }
        )
    }

    /// True for a captured variable: a member read off a constant closure.
    #[must_use]
    pub fn is_captured(&self) -> bool {
        match self {
            Self::Member { target, .. } => {
                matches!(**target, Self::Constant { .. }) || target.is_captured()
            }
            _ => false,
        }
    }

    /// Bindings of a construction node (`New` or `MemberInit`).
    #[must_use]
    pub fn bindings(&self) -> Option<&[(String, Self)]> {
        match self {
            Self::New { fields, .. } => Some(fields),
            Self::MemberInit { bindings, .. } => Some(bindings),
            _ => None,
        }
    }

    /// Root node of a method chain (follows call targets).
    #[must_use]
    pub fn chain_root(&self) -> &Self {
        let mut node = self;
        while let Self::Call(call) = node {
            match &call.target {
                Some(target) => node = target,
                None => break,
            }
        }

        node
    }

    /// True when this expression is a query source: a table root, possibly
    /// behind query operators.
    #[must_use]
    pub fn is_query(&self) -> bool {
        match self {
            Self::Table { .. } => true,
            Self::Call(call) => {
                call.method.is_query_operator()
                    && call.target.as_ref().is_some_and(Self::is_query)
            }
            _ => false,
        }
    }

    /// True when a table root appears anywhere in this subtree.
    #[must_use]
    pub fn references_table(&self) -> bool {
        match self {
            Self::Table { .. } => true,
            Self::Lambda(lambda) => lambda.body.references_table(),
            Self::Parameter(_) | Self::Constant { .. } | Self::Unsupported(_) => false,
            Self::Member { target, .. } => target.references_table(),
            Self::Call(call) => call.operands().any(Self::references_table),
            Self::Binary { left, right, .. } | Self::Coalesce { left, right, .. } => {
                left.references_table() || right.references_table()
            }
            Self::Unary { operand, .. } => operand.references_table(),
            Self::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                test.references_table() || if_true.references_table() || if_false.references_table()
            }
            Self::New { fields, .. } | Self::MemberInit {
                bindings: fields, ..
            } => fields.iter().any(|(_, expr)| expr.references_table()),
            Self::Switch {
                value,
                cases,
                default,
                ..
            } => {
                value.references_table()
                    || cases.iter().any(|case| {
                        case.tests.iter().any(Self::references_table)
                            || case.body.references_table()
                    })
                    || default.as_deref().is_some_and(Self::references_table)
            }
        }
    }

    /// Entity at the root of a query or command chain, if any.
    #[must_use]
    pub fn root_entity(&self) -> Option<EntityRef> {
        match self.chain_root() {
            Self::Table { entity } => Some(*entity),
            _ => None,
        }
    }
}
