//! Expression visitor.
//!
//! Lowers lambda bodies in two contexts: condition context (WHERE / ON /
//! EXISTS predicates) and value context (select lists, order keys, operands).
//! Conditions report a [`Truth`] so connectives can drop identity operands
//! and short-circuit on absorbing ones while the text is being written.

mod member;
mod membership;
mod operator;
mod string;


use crate::{
    compile::{
        context::CompileContext,
        scope::{ScopeId, SourceBinding},
    },
    error::{CompileError, ErrorOrigin},
    expr::{
        BinaryOp, Expr, Lambda, Method, MethodCall, UnaryOp, UnsupportedNode, evaluate,
        is_evaluable, member_of,
    },
    sql::SqlBuffer,
    value::Value,
};

pub(crate) use member::SourceColumn;

///
/// Truth
///
/// Outcome of compiling a condition. `Always` carries the rendered truth,
/// with the buffer's polarity already applied; `Always` and `Omitted` leave
/// the buffer untouched.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Truth {
    Sql,
    Always(bool),
    Omitted,
}

///
/// ExprCompiler
///

#[derive(Clone, Copy)]
pub(crate) struct ExprCompiler<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    scope: ScopeId,
}

impl<'c, 'a> ExprCompiler<'c, 'a> {
    pub(crate) const fn new(ctx: &'c CompileContext<'a>, scope: ScopeId) -> Self {
        Self { ctx, scope }
    }

    /// Fuse `right` onto an already-compiled `left` that starts at `start`.
    ///
    /// `op` is the logical connective; under NOT polarity the rendered
    /// connective flips, and so do the identity and absorbing values. An
    /// absorbing left operand skips `right` entirely; an absorbing right
    /// operand removes everything written since `start`.
    pub(crate) fn connect(
        buf: &mut SqlBuffer,
        op: BinaryOp,
        left: Truth,
        start: usize,
        right: impl FnOnce(&mut SqlBuffer) -> Result<Truth, CompileError>,
    ) -> Result<Truth, CompileError> {
        let effective_and = (op == BinaryOp::And) != buf.is_negated();
        let absorbing = Truth::Always(!effective_and);
        if left == absorbing {
            return Ok(left);
        }

        let mid = buf.len();
        let rhs = right(buf)?;

        let truth = match (left, rhs) {
            (_, rhs) if rhs == absorbing => {
                buf.truncate(start);
                absorbing
            }
            (Truth::Sql, Truth::Sql) => {
                buf.set_cursor(start);
                buf.open_brace();
                buf.set_cursor(mid + 1);
                buf.close_brace();
                if op == BinaryOp::And {
                    buf.and();
                } else {
                    buf.or();
                }
                buf.open_brace();
                buf.clear_cursor();
                buf.close_brace();
                Truth::Sql
            }
            (left, Truth::Omitted) => left,
            (Truth::Sql, Truth::Always(_)) => Truth::Sql,
            (Truth::Always(_) | Truth::Omitted, rhs) => rhs,
        };

        Ok(truth)
    }

    // ------------------------------------------------------------------
    // condition context
    // ------------------------------------------------------------------

    /// Compile `expr` as a predicate.
    pub(crate) fn condition(&self, buf: &mut SqlBuffer, expr: &Expr) -> Result<Truth, CompileError> {
        if let Some(call) = self.rewritten(expr) {
            self.rewrite(buf, call)?;
            buf.equal().write("1");
            return Ok(Truth::Sql);
        }

        if let Some(value) = self.fold(expr)? {
            return match value {
                Value::Bool(value) => Ok(Truth::Always(value != buf.is_negated())),
                other => Err(CompileError::visitor_syntax(format!(
                    "condition folded to a non-boolean value: {other}"
                ))),
            };
        }

        match expr {
            Expr::Binary {
                op, left, right, ..
            } if op.is_logical() => {
                let start = buf.len();
                let lhs = self.condition(buf, left)?;
                Self::connect(buf, *op, lhs, start, |buf| self.condition(buf, right))
            }
            Expr::Binary {
                op, left, right, ..
            } if op.is_comparison() => self.compare(buf, *op, left, right),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
                ..
            } => {
                buf.toggle_not();
                let truth = self.condition(buf, operand);
                buf.toggle_not();
                truth
            }
            Expr::Call(call) => self.call_condition(buf, expr, call),
            Expr::Member { target, name, .. } if name == "HasValue" => {
                self.value(buf, target)?;
                buf.is_not_null();
                Ok(Truth::Sql)
            }
            Expr::Unsupported(kind) => Err(unsupported_node(*kind)),
            _ if expr.ty().is_bool() => {
                self.value(buf, expr)?;
                buf.equal().write("1");
                Ok(Truth::Sql)
            }
            _ => Err(CompileError::visitor_syntax(format!(
                "expression of type {:?} cannot be used as a condition",
                expr.ty()
            ))),
        }
    }

    fn call_condition(
        &self,
        buf: &mut SqlBuffer,
        expr: &Expr,
        call: &MethodCall,
    ) -> Result<Truth, CompileError> {
        match call.method {
            Method::StartsWith | Method::EndsWith => self.like(buf, call),
            Method::Contains => self.contains(buf, call),
            Method::IsNullOrEmpty => self.is_null_or_empty(buf, call),
            Method::Any | Method::All => self.quantifier(buf, call),
            _ if call.ty.is_bool() => {
                self.value(buf, expr)?;
                buf.equal().write("1");
                Ok(Truth::Sql)
            }
            method => Err(CompileError::visitor_syntax(format!(
                "'{method}' does not produce a condition"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // value context
    // ------------------------------------------------------------------

    /// Compile `expr` as a scalar value. Polarity never leaks into values.
    pub(crate) fn value(&self, buf: &mut SqlBuffer, expr: &Expr) -> Result<(), CompileError> {
        let negated = buf.set_negated(false);
        let result = self.value_node(buf, expr);
        buf.set_negated(negated);

        result
    }

    fn value_node(&self, buf: &mut SqlBuffer, expr: &Expr) -> Result<(), CompileError> {
        if let Some(call) = self.rewritten(expr) {
            return self.rewrite(buf, call);
        }
        if let Some(value) = self.fold(expr)? {
            Self::bind(buf, expr, value);
            return Ok(());
        }
        if is_predicate(expr) {
            return self.predicate_value(buf, expr);
        }

        match expr {
            Expr::Member { target, name, .. } => self.member_value(buf, expr, target, name),
            Expr::Binary {
                op,
                left,
                right,
                ty,
            } => self.arithmetic(buf, *op, left, right, ty),
            Expr::Unary {
                op: UnaryOp::Negate,
                operand,
                ..
            } => {
                buf.write("(-");
                self.value(buf, operand)?;
                buf.close_brace();
                Ok(())
            }
            Expr::Unary {
                op: UnaryOp::Convert,
                operand,
                ..
            } => self.value(buf, operand),
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => self.predicate_value(buf, expr),
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => self.conditional(buf, test, if_true, if_false),
            Expr::Coalesce { left, right, .. } => self.coalesce(buf, left, right),
            Expr::Switch {
                value,
                cases,
                default,
                ..
            } => self.switch(buf, value, cases, default.as_deref()),
            Expr::Call(call) => self.call_value(buf, call),
            Expr::Constant { value, .. } => {
                Self::bind(buf, expr, value.clone());
                Ok(())
            }
            Expr::Parameter(param) => match self.ctx.lookup_param(self.scope, &param.name) {
                Some(SourceBinding::Scalar { sql, .. }) => {
                    buf.append(sql);
                    Ok(())
                }
                _ => Err(CompileError::visitor_syntax(format!(
                    "parameter '{}' is a row and cannot be used as a scalar value",
                    param.name
                ))),
            },
            Expr::Table { entity } => Err(CompileError::visitor_syntax(format!(
                "table '{}' cannot be used as a scalar value",
                entity.name()
            ))),
            Expr::Lambda(_) => Err(CompileError::visitor_syntax(
                "a lambda cannot be used as a scalar value",
            )),
            Expr::New { .. } | Expr::MemberInit { .. } => Err(CompileError::visitor_syntax(
                "a construction is only supported as a projection or key list",
            )),
            Expr::Unsupported(kind) => Err(unsupported_node(*kind)),
        }
    }

    /// `CASE WHEN cond THEN 1 ELSE 0 END` for a predicate in value position.
    fn predicate_value(&self, buf: &mut SqlBuffer, expr: &Expr) -> Result<(), CompileError> {
        let mut test = buf.fork();
        match self.condition(&mut test, expr)? {
            Truth::Sql => {
                buf.write("CASE WHEN ")
                    .append(test)
                    .write(" THEN 1 ELSE 0 END");
            }
            Truth::Always(value) => {
                buf.write(if value { "1" } else { "0" });
            }
            Truth::Omitted => {
                buf.write("1");
            }
        }

        Ok(())
    }

    /// Write a folded value as a parameter; captured variables keep their name.
    fn bind(buf: &mut SqlBuffer, expr: &Expr, value: Value) {
        let ty = expr.ty();
        match expr {
            Expr::Member { name, .. } if expr.is_captured() => {
                buf.parameter_named(name, value, ty);
            }
            _ => {
                buf.parameter(value, ty);
            }
        }
    }

    // ------------------------------------------------------------------
    // folding
    // ------------------------------------------------------------------

    /// Compile-time value of `expr`, if it has one in this scope.
    pub(crate) fn fold(&self, expr: &Expr) -> Result<Option<Value>, CompileError> {
        if is_evaluable(expr) {
            return evaluate(expr).map(Some);
        }

        match expr {
            Expr::Parameter(param) => match self.ctx.lookup_param(self.scope, &param.name) {
                Some(SourceBinding::Constant(value)) => Ok(Some(value)),
                _ => Ok(None),
            },
            Expr::Member { target, name, .. } => match self.fold(target)? {
                Some(value) => member_of(&value, name).map(Some),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // dialect rewriters
    // ------------------------------------------------------------------

    fn rewritten<'e>(&self, expr: &'e Expr) -> Option<&'e MethodCall> {
        let call = expr.as_call()?;
        match call.method {
            Method::Custom(custom) if self.ctx.dialect().rewriter(custom.name).is_some() => {
                Some(call)
            }
            _ => None,
        }
    }

    fn rewrite(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<(), CompileError> {
        let dialect = self.ctx.dialect();
        let rewriter = match call.method {
            Method::Custom(custom) => dialect.rewriter(custom.name),
            _ => None,
        }
        .ok_or_else(|| {
            CompileError::unsupported(
                ErrorOrigin::Dialect,
                format!("no rewriter for '{}'", call.method),
            )
        })?;

        let operands = call
            .operands()
            .map(|operand| {
                let mut out = buf.fork();
                self.value(&mut out, operand)?;
                Ok(out)
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        rewriter.rewrite(buf, operands)
    }
}

/// True for nodes that only have a condition lowering.
fn is_predicate(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op, .. } => op.is_comparison() || op.is_logical(),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => true,
        Expr::Member { name, .. } => name == "HasValue",
        Expr::Call(call) => matches!(
            call.method,
            Method::StartsWith
                | Method::EndsWith
                | Method::Contains
                | Method::IsNullOrEmpty
                | Method::Any
                | Method::All
        ),
        _ => false,
    }
}

/// The single parameter of a lambda.
pub(crate) fn lambda_param(lambda: &Lambda) -> Result<&str, CompileError> {
    match lambda.params.as_slice() {
        [param] => Ok(param.name.as_str()),
        _ => Err(CompileError::unsupported(
            ErrorOrigin::Visitor,
            "multi-parameter lambdas are not supported",
        )),
    }
}

fn unsupported_node(kind: UnsupportedNode) -> CompileError {
    CompileError::unsupported(
        ErrorOrigin::Visitor,
        format!("unsupported expression node: {kind:?}"),
    )
}
