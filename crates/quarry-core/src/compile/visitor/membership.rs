use crate::{
    compile::{
        scope::SourceBinding,
        select::SelectCompiler,
        visitor::{ExprCompiler, Truth, lambda_param},
    },
    error::{CompileError, ErrorOrigin},
    expr::{BinaryOp, Expr, Lambda, Method, MethodCall},
    sql::SqlBuffer,
    value::Value,
};

impl ExprCompiler<'_, '_> {
    /// `Contains`: text search, subquery membership, or an in-memory list.
    pub(super) fn contains(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<Truth, CompileError> {
        let (target, item) = match (call.target.as_ref(), call.args.first()) {
            (Some(target), Some(item)) => (target, item),
            _ => {
                return Err(CompileError::visitor_syntax(
                    "'Contains' requires a receiver and an item",
                ));
            }
        };

        if target.ty().is_text() {
            return self.like(buf, call);
        }

        if target.is_query() {
            let subquery = SelectCompiler::nested(self.ctx, self.scope).in_subquery(target)?;
            self.value(buf, item)?;
            buf.in_list().open_brace().append(subquery).close_brace();
            return Ok(Truth::Sql);
        }

        match self.fold(target)? {
            Some(Value::List(values)) => self.membership(buf, item, &values),
            Some(Value::Null) => Err(CompileError::domain(
                ErrorOrigin::Visitor,
                "membership collection must not be null",
            )),
            _ => Err(CompileError::unsupported(
                ErrorOrigin::Visitor,
                "'Contains' needs text, a query, or an in-memory sequence as its receiver",
            )),
        }
    }

    /// `item IN (...)` over a constant list, split into batches.
    ///
    /// An empty list is constant false; batches are OR-joined (AND-joined
    /// `NOT IN` under negation) and the item is compiled once.
    fn membership(
        &self,
        buf: &mut SqlBuffer,
        item: &Expr,
        values: &[Value],
    ) -> Result<Truth, CompileError> {
        if values.is_empty() {
            return Ok(Truth::Always(buf.is_negated()));
        }
        if values.iter().any(Value::is_null) {
            return Err(CompileError::domain(
                ErrorOrigin::Visitor,
                "membership list must not contain null",
            ));
        }

        let mut operand = buf.fork();
        self.value(&mut operand, item)?;
        let element_ty = item.ty().non_null();

        let batch = self.ctx.config.in_list_batch.max(1);
        let chunks = values.len().div_ceil(batch);
        if chunks > 1 {
            buf.open_brace();
        }
        for (i, chunk) in values.chunks(batch).enumerate() {
            if i > 0 {
                buf.or();
            }
            buf.append_ref(&operand).in_list().open_brace();
            for (j, value) in chunk.iter().enumerate() {
                if j > 0 {
                    buf.delimiter();
                }
                buf.parameter(value.clone(), element_ty.clone());
            }
            buf.close_brace();
        }
        if chunks > 1 {
            buf.close_brace();
        }

        Ok(Truth::Sql)
    }

    /// `Any` / `All` over a subquery or an in-memory sequence.
    pub(super) fn quantifier(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<Truth, CompileError> {
        let all = matches!(call.method, Method::All);
        let target = call.target.as_ref().ok_or_else(|| {
            CompileError::visitor_syntax(format!("'{}' requires a receiver", call.method))
        })?;
        let predicate = call.lambda(0);

        if target.is_query() {
            return match (all, predicate) {
                (false, predicate) => self.exists(buf, target, predicate),
                (true, Some(predicate)) => self.all_subquery(buf, target, predicate),
                (true, None) => Err(CompileError::visitor_syntax("'All' requires a predicate")),
            };
        }

        match self.fold(target)? {
            Some(Value::List(values)) => self.enumerate(buf, &values, predicate, all),
            _ => Err(CompileError::unsupported(
                ErrorOrigin::Visitor,
                format!(
                    "'{}' needs a query or an in-memory sequence as its receiver",
                    call.method
                ),
            )),
        }
    }

    fn exists(
        &self,
        buf: &mut SqlBuffer,
        source: &Expr,
        predicate: Option<&Lambda>,
    ) -> Result<Truth, CompileError> {
        let subquery = SelectCompiler::nested(self.ctx, self.scope).exists(source, predicate, false)?;
        buf.exists().open_brace().append(subquery).close_brace();

        Ok(Truth::Sql)
    }

    /// `(EXISTS(S WHERE p) AND NOT EXISTS(S WHERE NOT p))`: false on an
    /// empty source, unlike the vacuous truth of in-memory `All`.
    fn all_subquery(
        &self,
        buf: &mut SqlBuffer,
        source: &Expr,
        predicate: &Lambda,
    ) -> Result<Truth, CompileError> {
        let matching =
            SelectCompiler::nested(self.ctx, self.scope).exists(source, Some(predicate), false)?;
        let contradicting =
            SelectCompiler::nested(self.ctx, self.scope).exists(source, Some(predicate), true)?;

        buf.open_brace();
        buf.exists().open_brace().append(matching).close_brace();
        buf.and();
        buf.toggle_not();
        buf.exists();
        buf.toggle_not();
        buf.open_brace().append(contradicting).close_brace();
        buf.close_brace();

        Ok(Truth::Sql)
    }

    /// Unroll `Any` / `All` over a constant sequence into a fused OR / AND
    /// chain, binding each element in turn.
    fn enumerate(
        &self,
        buf: &mut SqlBuffer,
        values: &[Value],
        predicate: Option<&Lambda>,
        all: bool,
    ) -> Result<Truth, CompileError> {
        let Some(predicate) = predicate else {
            if all {
                return Err(CompileError::visitor_syntax("'All' requires a predicate"));
            }
            return Ok(Truth::Always(!values.is_empty() != buf.is_negated()));
        };
        let param = lambda_param(predicate)?;

        let op = if all { BinaryOp::And } else { BinaryOp::Or };
        let start = buf.len();
        let mut truth = Truth::Always((op == BinaryOp::And) != buf.is_negated());
        for value in values {
            let scope = self.ctx.push_scope(Some(self.scope));
            self.ctx
                .bind_param(scope, param, SourceBinding::Constant(value.clone()));
            let element = ExprCompiler::new(self.ctx, scope);
            truth = Self::connect(buf, op, truth, start, |buf| {
                element.condition(buf, &predicate.body)
            })?;
        }

        Ok(truth)
    }

    /// Value-context calls that are neither predicates nor text methods:
    /// scalar subqueries and unrewritten custom methods.
    pub(super) fn call_value(&self, buf: &mut SqlBuffer, call: &MethodCall) -> Result<(), CompileError> {
        if call.method.is_text() {
            return self.text_value(buf, call);
        }

        let over_query = call.target.as_ref().is_some_and(Expr::is_query);
        match call.method {
            method if over_query && (method.is_aggregate() || method.is_element()) => {
                let subquery = SelectCompiler::nested(self.ctx, self.scope).scalar(call)?;
                buf.open_brace().append(subquery).close_brace();
                Ok(())
            }
            Method::Custom(custom) => Err(CompileError::unsupported(
                ErrorOrigin::Dialect,
                format!(
                    "'{}' has no {} rewriter and cannot be evaluated client-side",
                    custom.name,
                    self.ctx.dialect().engine()
                ),
            )),
            method => Err(CompileError::unsupported(
                ErrorOrigin::Visitor,
                format!("method '{method}' is not supported here"),
            )),
        }
    }
}
