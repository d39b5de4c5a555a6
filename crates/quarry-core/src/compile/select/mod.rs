//! Read-query compiler.
//!
//! Unwinds an operator chain root-first into a [`SelectState`], then hands
//! the structured parts to the dialect for final rendering. Nested compilers
//! (EXISTS probes, IN subqueries, scalar subqueries, set-operation branches)
//! share the parent's context and push a child alias scope.

mod ir;
mod state;

#[cfg(test)]
mod tests;

use crate::{
    compile::{
        Statement,
        context::CompileContext,
        scope::{MemberKind, ProjectedMember, ScopeId, SourceBinding},
        visitor::{ExprCompiler, Truth, lambda_param},
    },
    dialect::{SelectParts, SetOp},
    error::{CompileError, ErrorOrigin},
    expr::{BinaryOp, Expr, Lambda, Method, MethodCall},
    model::EntityRef,
    sql::{SqlBuffer, StatementKind},
    value::{ScalarKind, Value},
};
use std::rc::Rc;

// re-exports
pub(crate) use ir::Column;
pub(crate) use state::SelectState;

use ir::{OrderKey, Source, write_columns};
use state::Phase;

///
/// SelectCompiler
///
/// `qualify` decides whether the chain's table gets an alias; nested
/// compilers always qualify so correlated references stay unambiguous.
///

pub(crate) struct SelectCompiler<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    parent: Option<ScopeId>,
    scope: ScopeId,
    qualify: bool,
}

impl<'c, 'a> SelectCompiler<'c, 'a> {
    /// Compiler for a top-level query.
    pub(crate) fn root(ctx: &'c CompileContext<'a>, expr: &Expr) -> Self {
        Self::new(ctx, None, needs_qualifier(expr))
    }

    /// Compiler for a subquery inside a lambda compiled in `parent`.
    pub(crate) fn nested(ctx: &'c CompileContext<'a>, parent: ScopeId) -> Self {
        Self::new(ctx, Some(parent), true)
    }

    fn new(ctx: &'c CompileContext<'a>, parent: Option<ScopeId>, qualify: bool) -> Self {
        Self {
            ctx,
            parent,
            scope: ctx.push_scope(parent),
            qualify,
        }
    }

    const fn visitor(&self) -> ExprCompiler<'c, 'a> {
        ExprCompiler::new(self.ctx, self.scope)
    }

    // ------------------------------------------------------------------
    // entry points
    // ------------------------------------------------------------------

    /// Compile a top-level query expression.
    pub(crate) fn compile(&self, expr: &Expr) -> Result<Statement, CompileError> {
        match expr {
            Expr::Call(call) if matches!(call.method, Method::Any | Method::All | Method::Contains) => {
                let mut value = self.ctx.buffer();
                self.visitor().value(&mut value, expr)?;
                let mut out = self.ctx.buffer();
                self.ctx.dialect().select_scalar(&mut out, value);

                Ok(Statement::new(out, StatementKind::Scalar))
            }
            Expr::Call(call) if call.method.is_aggregate() || call.method.is_element() => {
                self.terminal(call).map(|(statement, _)| statement)
            }
            _ => {
                let state = self.build(expr, &self.alias_hint(expr, None))?;
                let default_value = state.default_value.clone();
                let (sql, _) = self.render(state)?;

                Ok(Statement {
                    default_value,
                    ..Statement::new(sql, StatementKind::Select)
                })
            }
        }
    }

    /// `SELECT 1 FROM ... WHERE [NOT] p` for an EXISTS probe.
    pub(crate) fn exists(
        &self,
        source: &Expr,
        predicate: Option<&Lambda>,
        negate: bool,
    ) -> Result<SqlBuffer, CompileError> {
        let mut state = self.build(source, &self.alias_hint(source, predicate))?;
        if let Some(predicate) = predicate {
            let binding = state.binding.clone();
            self.fuse(&mut state, predicate, &binding, negate)?;
        }
        if state.paging.is_empty() {
            state.order.clear();
        }

        let mut one = self.ctx.buffer();
        one.write("1");

        self.render_with(state, Some((one, Vec::new())), true)
            .map(|(sql, _)| sql)
    }

    /// Single-column subquery for `item IN (...)`.
    pub(crate) fn in_subquery(&self, source: &Expr) -> Result<SqlBuffer, CompileError> {
        let mut state = self.build(source, &self.alias_hint(source, None))?;
        if state.paging.is_empty() {
            state.order.clear();
        }

        let limited = !state.paging.is_empty();
        let (sql, names) = self.render_with(state, None, true)?;
        if names.len() != 1 {
            return Err(CompileError::select_syntax(
                "'Contains' subquery must select exactly one column",
            ));
        }
        if !limited || self.ctx.dialect().supports_limit_in_subquery() {
            return Ok(sql);
        }

        // a row-limited IN list is read through a derived table
        let mut out = self.ctx.buffer();
        out.write("SELECT * FROM (")
            .append(sql)
            .write(") ")
            .write_identifier(&self.ctx.window_alias());

        Ok(out)
    }

    /// Scalar subquery for an aggregate or element operator in value position.
    pub(crate) fn scalar(&self, call: &MethodCall) -> Result<SqlBuffer, CompileError> {
        let (statement, names) = self.terminal(call)?;
        if names.len() != 1 {
            return Err(CompileError::select_syntax(format!(
                "'{}' subquery must select exactly one column",
                call.method
            )));
        }

        Ok(statement.sql)
    }

    /// Built but unrendered state for `INSERT ... SELECT`.
    pub(crate) fn insert_source(&self, source: &Expr) -> Result<SelectState, CompileError> {
        self.build(source, &self.alias_hint(source, None))
    }

    pub(crate) fn render_state(&self, state: SelectState) -> Result<SqlBuffer, CompileError> {
        self.render(state).map(|(sql, _)| sql)
    }

    // ------------------------------------------------------------------
    // chain
    // ------------------------------------------------------------------

    /// Table alias hint: the parameter name of the lambda closest to the root.
    fn alias_hint(&self, source: &Expr, terminal: Option<&Lambda>) -> String {
        chain_hint(source)
            .or_else(|| terminal.and_then(|lambda| lambda.params.first()).map(|p| p.name.clone()))
            .unwrap_or_else(|| self.ctx.config.default_alias.clone())
    }

    fn build(&self, expr: &Expr, hint: &str) -> Result<SelectState, CompileError> {
        match expr {
            Expr::Table { entity } => self.table_state(*entity, hint),
            Expr::Call(call) if call.method.is_query_operator() => {
                let target = call.target.as_ref().ok_or_else(|| {
                    CompileError::select_syntax(format!("'{}' has no source", call.method))
                })?;
                let state = self.build(target, hint)?;
                self.apply(state, call)
            }
            Expr::Call(call) => Err(CompileError::select_syntax(format!(
                "'{}' cannot be used inside a query chain",
                call.method
            ))),
            _ => Err(CompileError::unsupported(
                ErrorOrigin::Select,
                "query root must be an entity table",
            )),
        }
    }

    fn table_state(&self, entity: EntityRef, hint: &str) -> Result<SelectState, CompileError> {
        let shape = self.ctx.shape(entity)?;
        let alias = if self.qualify {
            self.ctx.bind_alias(self.scope, hint)
        } else {
            String::new()
        };
        let source = Source::Table {
            table: shape.table.clone(),
            alias: alias.clone(),
        };

        Ok(SelectState::new(
            source,
            SourceBinding::Table { shape, alias },
            self.ctx.buffer(),
        ))
    }

    fn apply(&self, mut state: SelectState, call: &MethodCall) -> Result<SelectState, CompileError> {
        let method = call.method;
        match method {
            Method::Where | Method::TakeWhile | Method::SkipWhile => {
                state.require_rows(method)?;
                let predicate = required_lambda(call)?;
                let binding = state.binding.clone();
                let negate = matches!(method, Method::SkipWhile);
                self.fuse(&mut state, predicate, &binding, negate)?;
            }
            Method::OrderBy | Method::OrderByDescending => self.order(&mut state, call, true)?,
            Method::ThenBy | Method::ThenByDescending => self.order(&mut state, call, false)?,
            Method::Reverse => {
                state.require_order(method)?;
                state.reversed = !state.reversed;
            }
            Method::Take => {
                let count = self.count_arg(call)?;
                state.take(count)?;
            }
            Method::Skip => {
                let count = self.count_arg(call)?;
                state.skip(count);
            }
            Method::TakeLast | Method::SkipLast => {
                state.require_order(method)?;
                let count = self.count_arg(call)?;
                state.reversed = !state.reversed;
                if matches!(method, Method::TakeLast) {
                    state.take(count)?;
                } else {
                    state.skip(count);
                }
            }
            Method::Distinct => state.distinct = true,
            Method::Select => self.project(&mut state, call)?,
            Method::Join => self.join(&mut state, call)?,
            Method::Union | Method::Concat | Method::Intersect | Method::Except => {
                return self.set_operation(state, call);
            }
            Method::Cast(entity) => self.cast(&mut state, entity)?,
            Method::DefaultIfEmpty => {
                state.default_value = match call.args.first() {
                    Some(arg) => self.visitor().fold(arg)?,
                    None => None,
                };
            }
            other => {
                return Err(CompileError::select_syntax(format!(
                    "'{other}' cannot be used inside a query chain"
                )));
            }
        }

        Ok(state)
    }

    /// AND-fuse a predicate over `binding` into the WHERE clause.
    fn fuse(
        &self,
        state: &mut SelectState,
        predicate: &Lambda,
        binding: &SourceBinding,
        negate: bool,
    ) -> Result<(), CompileError> {
        self.ctx
            .bind_param(self.scope, lambda_param(predicate)?, binding.clone());
        let visitor = self.visitor();
        let truth = state.truth;

        state.truth = ExprCompiler::connect(&mut state.filter, BinaryOp::And, truth, 0, |buf| {
            if negate {
                buf.toggle_not();
            }
            let truth = visitor.condition(buf, &predicate.body);
            if negate {
                buf.toggle_not();
            }
            truth
        })?;

        Ok(())
    }

    fn order(&self, state: &mut SelectState, call: &MethodCall, reset: bool) -> Result<(), CompileError> {
        state.require_rows(call.method)?;
        if !reset {
            state.require_order(call.method)?;
        }

        let key = required_lambda(call)?;
        self.ctx
            .bind_param(self.scope, lambda_param(key)?, state.binding.clone());
        if reset {
            state.order.clear();
            state.reversed = false;
        }

        let descending = matches!(
            call.method,
            Method::OrderByDescending | Method::ThenByDescending
        );
        let keys: Vec<&Expr> = match key.body.bindings() {
            Some(bindings) => bindings.iter().map(|(_, expr)| expr).collect(),
            None => vec![key.body.as_ref()],
        };

        let visitor = self.visitor();
        for key in keys {
            let mut sql = self.ctx.buffer();
            visitor.value(&mut sql, key)?;
            state.order.push(OrderKey { sql, descending });
        }

        Ok(())
    }

    /// Constant non-negative count argument of a paging operator.
    fn count_arg(&self, call: &MethodCall) -> Result<u64, CompileError> {
        let arg = call.args.first().ok_or_else(|| {
            CompileError::select_syntax(format!("'{}' requires a count", call.method))
        })?;

        match self.visitor().fold(arg)? {
            Some(Value::Int(count)) => u64::try_from(count).map_err(|_| {
                CompileError::select_syntax(format!(
                    "'{}' count must not be negative",
                    call.method
                ))
            }),
            _ => Err(CompileError::select_syntax(format!(
                "'{}' requires a constant integer count",
                call.method
            ))),
        }
    }

    // ------------------------------------------------------------------
    // projection
    // ------------------------------------------------------------------

    fn project(&self, state: &mut SelectState, call: &MethodCall) -> Result<(), CompileError> {
        state.require_rows(call.method)?;
        let selector = required_lambda(call)?;
        self.ctx
            .bind_param(self.scope, lambda_param(selector)?, state.binding.clone());

        let (columns, binding) = self.projection(&selector.body)?;
        state.projection = Some(columns);
        state.binding = binding;
        state.phase = Phase::Projected;

        Ok(())
    }

    /// Select list and row binding for a projection body.
    ///
    /// Constructions give one column per binding (whole-row bindings expand
    /// to their columns); a bare row expands; anything else is one column.
    fn projection(&self, body: &Expr) -> Result<(Vec<Column>, SourceBinding), CompileError> {
        let visitor = self.visitor();

        if let Some(fields) = body.bindings() {
            if fields.is_empty() {
                return Err(CompileError::select_syntax("no fields selected"));
            }

            let mut columns = Vec::new();
            let mut members = Vec::new();
            for (name, expr) in fields {
                if let Some(source) = visitor.resolve_source(expr)? {
                    for column in visitor.expand_source(&source)? {
                        push_column(&mut columns, column.into())?;
                    }
                    members.push(ProjectedMember {
                        name: name.clone(),
                        kind: MemberKind::Source(source),
                    });
                } else {
                    let column = self.column(&visitor, name, expr)?;
                    members.push(ProjectedMember {
                        name: name.clone(),
                        kind: MemberKind::Column(column.sql.clone()),
                    });
                    push_column(&mut columns, column)?;
                }
            }

            return Ok((columns, SourceBinding::Projection(Rc::new(members))));
        }

        if let Some(source) = visitor.resolve_source(body)? {
            let mut columns = Vec::new();
            for column in visitor.expand_source(&source)? {
                push_column(&mut columns, column.into())?;
            }
            return Ok((columns, source));
        }

        let name = match body {
            Expr::Member { name, .. } => name.clone(),
            _ => "Value".to_string(),
        };
        let column = self.column(&visitor, &name, body)?;
        let binding = SourceBinding::Scalar {
            name,
            sql: column.sql.clone(),
        };

        Ok((vec![column], binding))
    }

    fn column(&self, visitor: &ExprCompiler<'_, '_>, name: &str, expr: &Expr) -> Result<Column, CompileError> {
        let plain = visitor.plain_column(expr)?;
        let mut sql = self.ctx.buffer();
        visitor.value(&mut sql, expr)?;

        Ok(Column {
            sql,
            name: name.to_string(),
            aliased: plain.as_deref() != Some(name),
        })
    }

    fn cast(&self, state: &mut SelectState, entity: EntityRef) -> Result<(), CompileError> {
        let current: Vec<String> = match &state.projection {
            Some(columns) => columns.iter().map(|column| column.name.clone()).collect(),
            None => self
                .visitor()
                .expand_source(&state.binding)?
                .into_iter()
                .map(|column| column.name)
                .collect(),
        };
        let fields = &entity.model().fields;

        let narrowed: Vec<String> = current
            .into_iter()
            .filter(|name| fields.iter().any(|field| field.name == name.as_str()))
            .filter(|name| state.cast.as_ref().is_none_or(|cast| cast.contains(name)))
            .collect();
        if narrowed.is_empty() {
            return Err(CompileError::unsupported(
                ErrorOrigin::Select,
                format!("Cast to '{}' shares no fields with the source", entity.name()),
            ));
        }
        state.cast = Some(narrowed);

        Ok(())
    }

    // ------------------------------------------------------------------
    // join
    // ------------------------------------------------------------------

    fn join(&self, state: &mut SelectState, call: &MethodCall) -> Result<(), CompileError> {
        state.require_rows(call.method)?;
        let (Some(inner), Some(outer_key), Some(inner_key), Some(result)) = (
            call.args.first(),
            call.lambda(1),
            call.lambda(2),
            call.lambda(3),
        ) else {
            return Err(CompileError::select_syntax(
                "'Join' requires an inner source, two key selectors and a result selector",
            ));
        };

        let (entity, filters) = inner_source(inner)?;
        let inner_param = lambda_param(inner_key)?;
        let shape = self.ctx.shape(entity)?;
        let alias = self.ctx.bind_alias(self.scope, inner_param);
        let inner_binding = SourceBinding::Table {
            shape: shape.clone(),
            alias: alias.clone(),
        };
        let outer_binding = state.binding.clone();

        self.ctx
            .bind_param(self.scope, lambda_param(outer_key)?, outer_binding.clone());
        self.ctx
            .bind_param(self.scope, inner_param, inner_binding.clone());

        let outer_keys = key_list(&outer_key.body);
        let inner_keys = key_list(&inner_key.body);
        if outer_keys.len() != inner_keys.len() {
            return Err(CompileError::select_syntax(
                "join key selectors must produce the same number of keys",
            ));
        }

        let visitor = self.visitor();
        let mut join = self.ctx.buffer();
        join.write("INNER JOIN ")
            .write_identifier(&shape.table)
            .white_space()
            .write_identifier(&alias)
            .write(" ON ");
        for (i, (outer, inner)) in outer_keys.into_iter().zip(inner_keys).enumerate() {
            if i > 0 {
                join.and();
            }
            visitor.value(&mut join, outer)?;
            join.equal();
            visitor.value(&mut join, inner)?;
        }
        state.joins.push(join);

        for filter in filters {
            self.fuse(state, filter, &inner_binding, false)?;
        }

        let [outer_param, inner_param] = result.params.as_slice() else {
            return Err(CompileError::select_syntax(
                "join result selector must take two parameters",
            ));
        };
        self.ctx
            .bind_param(self.scope, &outer_param.name, outer_binding);
        self.ctx
            .bind_param(self.scope, &inner_param.name, inner_binding);

        let (columns, binding) = self.projection(&result.body)?;
        state.projection = Some(columns);
        state.binding = binding;
        state.phase = Phase::Joined;

        Ok(())
    }

    // ------------------------------------------------------------------
    // set operations
    // ------------------------------------------------------------------

    fn set_operation(&self, state: SelectState, call: &MethodCall) -> Result<SelectState, CompileError> {
        let op = match call.method {
            Method::Union => SetOp::Union,
            Method::Concat => SetOp::UnionAll,
            Method::Intersect => SetOp::Intersect,
            _ => SetOp::Except,
        };
        let keyword = self.ctx.dialect().set_operator(op)?;
        let other = call.args.first().ok_or_else(|| {
            CompileError::select_syntax(format!("'{}' requires a second query", call.method))
        })?;

        let (left, names) = self.branch(state)?;

        let right = Self::new(self.ctx, self.parent, needs_qualifier(other));
        let right_state = right.build(other, &right.alias_hint(other, None))?;
        let (right_sql, right_names) = right.branch(right_state)?;
        if right_names.len() != names.len() {
            return Err(CompileError::select_syntax(format!(
                "'{}' branches select {} and {} columns",
                call.method,
                names.len(),
                right_names.len()
            )));
        }

        let mut sql = self.ctx.buffer();
        sql.append(left)
            .write(&format!(" {keyword} "))
            .append(right_sql);

        let alias = self.ctx.config.union_alias.clone();
        let mut state = SelectState::new(
            Source::Derived {
                sql,
                alias: alias.clone(),
            },
            SourceBinding::Derived {
                alias,
                columns: Rc::new(names),
            },
            self.ctx.buffer(),
        );
        state.union = true;

        Ok(state)
    }

    /// One side of a set operation. A paged side keeps its window inside a
    /// `SELECT * FROM (...)` wrapper; an unpaged side drops its ordering.
    fn branch(&self, mut state: SelectState) -> Result<(SqlBuffer, Vec<String>), CompileError> {
        if state.paging.is_empty() {
            state.order.clear();
            return self.render_with(state, None, true);
        }

        let (inner, names) = self.render_with(state, None, true)?;
        let mut out = self.ctx.buffer();
        out.write("SELECT * FROM (")
            .append(inner)
            .write(") ")
            .write_identifier(&self.ctx.branch_alias());

        Ok((out, names))
    }

    // ------------------------------------------------------------------
    // terminals
    // ------------------------------------------------------------------

    /// Aggregate or element operator over its source chain.
    fn terminal(&self, call: &MethodCall) -> Result<(Statement, Vec<String>), CompileError> {
        let source = call.target.as_ref().ok_or_else(|| {
            CompileError::select_syntax(format!("'{}' has no source", call.method))
        })?;
        let terminal_lambda = call.args.iter().find_map(|arg| match arg {
            Expr::Lambda(lambda) => Some(lambda),
            _ => None,
        });
        let state = self.build(source, &self.alias_hint(source, terminal_lambda))?;

        if call.method.is_aggregate() {
            self.aggregate(state, call)
        } else {
            self.element(state, call)
        }
    }

    fn aggregate(
        &self,
        mut state: SelectState,
        call: &MethodCall,
    ) -> Result<(Statement, Vec<String>), CompileError> {
        let method = call.method;
        state.require_unpaged(method)?;

        let mut value = self.ctx.buffer();
        match method {
            Method::Count | Method::LongCount => {
                if let Some(predicate) = call.lambda(0) {
                    let binding = state.binding.clone();
                    self.fuse(&mut state, predicate, &binding, false)?;
                }
                if state.distinct {
                    return self.distinct_count(state, method);
                }
                match single_key(&state) {
                    Some((alias, column)) => {
                        value.write("COUNT(").write_column(&alias, &column).close_brace();
                    }
                    None => {
                        value.write("COUNT(*)");
                    }
                }
            }
            _ => {
                let function = match method {
                    Method::Max => "MAX",
                    Method::Min => "MIN",
                    Method::Sum => "SUM",
                    _ => "AVG",
                };
                value.write(function).open_brace();
                self.aggregate_operand(&mut value, &state, call)?;
                value.close_brace();
            }
        }
        state.phase = Phase::Aggregated;

        let (sql, names) = self.render_with(
            state,
            Some((value, vec![method.name().to_string()])),
            self.parent.is_some(),
        )?;
        let (required, default_value) = match method {
            Method::Count | Method::LongCount => (false, None),
            Method::Sum => {
                let zero = if call.ty.scalar_kind() == Some(ScalarKind::Float) {
                    Value::Float(0.0)
                } else {
                    Value::Int(0)
                };
                (false, Some(zero))
            }
            _ => (!call.ty.is_nullable(), None),
        };

        let statement = Statement {
            required,
            default_value,
            ..Statement::new(sql, StatementKind::Scalar)
        };

        Ok((statement, names))
    }

    /// Column an argument-less aggregate works on: the selector, the single
    /// projected column, or the single key column.
    fn aggregate_operand(
        &self,
        out: &mut SqlBuffer,
        state: &SelectState,
        call: &MethodCall,
    ) -> Result<(), CompileError> {
        if let Some(selector) = call.lambda(0) {
            self.ctx
                .bind_param(self.scope, lambda_param(selector)?, state.binding.clone());
            return self.visitor().value(out, &selector.body);
        }

        match (&state.projection, &state.binding) {
            (Some(columns), _) => match columns.as_slice() {
                [column] => {
                    out.append_ref(&column.sql);
                    Ok(())
                }
                _ => Err(CompileError::select_syntax(format!(
                    "'{}' needs a selector when more than one column is selected",
                    call.method
                ))),
            },
            (None, SourceBinding::Derived { alias, columns }) if columns.len() == 1 => {
                out.write_column(alias, &columns[0]);
                Ok(())
            }
            _ => match single_key(state) {
                Some((alias, column)) => {
                    out.write_column(&alias, &column);
                    Ok(())
                }
                None => Err(CompileError::select_syntax(format!(
                    "'{}' needs a selector: the source has no single key column",
                    call.method
                ))),
            },
        }
    }

    /// `SELECT COUNT(*) FROM (SELECT DISTINCT ...) [t]`.
    fn distinct_count(
        &self,
        mut state: SelectState,
        method: Method,
    ) -> Result<(Statement, Vec<String>), CompileError> {
        state.order.clear();
        let (inner, _) = self.render_with(state, None, true)?;
        let alias = self
            .ctx
            .bind_alias(self.scope, &self.ctx.config.default_alias);

        let mut out = self.ctx.buffer();
        out.write("SELECT COUNT(*) FROM (")
            .append(inner)
            .write(") ")
            .write_identifier(&alias);

        Ok((
            Statement::new(out, StatementKind::Scalar),
            vec![method.name().to_string()],
        ))
    }

    fn element(
        &self,
        mut state: SelectState,
        call: &MethodCall,
    ) -> Result<(Statement, Vec<String>), CompileError> {
        let method = call.method;
        let indexed = matches!(method, Method::ElementAt | Method::ElementAtOrDefault);

        let mut default_value = state.default_value.take();
        for arg in &call.args {
            match arg {
                Expr::Lambda(predicate) => {
                    let binding = state.binding.clone();
                    self.fuse(&mut state, predicate, &binding, false)?;
                }
                _ if indexed => {}
                other => default_value = self.visitor().fold(other)?,
            }
        }

        match method {
            Method::First | Method::FirstOrDefault => state.limit(1),
            Method::Single | Method::SingleOrDefault => state.limit(2),
            Method::Last | Method::LastOrDefault => {
                state.require_order(method)?;
                state.reversed = !state.reversed;
                state.limit(1);
            }
            _ => {
                let index = self.count_arg(call)?;
                state.skip(index);
                state.limit(1);
            }
        }

        let required = matches!(
            method,
            Method::First | Method::Single | Method::Last | Method::ElementAt
        );
        let (sql, names) = self.render(state)?;
        let statement = Statement {
            required,
            default_value,
            ..Statement::new(sql, StatementKind::Select)
        };

        Ok((statement, names))
    }

    // ------------------------------------------------------------------
    // rendering
    // ------------------------------------------------------------------

    /// Render at this compiler's own level: nested compilers render subqueries.
    fn render(&self, state: SelectState) -> Result<(SqlBuffer, Vec<String>), CompileError> {
        self.render_with(state, None, self.parent.is_some())
    }

    /// Render through the dialect, optionally replacing the select list.
    /// `nested` marks output that is embedded in another statement.
    fn render_with(
        &self,
        state: SelectState,
        columns: Option<(SqlBuffer, Vec<String>)>,
        nested: bool,
    ) -> Result<(SqlBuffer, Vec<String>), CompileError> {
        let union = state.union;
        let paging = state.paging;
        let window_alias = if paging.skip > 0 {
            self.ctx.window_alias()
        } else {
            String::new()
        };
        let mut parts = self.parts(state, columns)?;
        parts.window_alias = window_alias;
        parts.nested = nested;
        let names = parts.column_names.clone();

        let mut out = self.ctx.buffer();
        let dialect = self.ctx.dialect();
        if union {
            dialect.page_union(&mut out, parts, paging)?;
        } else {
            dialect.page(&mut out, parts, paging)?;
        }

        Ok((out, names))
    }

    fn parts(
        &self,
        state: SelectState,
        columns: Option<(SqlBuffer, Vec<String>)>,
    ) -> Result<SelectParts, CompileError> {
        let SelectState {
            phase,
            source,
            binding,
            joins,
            filter,
            truth,
            order,
            reversed,
            distinct,
            projection,
            cast,
            ..
        } = state;

        let (columns, column_names) = match columns {
            Some(columns) => columns,
            None => self.select_list(&binding, projection, cast.as_deref())?,
        };

        let mut body = self.ctx.buffer();
        body.write("FROM ");
        source.write(&mut body);
        for join in joins {
            body.white_space().append(join);
        }
        match truth {
            Truth::Sql => {
                body.write(" WHERE ").append(filter);
            }
            Truth::Always(false) => {
                body.write(" WHERE ").condition_literal(false);
            }
            Truth::Always(true) | Truth::Omitted => {}
        }

        let order_by = if phase == Phase::Aggregated || order.is_empty() {
            None
        } else {
            let mut keys = self.ctx.buffer();
            for (i, key) in order.into_iter().enumerate() {
                if i > 0 {
                    keys.delimiter();
                }
                keys.append(key.sql);
                if key.descending != reversed {
                    keys.write(" DESC");
                }
            }
            Some(keys)
        };

        Ok(SelectParts {
            distinct,
            columns,
            body,
            order_by,
            column_names,
            row_number_alias: self.ctx.config.row_number_alias.clone(),
            window_alias: String::new(),
            nested: false,
        })
    }

    fn select_list(
        &self,
        binding: &SourceBinding,
        projection: Option<Vec<Column>>,
        cast: Option<&[String]>,
    ) -> Result<(SqlBuffer, Vec<String>), CompileError> {
        let mut out = self.ctx.buffer();
        let columns = match projection {
            Some(columns) => columns,
            None => {
                if let (SourceBinding::Derived { columns, .. }, None) = (binding, cast) {
                    out.write("*");
                    return Ok((out, columns.to_vec()));
                }
                self.visitor()
                    .expand_source(binding)?
                    .into_iter()
                    .map(Column::from)
                    .collect()
            }
        };

        let columns: Vec<Column> = columns
            .into_iter()
            .filter(|column| cast.is_none_or(|names| names.contains(&column.name)))
            .collect();
        if columns.is_empty() {
            return Err(CompileError::select_syntax("no fields selected"));
        }

        let names = write_columns(&mut out, columns);

        Ok((out, names))
    }
}

/// True when a root query must alias its table: it joins, or one of its
/// operator arguments (set-operation operands aside) contains a subquery.
pub(crate) fn needs_qualifier(expr: &Expr) -> bool {
    let mut node = expr;
    while let Expr::Call(call) = node {
        match call.method {
            Method::Join => return true,
            Method::Union | Method::Concat | Method::Intersect | Method::Except => {}
            _ => {
                if call.args.iter().any(Expr::references_table) {
                    return true;
                }
            }
        }
        match &call.target {
            Some(target) => node = target,
            None => break,
        }
    }

    false
}

/// Parameter name of the lambda closest to the chain root.
fn chain_hint(expr: &Expr) -> Option<String> {
    let mut hint = None;
    let mut node = expr;
    while let Expr::Call(call) = node {
        let param = call.args.iter().find_map(|arg| match arg {
            Expr::Lambda(lambda) => lambda.params.first(),
            _ => None,
        });
        if let Some(param) = param {
            hint = Some(param.name.clone());
        }
        match &call.target {
            Some(target) => node = target,
            None => break,
        }
    }

    hint
}

fn required_lambda(call: &MethodCall) -> Result<&Lambda, CompileError> {
    call.lambda(0).ok_or_else(|| {
        CompileError::select_syntax(format!("'{}' requires a lambda argument", call.method))
    })
}

/// Entity and `Where` filters of a join's inner source.
fn inner_source(expr: &Expr) -> Result<(EntityRef, Vec<&Lambda>), CompileError> {
    let mut filters = Vec::new();
    let mut node = expr;
    loop {
        match node {
            Expr::Table { entity } => {
                filters.reverse();
                return Ok((*entity, filters));
            }
            Expr::Call(call) if matches!(call.method, Method::Where) => {
                filters.push(required_lambda(call)?);
                node = call.target.as_ref().ok_or_else(|| {
                    CompileError::select_syntax("'Where' has no source")
                })?;
            }
            _ => {
                return Err(CompileError::unsupported(
                    ErrorOrigin::Select,
                    "a join's inner source may only filter an entity table with Where",
                ));
            }
        }
    }
}

/// Key expressions of a join key selector; constructions give composite keys.
fn key_list(body: &Expr) -> Vec<&Expr> {
    match body.bindings() {
        Some(bindings) => bindings.iter().map(|(_, expr)| expr).collect(),
        None => vec![body],
    }
}

/// Single key column of an unprojected table source.
fn single_key(state: &SelectState) -> Option<(String, String)> {
    if state.projection.is_some() {
        return None;
    }
    let SourceBinding::Table { shape, alias } = &state.binding else {
        return None;
    };
    let mut keys = shape.key_columns();

    match (keys.next(), keys.next()) {
        (Some(key), None) => Some((alias.clone(), key.column.clone())),
        _ => None,
    }
}

fn push_column(columns: &mut Vec<Column>, column: Column) -> Result<(), CompileError> {
    if columns.iter().any(|existing| existing.name == column.name) {
        return Err(CompileError::select_syntax(format!(
            "duplicate column '{}' in projection",
            column.name
        )));
    }
    columns.push(column);

    Ok(())
}
