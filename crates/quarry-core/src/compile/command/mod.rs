//! Write-command compiler: INSERT, UPDATE and DELETE.
//!
//! A command chain is a table root followed by an optional table-name
//! override, `Where` filters, an optional timeout and exactly one action.

mod token;

#[cfg(test)]
mod tests;

use crate::{
    compile::{
        CommandOptions, Statement,
        context::CompileContext,
        scope::{ScopeId, SourceBinding},
        select::{Column, SelectCompiler},
        visitor::{ExprCompiler, Truth, lambda_param},
    },
    dialect::Engine,
    error::{CompileError, ErrorOrigin},
    expr::{BinaryOp, Expr, Lambda, Method, MethodCall},
    model::{EntityRef, TokenKind},
    shape::TableShape,
    sql::{SqlBuffer, StatementKind},
    value::Value,
};
use std::sync::Arc;
use token::TokenValue;

///
/// Action
///

enum Action<'e> {
    /// Zero-parameter construction lambda or source query.
    Insert(&'e Expr),
    Update(&'e Lambda),
    Delete,
}

impl Action<'_> {
    const fn kind(&self) -> StatementKind {
        match self {
            Self::Insert(_) => StatementKind::Insert,
            Self::Update(_) => StatementKind::Update,
            Self::Delete => StatementKind::Delete,
        }
    }
}

///
/// CommandPlan
/// A command chain unwound into its parts.
///

struct CommandPlan<'e> {
    entity: EntityRef,
    table: Option<String>,
    filters: Vec<&'e Lambda>,
    action: Action<'e>,
    timeout: Option<u32>,
}

///
/// CommandCompiler
///

pub(crate) struct CommandCompiler<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    options: CommandOptions,
    scope: ScopeId,
}

impl<'c, 'a> CommandCompiler<'c, 'a> {
    pub(crate) fn new(ctx: &'c CompileContext<'a>, options: CommandOptions) -> Self {
        Self {
            ctx,
            options,
            scope: ctx.push_scope(None),
        }
    }

    pub(crate) fn compile(&self, expr: &Expr) -> Result<Statement, CompileError> {
        let plan = plan(expr, |arg| self.visitor().fold(arg))?;
        let shape = self.ctx.shape(plan.entity)?;
        let table = plan.table.clone().unwrap_or_else(|| shape.table.clone());

        let sql = match plan.action {
            Action::Insert(source) => self.insert(&shape, &table, source)?,
            Action::Update(setter) => self.update(&shape, &table, &plan, setter)?,
            Action::Delete => self.delete(&shape, &table, &plan)?,
        };

        Ok(Statement {
            timeout: plan.timeout,
            ..Statement::new(sql, plan.action.kind())
        })
    }

    const fn visitor(&self) -> ExprCompiler<'c, 'a> {
        ExprCompiler::new(self.ctx, self.scope)
    }

    /// SQL Server and Access address the target through an alias.
    fn qualified(&self) -> bool {
        matches!(
            self.ctx.dialect().engine(),
            Engine::SqlServer | Engine::Access
        )
    }

    /// Bind the target row under an alias named after the first lambda.
    fn bind_target(&self, shape: &Arc<TableShape>, plan: &CommandPlan<'_>) -> (SourceBinding, String) {
        let alias = if self.qualified() {
            let hint = plan
                .filters
                .iter()
                .copied()
                .chain(match plan.action {
                    Action::Update(setter) => Some(setter),
                    _ => None,
                })
                .find_map(|lambda| lambda.params.first())
                .map_or(self.ctx.config.default_alias.as_str(), |param| param.name.as_str());
            self.ctx.bind_alias(self.scope, hint)
        } else {
            String::new()
        };

        let binding = SourceBinding::Table {
            shape: Arc::clone(shape),
            alias: alias.clone(),
        };

        (binding, alias)
    }

    /// ` WHERE ...` for an UPDATE or DELETE, enforcing a narrowing filter.
    fn filter(
        &self,
        plan: &CommandPlan<'_>,
        binding: &SourceBinding,
        method: Method,
    ) -> Result<Option<SqlBuffer>, CompileError> {
        let visitor = self.visitor();
        let mut filter = self.ctx.buffer();
        let mut truth = Truth::Always(true);
        for predicate in &plan.filters {
            self.ctx
                .bind_param(self.scope, lambda_param(predicate)?, binding.clone());
            truth = ExprCompiler::connect(&mut filter, BinaryOp::And, truth, 0, |buf| {
                visitor.condition(buf, &predicate.body)
            })?;
        }

        let mut clause = self.ctx.buffer();
        match truth {
            Truth::Sql => {
                clause.write(" WHERE ").append(filter);
            }
            Truth::Always(false) => {
                clause.write(" WHERE ").condition_literal(false);
            }
            Truth::Always(true) | Truth::Omitted => {
                if !self.options.allow_unfiltered {
                    return Err(CompileError::command_syntax(format!(
                        "'{method}' requires a Where filter that narrows the affected rows; \
                         enable allow_unfiltered to target every row"
                    )));
                }
                return Ok(None);
            }
        }

        Ok(Some(clause))
    }

    // ------------------------------------------------------------------
    // update / delete
    // ------------------------------------------------------------------

    fn update(
        &self,
        shape: &Arc<TableShape>,
        table: &str,
        plan: &CommandPlan<'_>,
        setter: &Lambda,
    ) -> Result<SqlBuffer, CompileError> {
        let (binding, alias) = self.bind_target(shape, plan);
        self.ctx
            .bind_param(self.scope, lambda_param(setter)?, binding.clone());
        let fields = setter.body.bindings().ok_or_else(|| {
            CompileError::command_syntax("'Update' requires a construction of the fields to set")
        })?;

        let visitor = self.visitor();
        let mut set = self.ctx.buffer();
        let mut count = 0;
        for (name, expr) in fields {
            let column = shape.writable(name)?;
            if count > 0 {
                set.delimiter();
            }
            set.write_identifier(&column.column).equal();
            visitor.value(&mut set, expr)?;
            count += 1;
        }

        for token in &shape.tokens {
            if fields.iter().any(|(name, _)| name == token.field) || shape.is_key(token.field) {
                continue;
            }
            let value = token::update_value(token.field, token.kind)?;
            if matches!(value, TokenValue::Skip) {
                continue;
            }
            let column = shape.writable(token.field)?;
            if count > 0 {
                set.delimiter();
            }
            set.write_identifier(&column.column).equal();
            match value {
                TokenValue::Bind(value) => {
                    set.parameter_named(token.field, value, column.type_ref());
                }
                TokenValue::Increment => {
                    set.write_column(&alias, &column.column).write(" + 1");
                }
                TokenValue::Skip => {}
            }
            count += 1;
        }

        if count == 0 {
            return Err(CompileError::command_syntax("no fields selected"));
        }

        let filter = self.filter(plan, &binding, Method::Update)?;

        let mut out = self.ctx.buffer();
        out.write("UPDATE ");
        if alias.is_empty() {
            out.write_identifier(table);
        } else {
            out.write_identifier(&alias);
        }
        out.write(" SET ").append(set);
        if !alias.is_empty() {
            out.write(" FROM ")
                .write_identifier(table)
                .white_space()
                .write_identifier(&alias);
        }
        if let Some(filter) = filter {
            out.append(filter);
        }

        Ok(out)
    }

    fn delete(
        &self,
        shape: &Arc<TableShape>,
        table: &str,
        plan: &CommandPlan<'_>,
    ) -> Result<SqlBuffer, CompileError> {
        let (binding, alias) = self.bind_target(shape, plan);
        let filter = self.filter(plan, &binding, Method::Delete)?;

        let mut out = self.ctx.buffer();
        if alias.is_empty() {
            out.write("DELETE FROM ").write_identifier(table);
        } else {
            out.write("DELETE ")
                .write_identifier(&alias)
                .write(" FROM ")
                .write_identifier(table)
                .white_space()
                .write_identifier(&alias);
        }
        if let Some(filter) = filter {
            out.append(filter);
        }

        Ok(out)
    }

    // ------------------------------------------------------------------
    // insert
    // ------------------------------------------------------------------

    fn insert(
        &self,
        shape: &Arc<TableShape>,
        table: &str,
        source: &Expr,
    ) -> Result<SqlBuffer, CompileError> {
        let (columns, body) = match source {
            Expr::Lambda(values) => self.insert_values(shape, values)?,
            source if source.is_query() => self.insert_select(shape, source)?,
            _ => {
                return Err(CompileError::command_syntax(
                    "'Insert' requires a parameterless construction or a source query",
                ));
            }
        };

        let mut out = self.ctx.buffer();
        out.write("INSERT INTO ")
            .write_identifier(table)
            .write(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.delimiter();
            }
            out.write_identifier(column);
        }
        out.write(") ").append(body);

        Ok(out)
    }

    /// Column list and `VALUES (...)` from a construction lambda.
    fn insert_values(
        &self,
        shape: &TableShape,
        values: &Lambda,
    ) -> Result<(Vec<String>, SqlBuffer), CompileError> {
        if !values.params.is_empty() {
            return Err(CompileError::command_syntax(
                "'Insert' values must not take parameters",
            ));
        }
        let fields = values.body.bindings().ok_or_else(|| {
            CompileError::command_syntax("'Insert' requires a construction of the fields to insert")
        })?;

        let visitor = self.visitor();
        let mut columns = Vec::new();
        let mut body = self.ctx.buffer();
        body.write("VALUES (");
        for (name, expr) in fields {
            let column = shape.writable(name)?;
            if !columns.is_empty() {
                body.delimiter();
            }
            visitor.value(&mut body, expr)?;
            columns.push(column.column.clone());
        }

        let unbound = self.insert_tokens(shape, false, |field| {
            fields.iter().any(|(name, _)| name == field)
        })?;
        for (column, sql) in unbound {
            if !columns.is_empty() {
                body.delimiter();
            }
            body.append(sql);
            columns.push(column);
        }

        if columns.is_empty() {
            return Err(CompileError::command_syntax("no fields selected"));
        }
        body.close_brace();

        Ok((columns, body))
    }

    /// Column list and `SELECT ...` from a source query's projection.
    fn insert_select(
        &self,
        shape: &TableShape,
        source: &Expr,
    ) -> Result<(Vec<String>, SqlBuffer), CompileError> {
        let select = SelectCompiler::nested(self.ctx, self.scope);
        let mut state = select.insert_source(source)?;
        let projection = state.projection.as_mut().ok_or_else(|| {
            CompileError::command_syntax("insert source query must end in a Select projection")
        })?;

        let mut columns = Vec::with_capacity(projection.len());
        for column in projection.iter() {
            columns.push(shape.writable(&column.name)?.column.clone());
        }

        let names: Vec<String> = projection.iter().map(|column| column.name.clone()).collect();
        let unbound = self.insert_tokens(shape, true, |field| names.iter().any(|name| name == field))?;
        for (column, sql) in unbound {
            projection.push(Column {
                sql,
                name: column.clone(),
                aliased: false,
            });
            columns.push(column);
        }

        let body = select.render_state(state)?;

        Ok((columns, body))
    }

    /// Physical column and generated value for each token column the
    /// caller left unbound.
    ///
    /// `per_row` is set for `INSERT ... SELECT`: guids become the engine's
    /// per-row function, and a generated key that has none is rejected.
    fn insert_tokens(
        &self,
        shape: &TableShape,
        per_row: bool,
        bound: impl Fn(&str) -> bool,
    ) -> Result<Vec<(String, SqlBuffer)>, CompileError> {
        let mut tokens = Vec::new();
        for token in &shape.tokens {
            if bound(token.field) {
                continue;
            }
            let column = shape.writable(token.field)?;
            let mut sql = self.ctx.buffer();

            if per_row && matches!(token.kind, TokenKind::Guid) {
                let function = self.ctx.dialect().guid_function().ok_or_else(|| {
                    CompileError::unsupported(
                        ErrorOrigin::Dialect,
                        format!(
                            "{} has no per-row guid function for token '{}'",
                            self.ctx.dialect().engine(),
                            token.field
                        ),
                    )
                })?;
                sql.write(function);
                tokens.push((column.column.clone(), sql));
                continue;
            }
            if per_row && shape.is_key(token.field) && matches!(token.kind, TokenKind::Custom(_)) {
                return Err(CompileError::command_syntax(format!(
                    "key token '{}' cannot be generated per row in an insert from a source query",
                    token.field
                )));
            }

            if let TokenValue::Bind(value) = token::insert_value(token.field, token.kind)? {
                sql.parameter_named(token.field, value, column.type_ref());
                tokens.push((column.column.clone(), sql));
            }
        }

        Ok(tokens)
    }
}

/// Unwind a command chain root-first into a plan.
fn plan<'e>(
    expr: &'e Expr,
    fold: impl Fn(&Expr) -> Result<Option<Value>, CompileError>,
) -> Result<CommandPlan<'e>, CompileError> {
    let mut calls: Vec<&MethodCall> = Vec::new();
    let mut node = expr;
    while let Expr::Call(call) = node {
        calls.push(call);
        node = call.target.as_ref().ok_or_else(|| {
            CompileError::command_syntax(format!("'{}' has no source", call.method))
        })?;
    }
    let Expr::Table { entity } = node else {
        return Err(CompileError::unsupported(
            ErrorOrigin::Command,
            "command root must be an entity table",
        ));
    };

    let mut table = None;
    let mut filters = Vec::new();
    let mut action = None;
    let mut timeout = None;
    for call in calls.into_iter().rev() {
        match call.method {
            Method::Table => {
                let name = match call.args.first().map(&fold).transpose()?.flatten() {
                    Some(Value::Text(name)) => name,
                    _ => String::new(),
                };
                if name.trim().is_empty() {
                    return Err(CompileError::command_syntax("table name must not be empty"));
                }
                table = Some(name);
            }
            Method::Timeout => {
                let seconds = match call.args.first().map(&fold).transpose()?.flatten() {
                    Some(Value::Int(seconds)) => u32::try_from(seconds).ok(),
                    _ => None,
                };
                timeout = Some(seconds.ok_or_else(|| {
                    CompileError::command_syntax("'Timeout' requires a non-negative constant")
                })?);
            }
            Method::Where => {
                filters.push(call.lambda(0).ok_or_else(|| {
                    CompileError::command_syntax("'Where' requires a lambda argument")
                })?);
            }
            Method::Insert | Method::Update | Method::Delete => {
                if action.is_some() {
                    return Err(CompileError::command_syntax(
                        "a command may contain only one of Insert, Update or Delete",
                    ));
                }
                action = Some(match call.method {
                    Method::Insert => Action::Insert(call.args.first().ok_or_else(|| {
                        CompileError::command_syntax("'Insert' requires values or a source query")
                    })?),
                    Method::Update => Action::Update(call.lambda(0).ok_or_else(|| {
                        CompileError::command_syntax("'Update' requires a setter lambda")
                    })?),
                    _ => Action::Delete,
                });
            }
            other => {
                return Err(CompileError::command_syntax(format!(
                    "'{other}' is not a command operation"
                )));
            }
        }
    }

    let action = action.ok_or_else(|| {
        CompileError::command_syntax("command requires Insert, Update or Delete")
    })?;
    if matches!(action, Action::Insert(_)) && !filters.is_empty() {
        return Err(CompileError::command_syntax(
            "insert does not support filtering directly; filter in the source query instead",
        ));
    }

    Ok(CommandPlan {
        entity: *entity,
        table,
        filters,
        action,
        timeout,
    })
}
