//! Compiler entry points.
//!
//! A [`Compiler`] owns the dialect, shape provider and config; each call runs
//! one pass over a fresh [`CompileContext`] and returns a [`CompiledSql`].

mod command;
mod context;
mod scope;
mod select;
mod visitor;

use crate::{
    config::{CompilerConfig, ConfigError},
    dialect::Dialect,
    error::CompileError,
    expr::{Expr, Method},
    obs::sink::Span,
    shape::{ModelShapes, ShapeProvider},
    sql::{CompiledSql, SqlBuffer, StatementKind},
    value::Value,
};
use command::CommandCompiler;
use context::CompileContext;
use select::SelectCompiler;
use std::sync::Arc;

///
/// CommandOptions
///
/// Per-call switches for write commands. `allow_unfiltered` permits UPDATE
/// and DELETE without a narrowing WHERE clause.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommandOptions {
    pub allow_unfiltered: bool,
}

///
/// Compiler
///
/// Stateless across calls; share one instance between threads.
///

#[derive(Clone)]
pub struct Compiler {
    dialect: Arc<dyn Dialect>,
    shapes: Arc<dyn ShapeProvider>,
    config: CompilerConfig,
}

impl Compiler {
    /// Compiler with model-derived shapes and the default config.
    #[must_use]
    pub fn new<D: Dialect + 'static>(dialect: D) -> Self {
        Self {
            dialect: Arc::new(dialect),
            shapes: Arc::new(ModelShapes),
            config: CompilerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_shapes(mut self, shapes: impl ShapeProvider + 'static) -> Self {
        self.shapes = Arc::new(shapes);
        self
    }

    /// Replace the config after validating it.
    pub fn with_config(mut self, config: CompilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;

        Ok(self)
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a read query: a chain rooted at an entity table, optionally
    /// ending in an aggregate, element or quantifier operator.
    pub fn compile_query(&self, expr: &Expr) -> Result<CompiledSql, CompileError> {
        self.run(expr, query_kind(expr), |ctx| {
            SelectCompiler::root(ctx, expr).compile(expr)
        })
    }

    /// Compile a write command that must carry a narrowing filter.
    pub fn compile_command(&self, expr: &Expr) -> Result<CompiledSql, CompileError> {
        self.compile_command_with(expr, CommandOptions::default())
    }

    pub fn compile_command_with(
        &self,
        expr: &Expr,
        options: CommandOptions,
    ) -> Result<CompiledSql, CompileError> {
        self.run(expr, command_kind(expr), |ctx| {
            CommandCompiler::new(ctx, options).compile(expr)
        })
    }

    fn run(
        &self,
        expr: &Expr,
        kind: StatementKind,
        compile: impl FnOnce(&CompileContext<'_>) -> Result<Statement, CompileError>,
    ) -> Result<CompiledSql, CompileError> {
        let entity_path = expr.root_entity().map_or("<unknown>", |entity| entity.path());
        let mut span = Span::new(kind, entity_path);
        let ctx = CompileContext::new(
            Arc::clone(&self.dialect),
            self.shapes.as_ref(),
            &self.config,
        );

        match compile(&ctx) {
            Ok(statement) => {
                let compiled = statement.into_compiled();
                span.set_output(compiled.parameters.len(), compiled.sql.len());
                tracing::debug!(
                    entity = entity_path,
                    kind = %compiled.kind,
                    engine = %self.dialect.engine(),
                    sql_len = compiled.sql.len(),
                    parameters = compiled.parameters.len(),
                    "compiled statement"
                );

                Ok(compiled)
            }
            Err(err) => {
                span.set_failed(err.class);
                tracing::debug!(
                    entity = entity_path,
                    class = %err.class,
                    origin = %err.origin,
                    error = %err,
                    "compile failed"
                );

                Err(err)
            }
        }
    }
}

///
/// Statement
/// Compiled text plus result hints, before parameters are extracted.
///

pub(crate) struct Statement {
    pub(crate) sql: SqlBuffer,
    pub(crate) kind: StatementKind,
    pub(crate) required: bool,
    pub(crate) default_value: Option<Value>,
    pub(crate) timeout: Option<u32>,
}

impl Statement {
    pub(crate) const fn new(sql: SqlBuffer, kind: StatementKind) -> Self {
        Self {
            sql,
            kind,
            required: false,
            default_value: None,
            timeout: None,
        }
    }

    pub(crate) fn into_compiled(self) -> CompiledSql {
        let (sql, parameters) = self.sql.into_parts();

        CompiledSql {
            sql,
            parameters,
            kind: self.kind,
            required: self.required,
            default_value: self.default_value,
            timeout: self.timeout,
        }
    }
}

/// Metrics kind for a read query, decided before compiling.
fn query_kind(expr: &Expr) -> StatementKind {
    match expr.as_call().map(|call| call.method) {
        Some(method) if method.is_aggregate() || matches!(method, Method::Any | Method::All | Method::Contains) => {
            StatementKind::Scalar
        }
        _ => StatementKind::Select,
    }
}

/// Metrics kind for a command chain; unknown chains count as deletes and
/// fail during compilation.
fn command_kind(expr: &Expr) -> StatementKind {
    let mut node = expr;
    while let Some(call) = node.as_call() {
        match call.method {
            Method::Insert => return StatementKind::Insert,
            Method::Update => return StatementKind::Update,
            Method::Delete => return StatementKind::Delete,
            _ => {}
        }
        match &call.target {
            Some(target) => node = target,
            None => break,
        }
    }

    StatementKind::Delete
}
