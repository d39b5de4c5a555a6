//! ## Crate layout
//! - `core`: expression tree, shapes, dialects, and the query and command compilers.
//! - `error`: public error type with a flat kind + origin taxonomy.
//!
//! The `prelude` module carries the vocabulary needed to build and compile
//! queries against entity models declared with [`entity_model!`].

pub use quarry_core as core;

pub mod error;

pub use error::Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//
// Macros
//

pub use quarry_core::entity_model;

use quarry_core::{
    compile::{CommandOptions, Compiler},
    config::CompilerConfig,
    dialect::{Access, Engine, MySql, Oracle, SqlServer},
    expr::Expr,
    sql::CompiledSql,
};

/// Build a compiler for `engine`, optionally configured from a TOML document.
pub fn compiler(engine: Engine, config: Option<&str>) -> Result<Compiler, Error> {
    let compiler = match engine {
        Engine::SqlServer => Compiler::new(SqlServer::new()),
        Engine::MySql => Compiler::new(MySql::new()),
        Engine::Oracle => Compiler::new(Oracle::new()),
        Engine::Access => Compiler::new(Access::new()),
    };

    match config {
        Some(source) => Ok(compiler.with_config(CompilerConfig::from_toml_str(source)?)?),
        None => Ok(compiler),
    }
}

/// Compile a read query, mapping failures onto [`Error`].
pub fn compile_query(compiler: &Compiler, query: impl Into<Expr>) -> Result<CompiledSql, Error> {
    Ok(compiler.compile_query(&query.into())?)
}

/// Compile a write command, mapping failures onto [`Error`].
pub fn compile_command(
    compiler: &Compiler,
    command: impl Into<Expr>,
    options: CommandOptions,
) -> Result<CompiledSql, Error> {
    Ok(compiler.compile_command_with(&command.into(), options)?)
}

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        Error,
        core::{
            compile::{CommandOptions, Compiler},
            dialect::{Access, Engine, MySql, Oracle, SqlServer},
            expr::{Command, CustomMethod, Expr, IntoExpr as _, Query},
            model::{FieldModel, TokenKind},
            sql::{CompiledSql, ParameterMap, StatementKind},
            traits::{EntityKind, FieldValues},
            value::{ScalarKind, TypeRef, Value},
        },
        entity_model,
    };
}

///
/// TESTS
///
