//! Core runtime for Quarry: the expression tree and builders, table shapes,
//! dialects, the SQL buffer, and the query and command compilers.
#![warn(unreachable_pub)]

#[macro_use]
mod macros;

// public exports are one module level down
pub mod compile;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod model;
pub mod obs;
pub mod shape;
pub mod sql;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Upper bound on parameters in one `IN (...)` group.
///
/// Engines cap the number of bind parameters per statement; larger
/// membership lists are split into OR-joined groups of at most this size.
pub const MAX_IN_LIST_PARAMETERS: usize = 256;

///
/// Prelude
///
/// Prelude contains only query-building vocabulary and the compiler.
/// No buffers, scopes, metrics or shape internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        compile::{CommandOptions, Compiler},
        dialect::{Access, MySql, Oracle, SqlServer},
        expr::{Command, Expr, IntoExpr as _, Query},
        model::{FieldModel, TokenKind},
        sql::CompiledSql,
        traits::{EntityKind, FieldValues},
        value::{ScalarKind, Value},
    };
}
