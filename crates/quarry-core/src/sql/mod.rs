//! SQL text assembly: the patchable text buffer, parameter naming, and the
//! compiled statement handed to the execution layer.

mod buffer;
mod compiled;
mod params;

#[cfg(test)]
mod tests;

// re-exports
pub use buffer::SqlBuffer;
pub use compiled::{CompiledSql, StatementKind};
pub use params::{BoundParameter, ParameterMap};

pub(crate) use params::{NameRegistry, ParamNames};
