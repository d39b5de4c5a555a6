use crate::{error::CompileError, sql::ParameterMap, value::Value};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

///
/// StatementKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StatementKind {
    /// Row-returning SELECT.
    Select,
    /// Single-value SELECT (aggregates, EXISTS probes).
    Scalar,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    #[must_use]
    pub const fn is_command(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Select => "select",
            Self::Scalar => "scalar",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

///
/// CompiledSql
///
/// Final output of one compile: SQL text plus ordered parameters, with the
/// hints the execution layer needs to interpret the result.
///

#[derive(Clone, Debug)]
pub struct CompiledSql {
    pub sql: String,
    pub parameters: ParameterMap,
    pub kind: StatementKind,
    /// The originating terminal operator demands at least one row.
    pub required: bool,
    /// Client-side fallback when no row is produced.
    pub default_value: Option<Value>,
    /// Command timeout in seconds.
    pub timeout: Option<u32>,
}

impl CompiledSql {
    /// Hex SHA-256 of the SQL text; stable across runs for statement caching.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.sql.as_bytes());

        digest.iter().fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
    }

    /// Raise the "required row missing" error when a required statement
    /// produced no rows.
    pub fn check_required(&self, rows: usize) -> Result<(), CompileError> {
        if self.required && rows == 0 {
            return Err(CompileError::required_row_missing(&self.sql));
        }

        Ok(())
    }
}

impl fmt::Display for CompiledSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
