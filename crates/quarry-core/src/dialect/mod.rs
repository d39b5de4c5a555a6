//! Dialect contract and the built-in SQL dialects.
//!
//! A dialect is passive: it answers quoting, naming and function questions
//! and renders the final SELECT around structured parts once paging is
//! known. It never walks expression trees.

mod access;
mod mysql;
mod oracle;
mod rewrite;
mod sqlserver;

#[cfg(test)]
mod tests;

use crate::{error::CompileError, sql::SqlBuffer};
use std::fmt;

// re-exports
pub use access::Access;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use rewrite::{CallRewriter, Rewriters, TemplateRewriter};
pub use sqlserver::SqlServer;

///
/// Engine
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Engine {
    SqlServer,
    MySql,
    Oracle,
    Access,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SqlServer => "sqlserver",
            Self::MySql => "mysql",
            Self::Oracle => "oracle",
            Self::Access => "access",
        };
        write!(f, "{label}")
    }
}

///
/// SetOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetOp {
    Union,
    /// `Concat`: keeps duplicates.
    UnionAll,
    Intersect,
    Except,
}

///
/// ConcatStyle
/// How text `+` lowers.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConcatStyle {
    /// `CONCAT(a, b)`
    Function,
    /// `a <op> b`
    Operator(&'static str),
}

///
/// Paging
/// Row window of a SELECT; `skip == 0` means no offset.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Paging {
    pub take: Option<u64>,
    pub skip: u64,
}

impl Paging {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.take.is_none() && self.skip == 0
    }
}

///
/// SelectParts
///
/// Structured SELECT handed to the dialect for final rendering.
/// `body` starts at `FROM` and includes joins and the WHERE clause;
/// `order_by` holds the key list without the keyword.
///

#[derive(Debug)]
pub struct SelectParts {
    pub distinct: bool,
    pub columns: SqlBuffer,
    pub body: SqlBuffer,
    pub order_by: Option<SqlBuffer>,
    /// Output column names, in select-list order.
    pub column_names: Vec<String>,
    pub row_number_alias: String,
    /// Alias for a derived table the dialect wraps around the select.
    pub window_alias: String,
    /// Rendered inside another statement; no trailing ORDER BY without a row limit.
    pub nested: bool,
}

impl SelectParts {
    /// `SELECT [DISTINCT] [TOP n] columns body`.
    pub(crate) fn write_head(
        out: &mut SqlBuffer,
        distinct: bool,
        top: Option<u64>,
        columns: SqlBuffer,
        body: SqlBuffer,
    ) {
        out.write("SELECT ");
        if distinct {
            out.write("DISTINCT ");
        }
        if let Some(top) = top {
            out.write(&format!("TOP {top} "));
        }
        out.append(columns);
        if !body.is_empty() {
            out.white_space().append(body);
        }
    }

    /// ` ORDER BY keys`, or the fallback when there are no keys.
    pub(crate) fn write_order_by(
        out: &mut SqlBuffer,
        order_by: Option<SqlBuffer>,
        fallback: Option<&str>,
    ) {
        match (order_by, fallback) {
            (Some(keys), _) => {
                out.write(" ORDER BY ").append(keys);
            }
            (None, Some(fallback)) => {
                out.write(" ORDER BY ").write(fallback);
            }
            (None, None) => {}
        }
    }

    /// Render without any row window.
    pub(crate) fn write_plain(self, out: &mut SqlBuffer) {
        Self::write_head(out, self.distinct, None, self.columns, self.body);
        Self::write_order_by(out, self.order_by, None);
    }

    /// Render with ANSI `OFFSET n ROWS FETCH NEXT m ROWS ONLY`.
    pub(crate) fn write_offset_fetch(
        self,
        out: &mut SqlBuffer,
        paging: Paging,
        order_fallback: Option<&str>,
    ) {
        Self::write_head(out, self.distinct, None, self.columns, self.body);
        Self::write_order_by(out, self.order_by, order_fallback);
        if paging.skip > 0 || order_fallback.is_some() {
            out.write(&format!(" OFFSET {} ROWS", paging.skip));
        }
        if let Some(take) = paging.take {
            out.write(&format!(" FETCH NEXT {take} ROWS ONLY"));
        }
    }
}

///
/// Dialect
///
/// Engine-specific SQL knowledge consumed by the compilers. Implementations
/// must be shareable across threads; one instance serves every compile.
///

pub trait Dialect: fmt::Debug + Send + Sync {
    fn engine(&self) -> Engine;

    fn quote_identifier(&self, name: &str) -> String;

    /// Placeholder text for a named parameter.
    fn format_parameter(&self, name: &str) -> String {
        format!("@{name}")
    }

    /// Render a SELECT with its row window.
    fn page(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError>;

    /// Render a SELECT over a set-operation derived table.
    fn page_union(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError> {
        self.page(out, parts, paging)
    }

    /// Text search function (`CHARINDEX`, `LOCATE`, `INSTR`).
    fn index_of_function(&self) -> &'static str;

    /// True when the search function takes the needle before the haystack.
    fn index_of_operands_swapped(&self) -> bool {
        false
    }

    /// True when the optional start position comes first (`INSTR(start, s, t)`).
    fn index_of_start_first(&self) -> bool {
        false
    }

    fn length_function(&self) -> &'static str;

    fn substring_function(&self) -> &'static str {
        "SUBSTRING"
    }

    /// True when the substring function has no two-argument form.
    fn substring_requires_length(&self) -> bool {
        false
    }

    fn upper_function(&self) -> &'static str {
        "UPPER"
    }

    fn lower_function(&self) -> &'static str {
        "LOWER"
    }

    fn concat_style(&self) -> ConcatStyle;

    /// Per-row guid expression (`NEWID()`), if the engine has one.
    fn guid_function(&self) -> Option<&'static str> {
        None
    }

    /// False when a row-limited subquery cannot appear directly inside `IN (...)`.
    fn supports_limit_in_subquery(&self) -> bool {
        true
    }

    fn set_operator(&self, op: SetOp) -> Result<&'static str, CompileError> {
        Ok(match op {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::Except => "EXCEPT",
        })
    }

    /// `SELECT <expr>` for statements without a row source.
    fn select_scalar(&self, out: &mut SqlBuffer, expr: SqlBuffer) {
        out.write("SELECT ").append(expr);
    }

    /// Always-true / always-false predicate text.
    fn condition_literal(&self, value: bool) -> &'static str {
        if value { "1=1" } else { "1=0" }
    }

    /// Rewriter registered for a custom method name, if any.
    fn rewriter(&self, _method: &str) -> Option<&dyn CallRewriter> {
        None
    }
}

/// Comma-separated quoted column names (the outer list of a row-number window).
pub(crate) fn write_column_names(out: &mut SqlBuffer, names: &[String]) {
    if names.is_empty() {
        out.write("*");
        return;
    }
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.delimiter();
        }
        out.write_identifier(name);
    }
}
