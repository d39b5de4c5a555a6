use crate::{
    dialect::{
        CallRewriter, ConcatStyle, Dialect, Engine, Paging, Rewriters, SelectParts, SetOp,
        TemplateRewriter,
    },
    error::CompileError,
    sql::SqlBuffer,
};
use std::sync::Arc;

const DEFAULT_REWRITERS: [TemplateRewriter; 2] = [
    TemplateRewriter::new("AddDays", "({0} + NUMTODSINTERVAL({1}, 'DAY'))"),
    TemplateRewriter::new("Now", "SYSTIMESTAMP"),
];

///
/// Oracle
/// `OFFSET/FETCH` paging, `:name` parameters, `MINUS` for except.
///

#[derive(Clone, Debug)]
pub struct Oracle {
    rewriters: Rewriters,
}

impl Oracle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rewriters: Rewriters::from_templates(&DEFAULT_REWRITERS),
        }
    }

    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Arc<dyn CallRewriter>) -> Self {
        self.rewriters.push(rewriter);
        self
    }
}

impl Default for Oracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for Oracle {
    fn engine(&self) -> Engine {
        Engine::Oracle
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn format_parameter(&self, name: &str) -> String {
        format!(":{name}")
    }

    fn page(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError> {
        parts.write_offset_fetch(out, paging, None);

        Ok(())
    }

    fn index_of_function(&self) -> &'static str {
        "INSTR"
    }

    fn length_function(&self) -> &'static str {
        "LENGTH"
    }

    fn substring_function(&self) -> &'static str {
        "SUBSTR"
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Operator("||")
    }

    fn guid_function(&self) -> Option<&'static str> {
        Some("SYS_GUID()")
    }

    fn set_operator(&self, op: SetOp) -> Result<&'static str, CompileError> {
        Ok(match op {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::Except => "MINUS",
        })
    }

    fn select_scalar(&self, out: &mut SqlBuffer, expr: SqlBuffer) {
        out.write("SELECT ").append(expr).write(" FROM DUAL");
    }

    fn rewriter(&self, method: &str) -> Option<&dyn CallRewriter> {
        self.rewriters.find(method)
    }
}
