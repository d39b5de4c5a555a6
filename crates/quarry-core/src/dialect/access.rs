use crate::{
    dialect::{
        CallRewriter, ConcatStyle, Dialect, Engine, Paging, Rewriters, SelectParts, SetOp,
        TemplateRewriter,
    },
    error::{CompileError, ErrorOrigin},
    sql::SqlBuffer,
};
use std::sync::Arc;

const DEFAULT_REWRITERS: [TemplateRewriter; 2] = [
    TemplateRewriter::new("AddDays", "DATEADD('d', {1}, {0})"),
    TemplateRewriter::new("Now", "NOW()"),
];

///
/// Access
/// `TOP n` only: skipping rows and INTERSECT/EXCEPT are rejected.
///

#[derive(Clone, Debug)]
pub struct Access {
    rewriters: Rewriters,
}

impl Access {
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

impl Default for Access {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for Access {
    fn engine(&self) -> Engine {
        Engine::Access
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn page(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError> {
        if paging.skip > 0 {
            return Err(CompileError::unsupported(
                ErrorOrigin::Dialect,
                "Access does not support skipping rows",
            ));
        }
        SelectParts::write_head(out, parts.distinct, paging.take, parts.columns, parts.body);
        SelectParts::write_order_by(out, parts.order_by, None);

        Ok(())
    }

    fn index_of_function(&self) -> &'static str {
        "INSTR"
    }

    fn index_of_start_first(&self) -> bool {
        true
    }

    fn length_function(&self) -> &'static str {
        "LEN"
    }

    fn substring_function(&self) -> &'static str {
        "MID"
    }

    fn upper_function(&self) -> &'static str {
        "UCASE"
    }

    fn lower_function(&self) -> &'static str {
        "LCASE"
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Operator("&")
    }

    fn set_operator(&self, op: SetOp) -> Result<&'static str, CompileError> {
        match op {
            SetOp::Union => Ok("UNION"),
            SetOp::UnionAll => Ok("UNION ALL"),
            SetOp::Intersect | SetOp::Except => Err(CompileError::unsupported(
                ErrorOrigin::Dialect,
                format!("Access does not support {op:?}"),
            )),
        }
    }

    fn rewriter(&self, method: &str) -> Option<&dyn CallRewriter> {
        self.rewriters.find(method)
    }
}
