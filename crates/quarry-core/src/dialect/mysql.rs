use crate::{
    dialect::{
        CallRewriter, ConcatStyle, Dialect, Engine, Paging, Rewriters, SelectParts,
        TemplateRewriter,
    },
    error::CompileError,
    sql::SqlBuffer,
};
use std::sync::Arc;

/// Row count MySQL documents for "offset without limit".
const UNBOUNDED_LIMIT: u64 = u64::MAX;

const DEFAULT_REWRITERS: [TemplateRewriter; 2] = [
    TemplateRewriter::new("AddDays", "DATE_ADD({0}, INTERVAL {1} DAY)"),
    TemplateRewriter::new("Now", "NOW()"),
];

///
/// MySql
/// `LIMIT [offset,] count` paging.
///

#[derive(Clone, Debug)]
pub struct MySql {
    rewriters: Rewriters,
}

impl MySql {
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

impl Default for MySql {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MySql {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn page(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError> {
        parts.write_plain(out);

        match (paging.skip, paging.take) {
            (0, None) => {}
            (0, Some(take)) => {
                out.write(&format!(" LIMIT {take}"));
            }
            (skip, take) => {
                let take = take.unwrap_or(UNBOUNDED_LIMIT);
                out.write(&format!(" LIMIT {skip}, {take}"));
            }
        }

        Ok(())
    }

    fn index_of_function(&self) -> &'static str {
        "LOCATE"
    }

    fn index_of_operands_swapped(&self) -> bool {
        true
    }

    fn length_function(&self) -> &'static str {
        "CHAR_LENGTH"
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Function
    }

    fn guid_function(&self) -> Option<&'static str> {
        Some("UUID()")
    }

    fn supports_limit_in_subquery(&self) -> bool {
        false
    }

    fn rewriter(&self, method: &str) -> Option<&dyn CallRewriter> {
        self.rewriters.find(method)
    }
}
