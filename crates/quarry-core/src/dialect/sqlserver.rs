use crate::{
    dialect::{
        CallRewriter, ConcatStyle, Dialect, Engine, Paging, Rewriters, SelectParts,
        TemplateRewriter, write_column_names,
    },
    error::CompileError,
    sql::SqlBuffer,
};
use std::sync::Arc;

/// Order key used when a window needs an ORDER BY and the query has none.
const NO_ORDER: &str = "(SELECT 1)";

const DEFAULT_REWRITERS: [TemplateRewriter; 2] = [
    TemplateRewriter::new("AddDays", "DATEADD(day, {1}, {0})"),
    TemplateRewriter::new("Now", "GETDATE()"),
];

///
/// SqlServer
///
/// `TOP n` for plain limits; an offset becomes a `ROW_NUMBER()` window in a
/// derived table, or `OFFSET/FETCH` when the select is DISTINCT or over a
/// set operation.
///

#[derive(Clone, Debug)]
pub struct SqlServer {
    rewriters: Rewriters,
}

impl SqlServer {
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

    /// `SELECT cols FROM (SELECT ..., ROW_NUMBER() OVER(...) AS rn ...) w WHERE rn > skip`.
    ///
    /// Without output names (an EXISTS probe) the outer list is the original
    /// select list and the window only carries the row number.
    fn row_number_window(out: &mut SqlBuffer, parts: SelectParts, paging: Paging) {
        let SelectParts {
            columns,
            body,
            order_by,
            column_names,
            row_number_alias,
            window_alias,
            nested,
            ..
        } = parts;

        out.write("SELECT ");
        let inner = if column_names.is_empty() {
            out.append(columns);
            None
        } else {
            write_column_names(out, &column_names);
            Some(columns)
        };

        out.write(" FROM (SELECT ");
        if let Some(columns) = inner {
            out.append(columns).delimiter();
        }
        out.write("ROW_NUMBER() OVER(ORDER BY ");
        match order_by {
            Some(keys) => out.append(keys),
            None => out.write(NO_ORDER),
        };
        out.write(") AS ").write_identifier(&row_number_alias);
        if !body.is_empty() {
            out.white_space().append(body);
        }
        out.write(") ").write_identifier(&window_alias).write(" WHERE ");
        out.write_identifier(&row_number_alias)
            .write(&format!(" > {}", paging.skip));
        if let Some(take) = paging.take {
            out.write(" AND ")
                .write_identifier(&row_number_alias)
                .write(&format!(" <= {}", paging.skip.saturating_add(take)));
        }

        // T-SQL rejects ORDER BY in a subquery that has no TOP or OFFSET
        if !nested {
            out.write(" ORDER BY ").write_identifier(&row_number_alias);
        }
    }
}

impl Default for SqlServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for SqlServer {
    fn engine(&self) -> Engine {
        Engine::SqlServer
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
        if paging.skip == 0 {
            SelectParts::write_head(out, parts.distinct, paging.take, parts.columns, parts.body);
            SelectParts::write_order_by(out, parts.order_by, None);
        } else if parts.distinct {
            parts.write_offset_fetch(out, paging, Some(NO_ORDER));
        } else {
            Self::row_number_window(out, parts, paging);
        }

        Ok(())
    }

    fn page_union(
        &self,
        out: &mut SqlBuffer,
        parts: SelectParts,
        paging: Paging,
    ) -> Result<(), CompileError> {
        if paging.skip == 0 {
            return self.page(out, parts, paging);
        }
        parts.write_offset_fetch(out, paging, Some(NO_ORDER));

        Ok(())
    }

    fn index_of_function(&self) -> &'static str {
        "CHARINDEX"
    }

    fn index_of_operands_swapped(&self) -> bool {
        true
    }

    fn length_function(&self) -> &'static str {
        "LEN"
    }

    fn substring_requires_length(&self) -> bool {
        true
    }

    fn concat_style(&self) -> ConcatStyle {
        ConcatStyle::Operator("+")
    }

    fn guid_function(&self) -> Option<&'static str> {
        Some("NEWID()")
    }

    fn rewriter(&self, method: &str) -> Option<&dyn CallRewriter> {
        self.rewriters.find(method)
    }
}
