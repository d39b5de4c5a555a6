use crate::{
    compile::{
        scope::SourceBinding,
        select::ir::{Column, OrderKey, Source},
        visitor::Truth,
    },
    dialect::Paging,
    error::CompileError,
    expr::Method,
    sql::SqlBuffer,
    value::Value,
};

///
/// Phase
/// Where a query chain is in its lifecycle.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    /// Filters, ordering, joins and paging may still be applied.
    Collect,
    /// A join result selector is in place; more lambdas may follow.
    Joined,
    /// A `Select` projection closed the chain to lambda operators.
    Projected,
    /// An aggregate replaced the select list; ordering is meaningless.
    Aggregated,
}

///
/// SelectState
///
/// Accumulated SELECT while a chain is walked root-first.
/// `truth` is the fused WHERE outcome for `filter`; `reversed` flips every
/// order key at render time.
///

#[derive(Debug)]
pub(crate) struct SelectState {
    pub(crate) phase: Phase,
    pub(crate) source: Source,
    pub(crate) binding: SourceBinding,
    pub(crate) joins: Vec<SqlBuffer>,
    pub(crate) filter: SqlBuffer,
    pub(crate) truth: Truth,
    pub(crate) order: Vec<OrderKey>,
    pub(crate) reversed: bool,
    pub(crate) paging: Paging,
    pub(crate) distinct: bool,
    pub(crate) projection: Option<Vec<Column>>,
    pub(crate) cast: Option<Vec<String>>,
    pub(crate) union: bool,
    pub(crate) default_value: Option<Value>,
}

impl SelectState {
    pub(crate) fn new(source: Source, binding: SourceBinding, filter: SqlBuffer) -> Self {
        Self {
            phase: Phase::Collect,
            source,
            binding,
            joins: Vec::new(),
            filter,
            truth: Truth::Always(true),
            order: Vec::new(),
            reversed: false,
            paging: Paging::default(),
            distinct: false,
            projection: None,
            cast: None,
            union: false,
            default_value: None,
        }
    }

    /// Lambda operators need an open (unprojected) row source.
    pub(crate) fn require_rows(&self, method: Method) -> Result<(), CompileError> {
        match self.phase {
            Phase::Collect | Phase::Joined => Ok(()),
            Phase::Projected | Phase::Aggregated => Err(CompileError::select_syntax(format!(
                "'{method}' cannot follow Select"
            ))),
        }
    }

    pub(crate) fn require_order(&self, method: Method) -> Result<(), CompileError> {
        if self.order.is_empty() {
            return Err(CompileError::ordering_required(method.name()));
        }

        Ok(())
    }

    pub(crate) fn require_unpaged(&self, method: Method) -> Result<(), CompileError> {
        if !self.paging.is_empty() {
            return Err(CompileError::select_syntax(format!(
                "'{method}' cannot be combined with Take or Skip"
            )));
        }

        Ok(())
    }

    /// `Take(count)` over an existing window: a smaller count is rejected,
    /// a larger one keeps the current window.
    pub(crate) fn take(&mut self, count: u64) -> Result<(), CompileError> {
        if let Some(current) = self.paging.take
            && count < current
        {
            return Err(CompileError::select_syntax(format!(
                "Take({count}) is out of range for a window of {current} rows: index out of range"
            )));
        }
        self.limit(count);

        Ok(())
    }

    /// Cap the window at `count` rows.
    pub(crate) fn limit(&mut self, count: u64) {
        self.paging.take = Some(self.paging.take.map_or(count, |current| current.min(count)));
    }

    pub(crate) fn skip(&mut self, count: u64) {
        self.paging.skip += count;
    }
}
