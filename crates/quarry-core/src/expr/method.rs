use crate::{model::EntityRef, value::Value};
use chrono::TimeDelta;
use std::fmt;

///
/// Method
///
/// Closed vocabulary of method-call nodes. `Contains`, `Any`, `All` and
/// `Count` are shared by query sources, in-memory sequences and text; the
/// compiler routes them by the static type and evaluability of the target.
///

#[derive(Clone, Copy, Debug)]
pub enum Method {
    // sequence query
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Reverse,
    Take,
    Skip,
    TakeWhile,
    SkipWhile,
    TakeLast,
    SkipLast,
    Distinct,
    Join,
    Union,
    Concat,
    Intersect,
    Except,
    Cast(EntityRef),
    DefaultIfEmpty,

    // terminal / enumerable
    Any,
    All,
    Contains,
    Count,
    LongCount,
    Max,
    Min,
    Sum,
    Average,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    LastOrDefault,
    ElementAt,
    ElementAtOrDefault,

    // command
    Insert,
    Update,
    Delete,
    Table,
    Timeout,

    // text
    StartsWith,
    EndsWith,
    IsNullOrEmpty,
    Substring,
    Trim,
    TrimStart,
    TrimEnd,
    ToUpper,
    ToLower,
    IndexOf,

    Custom(CustomMethod),
}

impl Method {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Where => "Where",
            Self::Select => "Select",
            Self::OrderBy => "OrderBy",
            Self::OrderByDescending => "OrderByDescending",
            Self::ThenBy => "ThenBy",
            Self::ThenByDescending => "ThenByDescending",
            Self::Reverse => "Reverse",
            Self::Take => "Take",
            Self::Skip => "Skip",
            Self::TakeWhile => "TakeWhile",
            Self::SkipWhile => "SkipWhile",
            Self::TakeLast => "TakeLast",
            Self::SkipLast => "SkipLast",
            Self::Distinct => "Distinct",
            Self::Join => "Join",
            Self::Union => "Union",
            Self::Concat => "Concat",
            Self::Intersect => "Intersect",
            Self::Except => "Except",
            Self::Cast(_) => "Cast",
            Self::DefaultIfEmpty => "DefaultIfEmpty",
            Self::Any => "Any",
            Self::All => "All",
            Self::Contains => "Contains",
            Self::Count => "Count",
            Self::LongCount => "LongCount",
            Self::Max => "Max",
            Self::Min => "Min",
            Self::Sum => "Sum",
            Self::Average => "Average",
            Self::First => "First",
            Self::FirstOrDefault => "FirstOrDefault",
            Self::Single => "Single",
            Self::SingleOrDefault => "SingleOrDefault",
            Self::Last => "Last",
            Self::LastOrDefault => "LastOrDefault",
            Self::ElementAt => "ElementAt",
            Self::ElementAtOrDefault => "ElementAtOrDefault",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Table => "Table",
            Self::Timeout => "Timeout",
            Self::StartsWith => "StartsWith",
            Self::EndsWith => "EndsWith",
            Self::IsNullOrEmpty => "IsNullOrEmpty",
            Self::Substring => "Substring",
            Self::Trim => "Trim",
            Self::TrimStart => "TrimStart",
            Self::TrimEnd => "TrimEnd",
            Self::ToUpper => "ToUpper",
            Self::ToLower => "ToLower",
            Self::IndexOf => "IndexOf",
            Self::Custom(custom) => custom.name,
        }
    }

    /// Methods that consume an upstream query and produce a new query.
    #[must_use]
    pub const fn is_query_operator(&self) -> bool {
        matches!(
            self,
            Self::Where
                | Self::Select
                | Self::OrderBy
                | Self::OrderByDescending
                | Self::ThenBy
                | Self::ThenByDescending
                | Self::Reverse
                | Self::Take
                | Self::Skip
                | Self::TakeWhile
                | Self::SkipWhile
                | Self::TakeLast
                | Self::SkipLast
                | Self::Distinct
                | Self::Join
                | Self::Union
                | Self::Concat
                | Self::Intersect
                | Self::Except
                | Self::Cast(_)
                | Self::DefaultIfEmpty
        )
    }

    /// Methods that end a query chain with a scalar or single row.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Any
                | Self::All
                | Self::Contains
                | Self::Count
                | Self::LongCount
                | Self::Max
                | Self::Min
                | Self::Sum
                | Self::Average
                | Self::First
                | Self::FirstOrDefault
                | Self::Single
                | Self::SingleOrDefault
                | Self::Last
                | Self::LastOrDefault
                | Self::ElementAt
                | Self::ElementAtOrDefault
        )
    }

    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Insert | Self::Update | Self::Delete | Self::Table | Self::Timeout
        )
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            Self::StartsWith
                | Self::EndsWith
                | Self::IsNullOrEmpty
                | Self::Substring
                | Self::Trim
                | Self::TrimStart
                | Self::TrimEnd
                | Self::ToUpper
                | Self::ToLower
                | Self::IndexOf
        )
    }

    /// True for the element operators that set a row limit.
    #[must_use]
    pub const fn is_element(&self) -> bool {
        matches!(
            self,
            Self::First
                | Self::FirstOrDefault
                | Self::Single
                | Self::SingleOrDefault
                | Self::Last
                | Self::LastOrDefault
                | Self::ElementAt
                | Self::ElementAtOrDefault
        )
    }

    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::Count | Self::LongCount | Self::Max | Self::Min | Self::Sum | Self::Average
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Client-side evaluator for a custom method over constant operands.
pub type CustomEval = fn(&[Value]) -> Result<Value, String>;

///
/// CustomMethod
///
/// Application-defined call. Dialect rewriters match on `name`; when no
/// rewriter applies and every operand is a compile-time constant, `eval`
/// folds the call into a parameter.
///

#[derive(Clone, Copy, Debug)]
pub struct CustomMethod {
    pub name: &'static str,
    pub eval: Option<CustomEval>,
}

impl CustomMethod {
    /// `date.AddDays(n)`; every built-in dialect registers a rewriter.
    pub const ADD_DAYS: Self = Self::new("AddDays").with_eval(add_days);

    /// Server clock; never folded client-side.
    pub const NOW: Self = Self::new("Now");

    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, eval: None }
    }

    #[must_use]
    pub const fn with_eval(mut self, eval: CustomEval) -> Self {
        self.eval = Some(eval);
        self
    }
}

fn add_days(operands: &[Value]) -> Result<Value, String> {
    match operands {
        [Value::Timestamp(at), Value::Int(days)] => TimeDelta::try_days(*days)
            .and_then(|delta| at.checked_add_signed(delta))
            .map(Value::Timestamp)
            .ok_or_else(|| format!("AddDays({days}) overflows the timestamp range")),
        [Value::Null, _] | [_, Value::Null] => Ok(Value::Null),
        _ => Err("AddDays expects a timestamp and an integer day count".to_string()),
    }
}
