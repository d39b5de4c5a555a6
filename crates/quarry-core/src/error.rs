use std::fmt;
use thiserror::Error as ThisError;

///
/// CompileError
///
/// Structured compile failure with a stable classification.
/// Every error aborts the current compile; nothing is retried.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct CompileError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl CompileError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a syntax error for an unsupported tree shape or chain order.
    pub(crate) fn syntax(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Syntax, origin, message)
    }

    /// Construct an unsupported-access error (type routing, field access, dialect gaps).
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct a domain error for bad captured data.
    pub(crate) fn domain(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Domain, origin, message)
    }

    /// Construct a visitor-origin syntax error.
    pub(crate) fn visitor_syntax(message: impl Into<String>) -> Self {
        Self::syntax(ErrorOrigin::Visitor, message)
    }

    /// Construct a select-origin syntax error.
    pub(crate) fn select_syntax(message: impl Into<String>) -> Self {
        Self::syntax(ErrorOrigin::Select, message)
    }

    /// Construct a command-origin syntax error.
    pub(crate) fn command_syntax(message: impl Into<String>) -> Self {
        Self::syntax(ErrorOrigin::Command, message)
    }

    /// Wrap a failure raised while evaluating a constant subtree.
    pub(crate) fn evaluation(message: impl fmt::Display) -> Self {
        Self::visitor_syntax(format!("failed to evaluate constant expression: {message}"))
    }

    /// Construct the standard "ordering required" error for reverse-dependent operators.
    pub(crate) fn ordering_required(method: &str) -> Self {
        Self::select_syntax(format!(
            "'{method}' must use ordering: call OrderBy/OrderByDescending first"
        ))
    }

    /// Construct a standardized unreadable/unwritable field error.
    pub(crate) fn field_access(entity: &str, field: &str, access: &str) -> Self {
        Self::unsupported(
            ErrorOrigin::Shape,
            format!("field '{field}' is not {access} on '{entity}'"),
        )
    }

    /// Construct the error raised by the execution layer when a required row is absent.
    pub fn required_row_missing(sql: &str) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Select,
            format!("required row missing for statement: {sql}"),
        )
    }

    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self.class, ErrorClass::Syntax)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub const fn is_domain(&self) -> bool {
        matches!(self.class, ErrorClass::Domain)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Error taxonomy separating bad query shape from bad data and missing rows.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    /// Unsupported tree shape, illegal chain order, empty projection, paging misuse.
    Syntax,
    /// Type routing failures, unreadable/unwritable fields, dialect capability gaps.
    Unsupported,
    /// Bad captured data (null membership entries, null token values).
    Domain,
    /// A required row was not produced by the execution layer.
    NotFound,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Syntax => "syntax",
            Self::Unsupported => "unsupported",
            Self::Domain => "domain",
            Self::NotFound => "not_found",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorOrigin {
    Buffer,
    Visitor,
    Select,
    Command,
    Shape,
    Dialect,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Buffer => "buffer",
            Self::Visitor => "visitor",
            Self::Select => "select",
            Self::Command => "command",
            Self::Shape => "shape",
            Self::Dialect => "dialect",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
