use derive_more::Display;
use quarry_core::{
    config::ConfigError,
    error::{CompileError, ErrorClass, ErrorOrigin as CoreErrorOrigin},
};
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn display_with_kind(&self) -> String {
        format!("{}:{}: {}", self.origin, self.kind, self.message)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        let kind = match err.class {
            ErrorClass::Syntax => ErrorKind::Syntax,
            ErrorClass::Unsupported => ErrorKind::Unsupported,
            ErrorClass::Domain => ErrorKind::Domain,
            ErrorClass::NotFound => ErrorKind::NotFound,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorKind {
    Syntax,
    Unsupported,
    Domain,
    NotFound,
    Config,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Buffer,
    Visitor,
    Select,
    Command,
    Shape,
    Dialect,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Buffer => Self::Buffer,
            CoreErrorOrigin::Visitor => Self::Visitor,
            CoreErrorOrigin::Select => Self::Select,
            CoreErrorOrigin::Command => Self::Command,
            CoreErrorOrigin::Shape => Self::Shape,
            CoreErrorOrigin::Dialect => Self::Dialect,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}

///
/// TESTS
///
