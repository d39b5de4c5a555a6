use crate::{
    error::{CompileError, ErrorOrigin},
    model::TokenKind,
    value::Value,
};
use chrono::Utc;
use uuid::Uuid;

///
/// TokenValue
/// What an unbound token column contributes to a command.
///

#[derive(Debug)]
pub(super) enum TokenValue {
    /// Database-generated; the column is left out.
    Skip,
    Bind(Value),
    /// `col = col + 1`
    Increment,
}

/// Value for an unbound token column in `UPDATE ... SET`; a guid
/// identifies the row and is never regenerated.
pub(super) fn update_value(field: &str, kind: TokenKind) -> Result<TokenValue, CompileError> {
    match kind {
        TokenKind::Version => Ok(TokenValue::Increment),
        TokenKind::Guid => Ok(TokenValue::Skip),
        kind => generate(field, kind),
    }
}

/// Value for an unbound token column in `INSERT`; versions start at 1.
pub(super) fn insert_value(field: &str, kind: TokenKind) -> Result<TokenValue, CompileError> {
    match kind {
        TokenKind::Version => Ok(TokenValue::Bind(Value::Int(1))),
        kind => generate(field, kind),
    }
}

fn generate(field: &str, kind: TokenKind) -> Result<TokenValue, CompileError> {
    let value = match kind {
        TokenKind::Identity => return Ok(TokenValue::Skip),
        TokenKind::Guid => Value::Guid(Uuid::new_v4()),
        TokenKind::Timestamp => Value::Timestamp(Utc::now()),
        TokenKind::Version => Value::Int(1),
        TokenKind::Custom(generator) => generator(),
    };

    if value.is_null() {
        return Err(CompileError::domain(
            ErrorOrigin::Command,
            format!("token generator for '{field}' produced null"),
        ));
    }

    Ok(TokenValue::Bind(value))
}
