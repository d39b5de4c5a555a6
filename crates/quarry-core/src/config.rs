//! Compiler configuration.
//!
//! Defaults: parameter prefix `p`, IN lists batched at 256 values, set
//! operations aliased `UNION_ALIAS`, fallback table alias `t`, row-number
//! column `__Row_number_`, and null captured comparisons dropped. A TOML
//! document may override any subset of fields.

use serde::Deserialize;
use thiserror::Error as ThisError;

/// Default prefix for generated parameter names (`p1`, `p2`, ...).
pub const DEFAULT_PARAMETER_PREFIX: &str = "p";

/// Default alias of the derived table produced by set operations.
pub const DEFAULT_UNION_ALIAS: &str = "UNION_ALIAS";

/// Default table alias when no lambda parameter name is available.
pub const DEFAULT_TABLE_ALIAS: &str = "t";

/// Default alias of the row-number column used by windowed paging.
pub const DEFAULT_ROW_NUMBER_ALIAS: &str = "__Row_number_";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to parse compiler config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parameter_prefix '{0}' must be a non-empty identifier")]
    InvalidParameterPrefix(String),

    #[error("in_list_batch must be between 1 and {max}, got {got}")]
    InvalidInListBatch { got: usize, max: usize },

    #[error("{field} must be a non-empty identifier, got '{value}'")]
    InvalidAlias { field: &'static str, value: String },
}

///
/// CompilerConfig
///
/// Tunables for one `Compiler`. Immutable once the compiler is built.
///
/// `drop_null_variable_comparisons` preserves a surprising default: when a
/// captured variable is null at compile time, the comparison it appears in is
/// omitted from the statement entirely instead of becoming `IS NULL`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub parameter_prefix: String,
    pub in_list_batch: usize,
    pub union_alias: String,
    pub default_alias: String,
    pub row_number_alias: String,
    pub drop_null_variable_comparisons: bool,
}

impl CompilerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate field ranges and identifier shapes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.parameter_prefix) {
            return Err(ConfigError::InvalidParameterPrefix(
                self.parameter_prefix.clone(),
            ));
        }

        if self.in_list_batch == 0 || self.in_list_batch > crate::MAX_IN_LIST_PARAMETERS {
            return Err(ConfigError::InvalidInListBatch {
                got: self.in_list_batch,
                max: crate::MAX_IN_LIST_PARAMETERS,
            });
        }

        for (field, value) in [
            ("union_alias", &self.union_alias),
            ("default_alias", &self.default_alias),
            ("row_number_alias", &self.row_number_alias),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidAlias {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            parameter_prefix: DEFAULT_PARAMETER_PREFIX.to_string(),
            in_list_batch: crate::MAX_IN_LIST_PARAMETERS,
            union_alias: DEFAULT_UNION_ALIAS.to_string(),
            default_alias: DEFAULT_TABLE_ALIAS.to_string(),
            row_number_alias: DEFAULT_ROW_NUMBER_ALIAS.to_string(),
            drop_null_variable_comparisons: true,
        }
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();

    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CompilerConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.parameter_prefix, "p");
        assert_eq!(config.in_list_batch, 256);
        assert_eq!(config.union_alias, "UNION_ALIAS");
        assert_eq!(config.default_alias, "t");
        assert_eq!(config.row_number_alias, "__Row_number_");
        assert!(config.drop_null_variable_comparisons);
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let config = CompilerConfig::from_toml_str(
            r#"
            parameter_prefix = "arg"
            in_list_batch = 16
            drop_null_variable_comparisons = false
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.parameter_prefix, "arg");
        assert_eq!(config.in_list_batch, 16);
        assert!(!config.drop_null_variable_comparisons);
        assert_eq!(config.union_alias, DEFAULT_UNION_ALIAS);
    }

    #[test]
    fn zero_batch_is_rejected() {
        let err = CompilerConfig::from_toml_str("in_list_batch = 0").expect_err("zero batch");

        assert!(matches!(
            err,
            ConfigError::InvalidInListBatch { got: 0, max: 256 }
        ));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let err = CompilerConfig::from_toml_str("in_list_batch = 1000").expect_err("big batch");

        assert!(matches!(err, ConfigError::InvalidInListBatch { got: 1000, .. }));
    }

    #[test]
    fn alias_must_be_identifier() {
        let err = CompilerConfig::from_toml_str(r#"union_alias = "u a""#).expect_err("bad alias");

        assert!(matches!(
            err,
            ConfigError::InvalidAlias {
                field: "union_alias",
                ..
            }
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = CompilerConfig::from_toml_str("page_size = 10").expect_err("unknown field");

        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
