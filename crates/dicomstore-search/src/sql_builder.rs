//! Parameterized SQL building blocks.
//!
//! Every user-supplied value reaches the database through a named bind
//! parameter; the SQL text only ever contains validated identifiers,
//! keywords and placeholders.
//!
//! ## Parameter naming
//!
//! Placeholders are `@<column>_<n>`, where `n` comes from the indexer owned by
//! a [`ParamList`]. One `ParamList` is created per statement build and passed
//! by `&mut` through the whole compile, so names are unique across arbitrarily
//! nested expressions and nothing is shared between concurrent builds.

use std::fmt;

use dicomstore_core::{DictionaryTag, Level};
use thiserror::Error;

/// Errors that can occur while compiling filters and statements.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Tag {tag} is not queryable at the {level} level")]
    InvalidQueryableTag { level: Level, tag: String },

    #[error("Level {0} has no parent-key mapping")]
    UnsupportedLevel(Level),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl CompileError {
    pub fn invalid_queryable_tag(level: Level, tag: &DictionaryTag) -> Self {
        Self::InvalidQueryableTag {
            level,
            tag: tag.to_string(),
        }
    }
}

/// Validate an identifier (table name, column name, parameter stem).
///
/// Only ASCII alphanumerics and underscores are allowed.
fn validate_identifier(name: &str) -> Result<(), CompileError> {
    if name.is_empty() {
        return Err(CompileError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CompileError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}

/// Quote an identifier with brackets, accepted by both SQL Server and SQLite.
pub fn escape_identifier(name: &str) -> Result<String, CompileError> {
    validate_identifier(name)?;
    Ok(format!("[{name}]"))
}

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl SqlValue {
    /// Get the value as a string for display/debugging.
    pub fn as_display_str(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A named bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    /// Name without the `@` prefix.
    pub name: String,
    pub value: SqlValue,
}

impl SqlParam {
    /// The placeholder as it appears in SQL text.
    pub fn placeholder(&self) -> String {
        format!("@{}", self.name)
    }
}

/// Ordered parameter accumulator with its own indexer.
#[derive(Debug, Default, Clone)]
pub struct ParamList {
    params: Vec<SqlParam>,
    indexer: usize,
}

impl ParamList {
    /// Create an empty list whose indexer starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under a fresh name derived from `stem` and return the
    /// placeholder to splice into SQL text.
    ///
    /// `stem` must be a valid identifier; callers pass column names that
    /// were produced by the tag codec or fixed key-column names.
    pub fn bind(&mut self, stem: &str, value: impl Into<SqlValue>) -> String {
        let name = format!("{stem}_{}", self.indexer);
        self.indexer += 1;
        let param = SqlParam {
            name,
            value: value.into(),
        };
        let placeholder = param.placeholder();
        self.params.push(param);
        placeholder
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get all parameters in emission order.
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }
}

/// Join fragments with ` OR `, parenthesized as `( a OR b )`.
///
/// Returns an empty string when there are no fragments.
pub fn or_group(fragments: &[String]) -> String {
    group(fragments, " OR ")
}

/// Join fragments with ` AND `, parenthesized as `( a AND b )`.
pub fn and_group(fragments: &[String]) -> String {
    group(fragments, " AND ")
}

fn group(fragments: &[String], separator: &str) -> String {
    if fragments.is_empty() {
        return String::new();
    }
    format!("( {} )", fragments.join(separator))
}

/// A built SQL statement with its parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl BuiltQuery {
    /// The text after the first ` WHERE `, if any.
    pub fn where_clause(&self) -> Option<&str> {
        self.sql
            .split_once(" WHERE ")
            .map(|(_, rest)| rest)
    }

    pub fn param(&self, name: &str) -> Option<&SqlParam> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.params.iter().find(|p| p.name == name)
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier_valid() {
        assert_eq!(escape_identifier("tag_00100010").unwrap(), "[tag_00100010]");
    }

    #[test]
    fn test_escape_identifier_invalid() {
        assert!(escape_identifier("uid]; DROP TABLE Study; --").is_err());
        assert!(escape_identifier("").is_err());
        assert!(matches!(
            escape_identifier("a b"),
            Err(CompileError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_param_list_indexer() {
        let mut params = ParamList::new();
        let p0 = params.bind("tag_00100010", "SMITH");
        let p1 = params.bind("tag_00100010", "JONES");
        let p2 = params.bind("deviceId", SqlValue::Integer(7));

        assert_eq!(p0, "@tag_00100010_0");
        assert_eq!(p1, "@tag_00100010_1");
        assert_eq!(p2, "@deviceId_2");
        assert_eq!(params.len(), 3);
        assert_eq!(params.params()[2].value, SqlValue::Integer(7));
    }

    #[test]
    fn test_groups() {
        let parts = vec!["a = 1".to_string(), "b = 2".to_string()];
        assert_eq!(or_group(&parts), "( a = 1 OR b = 2 )");
        assert_eq!(and_group(&parts), "( a = 1 AND b = 2 )");
        assert_eq!(or_group(&[]), "");
    }

    #[test]
    fn test_built_query_where_clause() {
        let query = BuiltQuery {
            sql: "SELECT COUNT(*) FROM [Study] WHERE [deviceId] = @deviceId_0".to_string(),
            params: vec![SqlParam {
                name: "deviceId_0".to_string(),
                value: SqlValue::Integer(1),
            }],
        };
        assert_eq!(query.where_clause(), Some("[deviceId] = @deviceId_0"));
        assert!(query.param("@deviceId_0").is_some());
        assert_eq!(format!("{query}"), query.sql);
    }

    #[test]
    fn test_sql_value_display() {
        assert_eq!(SqlValue::Text("hello".into()).as_display_str(), "hello");
        assert_eq!(SqlValue::Integer(42).as_display_str(), "42");
        assert_eq!(SqlValue::Boolean(true).as_display_str(), "true");
    }
}
