//! SQL dialect differences: date casting, LIKE escaping and row limiting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The SQL engine a statement is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    #[serde(alias = "sql_server", alias = "mssql")]
    SqlServer,
    Sqlite,
}

impl Dialect {
    /// Wrap a date parameter placeholder in the cast the engine needs.
    pub fn cast_date_param(self, placeholder: &str) -> String {
        match self {
            Self::SqlServer => format!("CAST({placeholder} AS DATETIME2)"),
            Self::Sqlite => placeholder.to_string(),
        }
    }

    /// Adjust a formatted date bound to the engine's comparable form.
    ///
    /// SQLite compares dates as text stored as `YYYY/MM/DD`, so a leading
    /// 8-digit date is rewritten; anything else is left untouched.
    pub fn normalize_date_value(self, value: String) -> String {
        match self {
            Self::SqlServer => value,
            Self::Sqlite => to_slashed_date(value),
        }
    }

    /// Escape the LIKE metacharacters in user literal text.
    pub fn escape_like_literal(self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            match (self, c) {
                (Self::SqlServer, '_') => escaped.push_str("[_]"),
                (Self::SqlServer, '%') => escaped.push_str("[%]"),
                (Self::Sqlite, '\\' | '_' | '%') => {
                    escaped.push('\\');
                    escaped.push(c);
                }
                _ => escaped.push(c),
            }
        }
        escaped
    }

    /// A LIKE predicate over an escaped pattern.
    pub fn like_predicate(self, column: &str, placeholder: &str) -> String {
        match self {
            Self::SqlServer => format!("{column} LIKE {placeholder}"),
            Self::Sqlite => format!("{column} LIKE {placeholder} ESCAPE '\\'"),
        }
    }

    /// `TOP(n)` select prefix, only supported by SQL Server.
    pub fn top_clause(self, max_records: usize) -> Option<String> {
        match self {
            Self::SqlServer if max_records > 0 => Some(format!("TOP({max_records})")),
            _ => None,
        }
    }

    /// Trailing `LIMIT n`, only used by SQLite.
    pub fn limit_clause(self, max_records: usize) -> Option<String> {
        match self {
            Self::Sqlite if max_records > 0 => Some(format!("LIMIT {max_records}")),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SqlServer => write!(f, "sqlserver"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

fn to_slashed_date(value: String) -> String {
    let bytes = value.as_bytes();
    if bytes.len() < 8 || !bytes[..8].iter().all(u8::is_ascii_digit) {
        return value;
    }
    format!(
        "{}/{}/{}{}",
        &value[0..4],
        &value[4..6],
        &value[6..8],
        &value[8..]
    )
}
