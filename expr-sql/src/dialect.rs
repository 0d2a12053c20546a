//! SQL dialect implementations for `SQLite`, Postgres and SQL Server.
//!
//! A dialect is the syntax provider the compiler consults for anything
//! database specific: identifier quoting, case-insensitive text comparison
//! and the final placeholder syntax used when clauses are assembled.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::value::Value;

/// Storage kind of a text column, selecting the comparison SQL a dialect emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColumnType {
    /// Indexable, length-limited text.
    #[default]
    NVarchar,
    /// Unbounded text; cannot be wrapped in functions on every database.
    NText,
}

impl TextColumnType {
    /// Lowercase name, as written in config and method arguments.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NVarchar => "nvarchar",
            Self::NText => "ntext",
        }
    }

    /// Read a column type passed as a method argument.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }
}

impl FromStr for TextColumnType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("nvarchar") {
            Ok(Self::NVarchar)
        } else if s.eq_ignore_ascii_case("ntext") {
            Ok(Self::NText)
        } else {
            Err(())
        }
    }
}

impl From<TextColumnType> for Value {
    fn from(v: TextColumnType) -> Self {
        Self::String(v.as_str().to_string())
    }
}

/// SQL dialect trait for database-specific syntax.
///
/// Comparison methods receive the zero-based parameter slot and must
/// reference it as `@{slot}`; placeholders are renumbered into the dialect's
/// own syntax by [`param`](Self::param) only at final assembly.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Short lower-case name (`sqlite`, `postgres`, `sqlserver`).
    fn name(&self) -> &'static str;

    /// Quote a table, alias or column name.
    fn quote_name(&self, name: &str) -> String;

    /// Pattern comparison of a text column against parameter `slot`.
    fn wildcard_comparison(&self, column: &str, slot: usize, kind: TextColumnType) -> String;

    /// Case-insensitive equality of a text column against parameter `slot`.
    fn equal_comparison(&self, column: &str, slot: usize, kind: TextColumnType) -> String;

    /// The multi-character wildcard used in pattern values.
    fn wildcard_placeholder(&self) -> &'static str {
        "%"
    }

    /// Escape a value as a string literal.
    fn escape_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Format a positional parameter placeholder (1-based).
    fn param(&self, idx: usize) -> String;
}

fn double_quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SQLite` dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[inline]
    fn quote_name(&self, name: &str) -> String {
        double_quote(name)
    }

    #[inline]
    fn wildcard_comparison(&self, column: &str, slot: usize, _kind: TextColumnType) -> String {
        // SQLite LIKE is case-insensitive for ASCII by default
        format!("{column} LIKE @{slot}")
    }

    #[inline]
    fn equal_comparison(&self, column: &str, slot: usize, _kind: TextColumnType) -> String {
        format!("{column} = @{slot} COLLATE NOCASE")
    }

    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[inline]
    fn quote_name(&self, name: &str) -> String {
        double_quote(name)
    }

    #[inline]
    fn wildcard_comparison(&self, column: &str, slot: usize, _kind: TextColumnType) -> String {
        format!("{column} ILIKE @{slot}")
    }

    fn equal_comparison(&self, column: &str, slot: usize, kind: TextColumnType) -> String {
        match kind {
            TextColumnType::NVarchar => format!("lower({column}) = lower(@{slot})"),
            TextColumnType::NText => format!("{column} ILIKE @{slot}"),
        }
    }

    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }
}

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    #[inline]
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_name(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn wildcard_comparison(&self, column: &str, slot: usize, kind: TextColumnType) -> String {
        match kind {
            TextColumnType::NVarchar => format!("upper({column}) LIKE upper(@{slot})"),
            // ntext cannot be passed to upper()
            TextColumnType::NText => format!("{column} LIKE @{slot}"),
        }
    }

    fn equal_comparison(&self, column: &str, slot: usize, kind: TextColumnType) -> String {
        match kind {
            TextColumnType::NVarchar => format!("upper({column}) = upper(@{slot})"),
            TextColumnType::NText => format!("{column} LIKE @{slot}"),
        }
    }

    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("@{}", idx.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_params() {
        let pg = Postgres;
        assert_eq!(pg.param(1), "$1");
        assert_eq!(pg.param(10), "$10");
    }

    #[test]
    fn test_sqlite_params() {
        let sqlite = Sqlite;
        assert_eq!(sqlite.param(1), "?1");
        assert_eq!(sqlite.param(10), "?10");
    }

    #[test]
    fn test_sqlserver_params_are_zero_based() {
        assert_eq!(SqlServer.param(1), "@0");
        assert_eq!(SqlServer.param(3), "@2");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(Sqlite.quote_name("umbracoNode"), "\"umbracoNode\"");
        assert_eq!(Postgres.quote_name("a\"b"), "\"a\"\"b\"");
        assert_eq!(SqlServer.quote_name("node"), "[node]");
    }

    #[test]
    fn test_sqlserver_ntext_skips_upper() {
        assert_eq!(
            SqlServer.wildcard_comparison("[t].[c]", 0, TextColumnType::NVarchar),
            "upper([t].[c]) LIKE upper(@0)"
        );
        assert_eq!(
            SqlServer.wildcard_comparison("[t].[c]", 0, TextColumnType::NText),
            "[t].[c] LIKE @0"
        );
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(Sqlite.escape_string("it's"), "'it''s'");
    }

    #[test]
    fn test_text_column_type_from_value() {
        assert_eq!(
            TextColumnType::from_value(&Value::from(TextColumnType::NText)),
            Some(TextColumnType::NText)
        );
        assert_eq!(TextColumnType::from_value(&Value::from("NVarchar")), Some(TextColumnType::NVarchar));
        assert_eq!(TextColumnType::from_value(&Value::Int(1)), None);
    }
}
