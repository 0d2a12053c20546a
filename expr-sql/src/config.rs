//! TOML configuration of the dialect and field mappings.
//!
//! ```toml
//! dialect = "sqlite"            # sqlite | postgres | sqlserver
//! text_column_type = "nvarchar" # nvarchar | ntext
//!
//! [models.Document]
//! name = { table = "doc", column = "name" }
//! published = '"doc"."published"'
//!
//! [relations.Document]
//! content_type = "ContentType"
//! ```
//!
//! A `{ table, column }` entry is validated and quoted for the configured
//! dialect; a plain string is used verbatim.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::context::SqlContext;
use crate::dialect::{Dialect, Postgres, SqlServer, Sqlite, TextColumnType};
use crate::error::ConfigError;
use crate::mapper::FieldMap;
use crate::validate::is_valid_sql_identifier;

/// Parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Dialect name: `sqlite`, `postgres` or `sqlserver`.
    pub dialect: String,
    /// Column kind assumed by string comparisons that do not name one.
    pub text_column_type: TextColumnType,
    /// `model -> member -> column`
    pub models: BTreeMap<String, BTreeMap<String, ColumnEntry>>,
    /// `model -> member -> related model`
    pub relations: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: "sqlite".to_string(),
            text_column_type: TextColumnType::default(),
            models: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }
}

/// The column a member maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    /// An already quoted column reference.
    Verbatim(String),
    /// A table and column, quoted with the configured dialect.
    Qualified { table: String, column: String },
}

impl Config {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// The configured dialect.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDialect`] for an unrecognized name.
    pub fn dialect(&self) -> Result<Box<dyn Dialect>, ConfigError> {
        let name = self.dialect.to_ascii_lowercase();
        Ok(match name.as_str() {
            "sqlite" => Box::new(Sqlite),
            "postgres" | "postgresql" => Box::new(Postgres),
            "sqlserver" | "mssql" => Box::new(SqlServer),
            _ => return Err(ConfigError::UnknownDialect(self.dialect.clone())),
        })
    }

    /// Build the field map, quoting qualified entries for the dialect.
    ///
    /// # Errors
    ///
    /// Fails on an unknown dialect or a table / column name that is not a
    /// plain SQL identifier.
    pub fn field_map(&self) -> Result<FieldMap, ConfigError> {
        let dialect = self.dialect()?;
        let mut map = FieldMap::new();

        for (model, members) in &self.models {
            for (member, entry) in members {
                let column = match entry {
                    ColumnEntry::Verbatim(reference) => reference.clone(),
                    ColumnEntry::Qualified { table, column } => {
                        check_identifier("table", table)?;
                        check_identifier("column", column)?;
                        format!(
                            "{}.{}",
                            dialect.quote_name(table),
                            dialect.quote_name(column)
                        )
                    },
                };
                map.insert(model, member, column);
            }
        }
        for (model, members) in &self.relations {
            for (member, related) in members {
                map = map.with_relation(model, member, related.clone());
            }
        }
        Ok(map)
    }

    /// A context with the configured dialect and text column default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDialect`] for an unrecognized name.
    pub fn context(&self) -> Result<SqlContext, ConfigError> {
        Ok(SqlContext::from_boxed(self.dialect()?).with_text_column_type(self.text_column_type))
    }
}

fn check_identifier(context: &'static str, name: &str) -> Result<(), ConfigError> {
    if is_valid_sql_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            context,
            name: name.to_string(),
        })
    }
}
