//! Column-mapping descriptors.
//!
//! A [`TableSpec`] describes one CSV/table pair: the permanent table name, the
//! CSV file suffix it is loaded from, and an ordered list of [`ColumnSpec`]
//! entries. Column order is significant. It fixes the order of the bound values
//! in the staging insert and the column order of every generated statement.
//!
//! Specs are built through [`TableSpecBuilder`], which rejects definitions
//! without exactly one primary-key column before any database work happens.

use std::{
    collections::HashSet,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use crate::error::{LoadError, LoadResult};

/// Upper bound for text columns and for every staged value.
pub const MAX_TEXT_LEN: usize = 4000;

const STAGING_SUFFIX: &str = "_TMP";
const NUMBER_DECLARATION: &str = "DECIMAL(38, 10)";

/// Alias of the `VALUES` row set a staging batch is selected from.
pub const BATCH_ALIAS: &str = "v";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYY-MM-DD HH24:MI`
    Minutes,
    /// `YYYY-MM-DD HH24:MI:SS`
    Seconds,
}

impl DateFormat {
    pub fn strptime_pattern(self) -> &'static str {
        match self {
            DateFormat::Minutes => "%Y-%m-%d %H:%M",
            DateFormat::Seconds => "%Y-%m-%d %H:%M:%S",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text(usize),
    Number,
    Date(DateFormat),
}

impl SqlType {
    pub fn declaration(&self) -> String {
        match self {
            SqlType::Text(len) => format!("VARCHAR({len})"),
            SqlType::Number => NUMBER_DECLARATION.to_string(),
            SqlType::Date(_) => "TIMESTAMP".to_string(),
        }
    }

    /// Wraps a VARCHAR expression in the conversion the column type needs.
    /// Empty strings become NULL for numbers and dates.
    pub fn conversion(&self, input: &str) -> String {
        match self {
            SqlType::Text(_) => input.to_string(),
            SqlType::Number => format!("CAST(NULLIF({input}, '') AS {NUMBER_DECLARATION})"),
            SqlType::Date(format) => format!(
                "strptime(NULLIF({input}, ''), '{}')",
                format.strptime_pattern()
            ),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    source: String,
    sql_type: SqlType,
    primary_key: bool,
    bind_expression: String,
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// CSV header this column is read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// This column's value in a staging batch, read from the column of the
    /// same name in [`BATCH_ALIAS`] and converted to the column type.
    pub fn bind_expression(&self) -> &str {
        &self.bind_expression
    }

    pub fn declaration(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.sql_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    source_file: String,
    columns: Vec<ColumnSpec>,
    key_index: usize,
}

impl TableSpec {
    pub fn builder(name: impl Into<String>, source_file: impl Into<String>) -> TableSpecBuilder {
        TableSpecBuilder {
            name: name.into(),
            source_file: source_file.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn staging_name(&self) -> String {
        format!("{}{STAGING_SUFFIX}", self.name)
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// `<base>_<source_file>`; `base` is a path prefix, not a directory.
    pub fn source_path(&self, base: &Path) -> PathBuf {
        let mut joined = OsString::from(base.as_os_str());
        joined.push("_");
        joined.push(&self.source_file);
        PathBuf::from(joined)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn primary_key(&self) -> &ColumnSpec {
        &self.columns[self.key_index]
    }

    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|column| !column.primary_key)
    }
}

#[derive(Debug)]
pub struct TableSpecBuilder {
    name: String,
    source_file: String,
    columns: Vec<(String, String, SqlType, bool)>,
}

impl TableSpecBuilder {
    /// Text column whose CSV header matches the column name.
    pub fn text(self, name: &str, max_len: usize) -> Self {
        self.column(name, name, SqlType::Text(max_len), false)
    }

    pub fn key_text(self, name: &str, max_len: usize) -> Self {
        self.column(name, name, SqlType::Text(max_len), true)
    }

    pub fn number(self, name: &str) -> Self {
        self.column(name, name, SqlType::Number, false)
    }

    pub fn date(self, name: &str, format: DateFormat) -> Self {
        self.column(name, name, SqlType::Date(format), false)
    }

    pub fn column(mut self, name: &str, source: &str, sql_type: SqlType, primary_key: bool) -> Self {
        self.columns
            .push((name.trim().to_string(), source.trim().to_string(), sql_type, primary_key));
        self
    }

    pub fn build(self) -> LoadResult<TableSpec> {
        let invalid = |reason: String| LoadError::Configuration {
            table: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("table name is empty".to_string()));
        }
        if self.source_file.trim().is_empty() {
            return Err(invalid("source file name is empty".to_string()));
        }
        if self.columns.is_empty() {
            return Err(invalid("no columns defined".to_string()));
        }

        let mut seen = HashSet::new();
        for (name, source, sql_type, _) in &self.columns {
            if name.is_empty() || source.is_empty() {
                return Err(invalid("column and source header names must not be empty".to_string()));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(invalid(format!("column '{name}' is defined more than once")));
            }
            if let SqlType::Text(len) = sql_type
                && !(1..=MAX_TEXT_LEN).contains(len)
            {
                return Err(invalid(format!(
                    "column '{name}' length {len} is outside 1..={MAX_TEXT_LEN}"
                )));
            }
        }

        let keys = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.3)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let key_index = match keys.as_slice() {
            [single] => *single,
            [] => return Err(invalid("no primary key column".to_string())),
            _ => {
                return Err(invalid(format!(
                    "{} primary key columns, expected exactly one",
                    keys.len()
                )));
            }
        };

        let columns = self
            .columns
            .into_iter()
            .map(|(name, source, sql_type, primary_key)| ColumnSpec {
                bind_expression: sql_type
                    .conversion(&format!("{BATCH_ALIAS}.{}", quote_ident(&name))),
                name,
                source,
                sql_type,
                primary_key,
            })
            .collect();

        Ok(TableSpec {
            name: self.name,
            source_file: self.source_file,
            columns,
            key_index,
        })
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
