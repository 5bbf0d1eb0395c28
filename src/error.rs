//! Error types for the table loader.
//!
//! Library seams return these typed errors; the command-line driver wraps them
//! in `anyhow` for reporting. Each [`LoadError`] variant names the step that
//! failed so diagnostics can say whether the schema check, the staging load or
//! the merge went wrong.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

const SQL_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Opening database '{path}'")]
    Open {
        path: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("Executing `{sql}`")]
    Statement {
        sql: String,
        #[source]
        source: duckdb::Error,
    },
}

impl DbError {
    pub(crate) fn statement(sql: &str, source: duckdb::Error) -> Self {
        DbError::Statement {
            sql: preview_sql(sql),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Opening input file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Reading line {line} in {path:?}")]
    Csv {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("Line {line} in {path:?} is not valid {encoding}")]
    Decode {
        path: PathBuf,
        line: u64,
        encoding: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Database(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Configuration,
    Schema,
    Load,
    Merge,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadStage::Configuration => "configuration",
            LoadStage::Schema => "schema check",
            LoadStage::Load => "load",
            LoadStage::Merge => "merge",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid table definition for {table}: {reason}")]
    Configuration { table: String, reason: String },
    #[error("Schema check failed for {table}")]
    Schema {
        table: String,
        #[source]
        source: DbError,
    },
    #[error("Loading staging rows failed for {table}")]
    Load {
        table: String,
        #[source]
        source: LoadFailure,
    },
    #[error("Merge failed for {table}")]
    Merge {
        table: String,
        #[source]
        source: DbError,
    },
}

impl LoadError {
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::Configuration { .. } => LoadStage::Configuration,
            LoadError::Schema { .. } => LoadStage::Schema,
            LoadError::Load { .. } => LoadStage::Load,
            LoadError::Merge { .. } => LoadStage::Merge,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            LoadError::Configuration { table, .. }
            | LoadError::Schema { table, .. }
            | LoadError::Load { table, .. }
            | LoadError::Merge { table, .. } => table,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

fn preview_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(SQL_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &collapsed[..end]),
        None => collapsed,
    }
}
