//! Database connection abstraction and its DuckDB implementation.
//!
//! The loader only needs a handful of operations from a connection: run a
//! statement, insert a batch of rows with a single statement, fetch a scalar
//! count, check the catalog for a table and control the transaction. Keeping
//! them behind [`Database`] lets the loader run against an in-memory double in
//! unit tests.

use std::path::Path;

use duckdb::{Connection, params_from_iter};
use log::debug;

use crate::error::DbError;

pub const IN_MEMORY: &str = ":memory:";

pub trait Database {
    /// Executes one statement, returning the number of affected rows.
    fn execute(&self, sql: &str) -> Result<usize, DbError>;

    /// Executes `sql` once for the whole batch, binding the values of every
    /// row positionally in row-major order.
    fn insert_batch(&self, sql: &str, rows: &[Vec<String>]) -> Result<usize, DbError>;

    /// Runs a query returning a single integer.
    fn query_scalar(&self, sql: &str, params: &[&str]) -> Result<i64, DbError>;

    fn table_exists(&self, name: &str) -> Result<bool, DbError>;

    fn begin(&self) -> Result<(), DbError>;

    fn commit(&self) -> Result<(), DbError>;

    fn rollback(&self) -> Result<(), DbError>;
}

pub struct DuckDb {
    conn: Connection,
}

impl DuckDb {
    /// Opens a database file, or a private in-memory database for `:memory:`.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let opened = if path == Path::new(IN_MEMORY) {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        };
        let conn = opened.map_err(|source| DbError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, DbError> {
        Self::open(Path::new(IN_MEMORY))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Database for DuckDb {
    fn execute(&self, sql: &str) -> Result<usize, DbError> {
        debug!("{sql}");
        self.conn
            .execute(sql, [])
            .map_err(|e| DbError::statement(sql, e))
    }

    fn insert_batch(&self, sql: &str, rows: &[Vec<String>]) -> Result<usize, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        // Full batches share one statement text, so the prepared plan is reused.
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| DbError::statement(sql, e))?;
        let inserted = stmt
            .execute(params_from_iter(rows.iter().flatten()))
            .map_err(|e| DbError::statement(sql, e))?;
        debug!("Inserted batch of {} row(s)", rows.len());
        Ok(inserted)
    }

    fn query_scalar(&self, sql: &str, params: &[&str]) -> Result<i64, DbError> {
        self.conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| DbError::statement(sql, e))
    }

    fn table_exists(&self, name: &str) -> Result<bool, DbError> {
        // duckdb_tables() also lists this connection's temporary tables.
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM duckdb_tables() WHERE upper(table_name) = upper(?)",
            &[name],
        )?;
        Ok(count > 0)
    }

    fn begin(&self) -> Result<(), DbError> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::statement("BEGIN TRANSACTION", e))
    }

    fn commit(&self) -> Result<(), DbError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| DbError::statement("COMMIT", e))
    }

    fn rollback(&self) -> Result<(), DbError> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| DbError::statement("ROLLBACK", e))
    }
}
