//! Schema ensurer: creates the permanent and staging tables when missing.
//!
//! The permanent table carries the primary key. The staging table has the same
//! columns, no key, and is a connection-scoped temporary table whose rows
//! survive commits until the connection closes.

use itertools::Itertools;
use log::info;

use crate::{
    database::Database,
    descriptor::{TableSpec, quote_ident},
    error::{DbError, LoadError, LoadResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaStatus {
    pub created_table: bool,
    pub created_staging: bool,
}

pub fn create_table_sql(spec: &TableSpec) -> String {
    format!(
        "CREATE TABLE {} ({}, CONSTRAINT {} PRIMARY KEY ({}))",
        quote_ident(spec.name()),
        column_declarations(spec),
        quote_ident(&format!("{}_PK", spec.name())),
        quote_ident(spec.primary_key().name())
    )
}

pub fn create_staging_sql(spec: &TableSpec) -> String {
    format!(
        "CREATE TEMPORARY TABLE {} ({}) ON COMMIT PRESERVE ROWS",
        quote_ident(&spec.staging_name()),
        column_declarations(spec)
    )
}

fn column_declarations(spec: &TableSpec) -> String {
    spec.columns().iter().map(|c| c.declaration()).join(", ")
}

pub fn ensure_schema<D: Database>(db: &D, spec: &TableSpec) -> LoadResult<SchemaStatus> {
    let schema_err = |source| LoadError::Schema {
        table: spec.name().to_string(),
        source,
    };
    let staging = spec.staging_name();

    let created_table =
        ensure_table(db, spec.name(), &create_table_sql(spec)).map_err(schema_err)?;
    let created_staging =
        ensure_table(db, &staging, &create_staging_sql(spec)).map_err(schema_err)?;

    Ok(SchemaStatus {
        created_table,
        created_staging,
    })
}

fn ensure_table<D: Database>(db: &D, name: &str, create_sql: &str) -> Result<bool, DbError> {
    if db.table_exists(name)? {
        info!("   Table {name} exists");
        return Ok(false);
    }
    info!("   Table {name} does not exist, creating");
    db.execute(create_sql)?;
    info!("   Table {name} created");
    Ok(true)
}
