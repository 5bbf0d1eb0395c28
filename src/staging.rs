//! Batch loader: streams a CSV export into the staging table.
//!
//! Each data row is mapped into the descriptor's column order by header name,
//! truncated to [`MAX_TEXT_LEN`] characters, and buffered. Each batch goes to
//! the database as one multi-row `INSERT ... SELECT ... FROM (VALUES ...)`
//! whose select list applies the column conversions; the whole file shares a
//! single transaction so a failure part way through leaves nothing staged.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    database::Database,
    descriptor::{BATCH_ALIAS, MAX_TEXT_LEN, TableSpec, quote_ident},
    error::{LoadError, LoadFailure, LoadResult, ReadError},
    io_utils,
};

/// Rows per bulk insert.
pub const BATCH_SIZE: usize = 5000;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

/// Staging insert for `rows` rows. Values are bound as VARCHAR in row-major
/// order, `$1..$n` for the first row, `$n+1..$2n` for the second and so on.
pub fn insert_sql(spec: &TableSpec, rows: usize) -> String {
    let width = spec.columns().len();
    let columns = spec.columns().iter().map(|c| quote_ident(c.name())).join(", ");
    let binds = spec.columns().iter().map(|c| c.bind_expression()).join(", ");
    let tuples = (0..rows.max(1))
        .map(|row| {
            let placeholders = (1..=width)
                .map(|col| format!("${}::VARCHAR", row * width + col))
                .join(", ");
            format!("({placeholders})")
        })
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) SELECT {binds} FROM (VALUES {tuples}) AS {BATCH_ALIAS}({columns})",
        quote_ident(&spec.staging_name())
    )
}

/// Keeps at most `max_chars` characters of `value`.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Position of each descriptor column in the file's header row, if present.
#[derive(Debug, Clone)]
pub struct HeaderMapping {
    positions: Vec<Option<usize>>,
}

impl HeaderMapping {
    pub fn new(spec: &TableSpec, headers: &[String]) -> Self {
        let positions = spec
            .columns()
            .iter()
            .map(|column| {
                let wanted = column.source().trim();
                // A repeated header maps to its last occurrence.
                headers.iter().rposition(|h| h.trim() == wanted)
            })
            .collect();
        Self { positions }
    }

    pub fn missing<'a>(&self, spec: &'a TableSpec) -> Vec<&'a str> {
        spec.columns()
            .iter()
            .zip(&self.positions)
            .filter(|(_, position)| position.is_none())
            .map(|(column, _)| column.source())
            .collect()
    }

    /// Builds one staging row; absent fields become empty strings.
    pub fn map_record(
        &self,
        record: &csv::ByteRecord,
        encoding: &'static Encoding,
    ) -> Option<Vec<String>> {
        self.positions
            .iter()
            .map(|position| match position.and_then(|idx| record.get(idx)) {
                Some(bytes) => io_utils::decode_bytes(bytes, encoding)
                    .map(|text| truncate_chars(&text, MAX_TEXT_LEN).to_string()),
                None => Some(String::new()),
            })
            .collect()
    }
}

/// Loads `<base_path>_<source_file>` into the staging table and returns the
/// number of data rows read. A missing file loads nothing.
pub fn load_csv<D: Database>(
    db: &D,
    spec: &TableSpec,
    base_path: &Path,
    options: &LoadOptions,
) -> LoadResult<usize> {
    let path = spec.source_path(base_path);
    if !path.is_file() {
        info!("   File {} does not exist, skipping", path.display());
        return Ok(0);
    }
    let load_err = |source: LoadFailure| LoadError::Load {
        table: spec.name().to_string(),
        source,
    };

    db.begin().map_err(|e| load_err(e.into()))?;
    match stage_rows(db, spec, &path, options) {
        Ok(rows) => {
            db.commit().map_err(|e| load_err(e.into()))?;
            info!(
                "   Completed file {} - {rows} row(s) inserted",
                spec.source_file()
            );
            Ok(rows)
        }
        Err(failure) => {
            if let Err(rollback_err) = db.rollback() {
                warn!("Rollback after failed load of {} failed: {rollback_err}", spec.name());
            }
            Err(load_err(failure))
        }
    }
}

fn stage_rows<D: Database>(
    db: &D,
    spec: &TableSpec,
    path: &Path,
    options: &LoadOptions,
) -> Result<usize, LoadFailure> {
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, path, options.encoding)?;
    let mapping = HeaderMapping::new(spec, &headers);
    let missing = mapping.missing(spec);
    if !missing.is_empty() {
        warn!(
            "{:?} lacks header(s) {}; loading them as empty",
            path,
            missing.join(", ")
        );
    }

    let batch_size = options.batch_size.max(1);
    debug!("Staging into {} in batches of {batch_size}", spec.staging_name());
    let mut full_batch_sql: Option<String> = None;
    let mut batch: Vec<Vec<String>> = Vec::with_capacity(batch_size);
    let mut rows = 0usize;

    for record in reader.byte_records() {
        let record = record.map_err(|source| ReadError::Csv {
            path: path.to_path_buf(),
            line: source.position().map(|p| p.line()).unwrap_or(0),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = mapping
            .map_record(&record, options.encoding)
            .ok_or_else(|| ReadError::Decode {
                path: path.to_path_buf(),
                line,
                encoding: options.encoding.name(),
            })?;
        batch.push(row);
        rows += 1;

        if batch.len() == batch_size {
            let sql = full_batch_sql.get_or_insert_with(|| insert_sql(spec, batch_size));
            db.insert_batch(sql, &batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        db.insert_batch(&insert_sql(spec, batch.len()), &batch)?;
    }
    Ok(rows)
}
