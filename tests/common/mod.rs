#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use showoci_csv_loader::database::DuckDb;
use showoci_csv_loader::descriptor::TableSpec;
use tempfile::{TempDir, tempdir};

pub const EXTRACT_DATE: &str = "2023-02-14 09:30:15";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// CSV location prefix as the exporter would pass it, e.g. `<dir>/run1`.
    pub fn base(&self, run: &str) -> PathBuf {
        self.temp_dir.path().join(run)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes `<run>_<source_file>` for `spec`, one header per spec column.
    pub fn write_export(&self, run: &str, spec: &TableSpec, rows: &[Row]) -> PathBuf {
        let name = format!("{run}_{}", spec.source_file());
        self.write(&name, &export_csv(spec, rows))
    }
}

/// Field values keyed by CSV header; unset headers are written empty.
pub type Row = HashMap<&'static str, String>;

pub fn row(fields: &[(&'static str, &str)]) -> Row {
    fields
        .iter()
        .map(|(header, value)| (*header, value.to_string()))
        .collect()
}

pub fn export_csv(spec: &TableSpec, rows: &[Row]) -> String {
    let headers = spec
        .columns()
        .iter()
        .map(|c| c.source().to_string())
        .collect::<Vec<_>>();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).expect("write headers");
    for row in rows {
        let record = headers
            .iter()
            .map(|h| row.get(h.as_str()).cloned().unwrap_or_default())
            .collect::<Vec<_>>();
        writer.write_record(&record).expect("write row");
    }
    let bytes = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(err) => panic!("flush csv: {}", err.error()),
    };
    String::from_utf8(bytes).expect("utf8 csv")
}

pub fn volume_row(idx: usize) -> Row {
    let id = format!("ocid1.volume.{idx}");
    let name = format!("vol-{idx}");
    let size = format!("{}", 50 + idx % 10);
    row(&[
        ("tenant_name", "acme"),
        ("tenant_id", "ocid1.tenancy.acme"),
        ("id", id.as_str()),
        ("region_name", "us-ashburn-1"),
        ("display_name", name.as_str()),
        ("size", size.as_str()),
        ("backup_policy", "gold"),
        ("vpus_per_gb", "10"),
        ("extract_date", EXTRACT_DATE),
    ])
}

pub fn volume_rows(count: usize) -> Vec<Row> {
    (0..count).map(volume_row).collect()
}

pub fn count(db: &DuckDb, table: &str) -> i64 {
    db.connection()
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
        .expect("count rows")
}

/// Reads `expr` rendered as text for the row whose `key_column` equals `key`.
pub fn text_value(db: &DuckDb, table: &str, key_column: &str, key: &str, expr: &str) -> String {
    let sql =
        format!("SELECT CAST({expr} AS VARCHAR) FROM \"{table}\" WHERE \"{key_column}\" = ?");
    db.connection()
        .query_row(&sql, duckdb::params![key], |r| r.get(0))
        .expect("read value")
}

pub fn is_null(db: &DuckDb, table: &str, key_column: &str, key: &str, column: &str) -> bool {
    let sql = format!("SELECT \"{column}\" IS NULL FROM \"{table}\" WHERE \"{key_column}\" = ?");
    db.connection()
        .query_row(&sql, duckdb::params![key], |r| r.get(0))
        .expect("read null flag")
}
