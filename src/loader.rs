//! Loader orchestrator: schema check, staging load and merge for one table.
//!
//! Each table moves through `PENDING -> SCHEMA_READY -> STAGED -> MERGED`, or
//! straight to `SKIPPED` when its export file is absent. There are no retries;
//! the first failing step ends the table's load with an error naming the step.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    database::Database,
    descriptor::TableSpec,
    error::LoadResult,
    merge::merge,
    schema::ensure_schema,
    staging::{LoadOptions, load_csv},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Skipped { path: PathBuf },
    Merged { staged: usize, merged: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub outcome: LoadOutcome,
    pub elapsed: Duration,
}

pub fn run_one<D: Database>(
    db: &D,
    spec: &TableSpec,
    base_path: &Path,
    options: &LoadOptions,
) -> LoadResult<LoadOutcome> {
    info!("Handling {}", spec.source_file());
    let path = spec.source_path(base_path);
    if !path.is_file() {
        info!("   File {} does not exist, skipping", path.display());
        return Ok(LoadOutcome::Skipped { path });
    }

    ensure_schema(db, spec)?;
    debug!("{}: schema ready", spec.name());
    let staged = load_csv(db, spec, base_path, options)?;
    debug!("{}: {staged} row(s) staged", spec.name());
    let merged = merge(db, spec)?;
    debug!("{}: merged", spec.name());

    Ok(LoadOutcome::Merged { staged, merged })
}

/// Loads each spec in order. Skipped tables do not stop the run; the first
/// error does, and tables after it are not attempted.
pub fn run_all<D: Database>(
    db: &D,
    specs: &[TableSpec],
    base_path: &Path,
    options: &LoadOptions,
) -> LoadResult<Vec<TableReport>> {
    let mut reports = Vec::with_capacity(specs.len());
    for spec in specs {
        let started = Instant::now();
        let outcome = run_one(db, spec, base_path, options)?;
        reports.push(TableReport {
            table: spec.name().to_string(),
            outcome,
            elapsed: started.elapsed(),
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        database::recording::{Call, RecordingDb},
        error::LoadStage,
    };

    fn spec(name: &str, file: &str) -> TableSpec {
        TableSpec::builder(name, file)
            .key_text("id", 100)
            .text("label", 100)
            .build()
            .unwrap()
    }

    #[test]
    fn steps_run_in_order_for_present_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("run_a.csv"), "id,label\n1,x\n2,y\n").unwrap();
        let db = RecordingDb {
            affected: 2,
            ..Default::default()
        };

        let outcome = run_one(
            &db,
            &spec("A", "a.csv"),
            &dir.path().join("run"),
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Merged {
                staged: 2,
                merged: 2
            }
        );
        let calls = db.calls();
        let exists = calls
            .iter()
            .position(|c| *c == Call::Exists("A".into()))
            .unwrap();
        let insert = calls
            .iter()
            .position(|c| matches!(c, Call::InsertBatch(..)))
            .unwrap();
        let merge = calls
            .iter()
            .position(|c| matches!(c, Call::Execute(sql) if sql.starts_with("MERGE")))
            .unwrap();
        assert!(exists < insert && insert < merge);
    }

    #[test]
    fn missing_file_skips_before_any_schema_work() {
        let dir = tempdir().unwrap();
        let db = RecordingDb::default();
        let outcome = run_one(
            &db,
            &spec("A", "a.csv"),
            &dir.path().join("run"),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Skipped {
                path: dir.path().join("run_a.csv")
            }
        );
        assert!(db.calls().is_empty());
    }

    #[test]
    fn run_all_continues_past_skipped_tables() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("run_b.csv"), "id,label\n1,x\n").unwrap();
        let db = RecordingDb::default();
        let specs = vec![spec("A", "a.csv"), spec("B", "b.csv")];

        let reports = run_all(&db, &specs, &dir.path().join("run"), &LoadOptions::default())
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].outcome, LoadOutcome::Skipped { .. }));
        assert_eq!(reports[1].table, "B");
        assert!(matches!(
            reports[1].outcome,
            LoadOutcome::Merged { staged: 1, .. }
        ));
    }

    #[test]
    fn run_all_stops_at_first_failure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("run_a.csv"), "id,label\n1,x\n").unwrap();
        fs::write(dir.path().join("run_b.csv"), "id,label\n1,x\n").unwrap();
        let db = RecordingDb {
            fail_on: Some("MERGE INTO \"A\"".to_string()),
            ..Default::default()
        };
        let specs = vec![spec("A", "a.csv"), spec("B", "b.csv")];

        let err = run_all(&db, &specs, &dir.path().join("run"), &LoadOptions::default())
            .unwrap_err();

        assert_eq!(err.stage(), LoadStage::Merge);
        assert_eq!(err.table(), "A");
        assert!(!db.calls().contains(&Call::Exists("B".into())));
    }
}
