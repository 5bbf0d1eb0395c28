//! Merge reconciler: upserts staged rows into the permanent table.

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    database::Database,
    descriptor::{TableSpec, quote_ident},
    error::{LoadError, LoadResult},
};

/// Builds the MERGE statement for `spec`.
///
/// Staging is never cleared, so one session can hold several rows per key. The
/// source keeps only the most recently staged row for each key.
pub fn merge_sql(spec: &TableSpec) -> String {
    let target = quote_ident(spec.name());
    let key = quote_ident(spec.primary_key().name());
    let columns = spec
        .columns()
        .iter()
        .map(|c| quote_ident(c.name()))
        .collect::<Vec<_>>();

    let source = format!(
        "SELECT {} FROM {} QUALIFY row_number() OVER (PARTITION BY {key} ORDER BY rowid DESC) = 1",
        columns.iter().join(", "),
        quote_ident(&spec.staging_name())
    );
    let updates = spec
        .non_key_columns()
        .map(|c| {
            let column = quote_ident(c.name());
            format!("{column} = b.{column}")
        })
        .join(", ");
    let matched = if updates.is_empty() {
        String::new()
    } else {
        format!(" WHEN MATCHED THEN UPDATE SET {updates}")
    };

    format!(
        "MERGE INTO {target} USING ({source}) AS b ON ({target}.{key} = b.{key}){matched} \
         WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        columns.iter().join(", "),
        columns.iter().map(|c| format!("b.{c}")).join(", ")
    )
}

/// Runs the merge in its own transaction and returns the affected row count.
pub fn merge<D: Database>(db: &D, spec: &TableSpec) -> LoadResult<usize> {
    let merge_err = |source| LoadError::Merge {
        table: spec.name().to_string(),
        source,
    };
    let sql = merge_sql(spec);
    debug!("{sql}");

    info!("   Merging data into {}", spec.name());
    db.begin().map_err(merge_err)?;
    let merged = match db.execute(&sql) {
        Ok(merged) => merged,
        Err(err) => {
            if let Err(rollback_err) = db.rollback() {
                warn!("Rollback after failed merge into {} failed: {rollback_err}", spec.name());
            }
            return Err(merge_err(err));
        }
    };
    db.commit().map_err(merge_err)?;
    info!("   Merge completed, {merged} row(s) merged");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::recording::{Call, RecordingDb},
        error::LoadStage,
    };

    fn spec() -> TableSpec {
        TableSpec::builder("HOSTS", "hosts.csv")
            .text("tenant", 100)
            .key_text("id", 100)
            .text("status", 100)
            .build()
            .unwrap()
    }

    #[test]
    fn merge_sql_updates_non_key_columns_and_inserts_all() {
        assert_eq!(
            merge_sql(&spec()),
            "MERGE INTO \"HOSTS\" USING (SELECT \"tenant\", \"id\", \"status\" FROM \"HOSTS_TMP\" \
             QUALIFY row_number() OVER (PARTITION BY \"id\" ORDER BY rowid DESC) = 1) AS b \
             ON (\"HOSTS\".\"id\" = b.\"id\") \
             WHEN MATCHED THEN UPDATE SET \"tenant\" = b.\"tenant\", \"status\" = b.\"status\" \
             WHEN NOT MATCHED THEN INSERT (\"tenant\", \"id\", \"status\") \
             VALUES (b.\"tenant\", b.\"id\", b.\"status\")"
        );
    }

    #[test]
    fn key_only_table_skips_the_update_clause() {
        let spec = TableSpec::builder("KEYS", "keys.csv")
            .key_text("id", 10)
            .build()
            .unwrap();
        let sql = merge_sql(&spec);
        assert!(!sql.contains("WHEN MATCHED"));
        assert!(sql.contains("WHEN NOT MATCHED THEN INSERT (\"id\") VALUES (b.\"id\")"));
    }

    #[test]
    fn merge_commits_and_returns_affected_rows() {
        let db = RecordingDb {
            affected: 7,
            ..Default::default()
        };
        assert_eq!(merge(&db, &spec()).unwrap(), 7);
        let calls = db.calls();
        assert_eq!(calls.first(), Some(&Call::Begin));
        assert_eq!(calls.last(), Some(&Call::Commit));
    }

    #[test]
    fn merge_failure_rolls_back_and_reports_merge_stage() {
        let db = RecordingDb {
            fail_on: Some("MERGE INTO".to_string()),
            ..Default::default()
        };
        let err = merge(&db, &spec()).unwrap_err();
        assert_eq!(err.stage(), LoadStage::Merge);
        assert_eq!(db.calls().last(), Some(&Call::Rollback));
    }
}
