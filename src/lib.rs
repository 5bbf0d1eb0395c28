pub mod catalog;
pub mod cli;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod staging;

use std::{
    env,
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, error, info};

use crate::{
    cli::{Cli, Commands, LoadArgs, SqlArgs},
    database::DuckDb,
    loader::LoadOutcome,
    staging::{BATCH_SIZE, LoadOptions},
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("showoci_csv_loader", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Sql(args) => handle_sql(&args),
    }
}

fn handle_load(args: &LoadArgs) -> Result<()> {
    let started = Instant::now();
    info!("Running showoci-csv-loader");
    info!("Starts at    : {}", current_timestamp());
    info!("Command line : {}", env::args().skip(1).join(" "));
    info!("Version      : {VERSION}");

    let specs = catalog::resolve(&args.tables)?;
    let options = LoadOptions {
        batch_size: BATCH_SIZE,
        delimiter: args.delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    info!(
        "Reading '{}_*' with delimiter '{}' ({})",
        args.csv.display(),
        printable_delimiter(options.delimiter),
        options.encoding.name()
    );

    info!("Connecting to database {}", args.database.display());
    let db = DuckDb::open(&args.database)
        .with_context(|| format!("Connecting to {:?}", args.database))?;
    info!("   Connected");

    let outcome = loader::run_all(&db, &specs, &args.csv, &options);
    info!(
        "Completed at {} ({})",
        current_timestamp(),
        format_elapsed(started.elapsed())
    );
    let reports = match outcome {
        Ok(reports) => reports,
        Err(err) => {
            error!("{} failed during {}", err.table(), err.stage());
            return Err(anyhow::Error::new(err)
                .context(format!("Loading CSV exports from '{}'", args.csv.display())));
        }
    };

    for report in &reports {
        match &report.outcome {
            LoadOutcome::Merged { staged, merged } => info!(
                "{}: {staged} row(s) staged, {merged} row(s) merged, process time {}",
                report.table,
                format_elapsed(report.elapsed)
            ),
            LoadOutcome::Skipped { path } => {
                info!("{}: skipped, {:?} not found", report.table, path)
            }
        }
    }
    Ok(())
}

fn handle_sql(args: &SqlArgs) -> Result<()> {
    let specs = catalog::resolve(&args.tables)?;
    for spec in &specs {
        println!("-- {} <- *_{}", spec.name(), spec.source_file());
        println!("{};", schema::create_table_sql(spec));
        println!("{};", schema::create_staging_sql(spec));
        println!("{};", staging::insert_sql(spec, 1));
        println!("{};", merge::merge_sql(spec));
        println!();
    }
    info!("Printed statements for {} table(s)", specs.len());
    Ok(())
}

/// Formats a duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

fn current_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
