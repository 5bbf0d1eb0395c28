use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::TableKind;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load showoci CSV exports into DuckDB tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stage each CSV export and merge it into its permanent table
    Load(LoadArgs),
    /// Print the DDL, staging insert and merge statements for each table
    Sql(SqlArgs),
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// CSV location prefix from showoci; files are read from `<csv>_<name>.csv`
    #[arg(short = 'c', long = "csv")]
    pub csv: PathBuf,
    /// DuckDB database file (`:memory:` for a throwaway database)
    #[arg(short = 'd', long = "database")]
    pub database: PathBuf,
    /// Restrict the load to these tables (defaults to all, in catalog order)
    #[arg(short = 't', long = "table", value_enum, action = clap::ArgAction::Append)]
    pub tables: Vec<TableKind>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// Restrict output to these tables (defaults to all)
    #[arg(short = 't', long = "table", value_enum, action = clap::ArgAction::Append)]
    pub tables: Vec<TableKind>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
