//! CSV reading helpers: encoding resolution, reader construction and decoding.
//!
//! Export files are read as raw byte records and decoded with `encoding_rs`
//! so a non UTF-8 export can be loaded with `--input-encoding`. Readers are
//! flexible about record length because a short row must still load, with the
//! missing trailing fields treated as empty.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::error::ReadError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<BufReader<File>>, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

/// Decodes one field; `None` when the bytes are invalid for `encoding`.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Reads and decodes the header row, trimming each name.
pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    path: &Path,
    encoding: &'static Encoding,
) -> Result<Vec<String>, ReadError>
where
    R: Read,
{
    let headers = reader
        .byte_headers()
        .map_err(|source| ReadError::Csv {
            path: path.to_path_buf(),
            line: 1,
            source,
        })?
        .clone();
    headers
        .iter()
        .map(|field| {
            decode_bytes(field, encoding)
                .map(|name| name.trim().to_string())
                .ok_or_else(|| ReadError::Decode {
                    path: path.to_path_buf(),
                    line: 1,
                    encoding: encoding.name(),
                })
        })
        .collect()
}
