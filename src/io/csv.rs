//! CSV row loading.
//!
//! - [`read_rows`] / [`read_rows_from`]: header row → field names, every record → [`Row`]
//! - [`field_values`]: distinct values of one field, for building a
//!   [`crate::TemplateMapping`]
//!
//! # Design notes
//! - Cells are loaded as text; empty cells become [`Value::Empty`].
//! - Records shorter than the header are padded with [`Value::Empty`];
//!   extra cells beyond the header are ignored.

use crate::row::{Row, Value};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a CSV file with a header row into rows.
///
/// # Errors
/// Returns an error if the file cannot be opened or any record cannot be
/// parsed (annotated with the 1-based record number).
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_rows_from(f).with_context(|| format!("read rows from {}", path.display()))
}

/// Read rows from any CSV source with a header row.
///
/// # Errors
/// Returns an error if the header or any record cannot be parsed.
pub fn read_rows_from<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("parse CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let value = match rec.get(col) {
                    Some(cell) if !cell.is_empty() => Value::Text(cell.to_string()),
                    _ => Value::Empty,
                };
                (name.clone(), value)
            })
            .collect();
        out.push(row);
    }
    Ok(out)
}

/// Distinct non-blank values of `field`, in first-seen order.
#[must_use]
pub fn field_values(rows: &[Row], field: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        let value = row.lookup_string(field);
        let value = value.trim();
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}
