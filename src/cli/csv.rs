//! CSV loading into raw rows.
//!
//! Tracker exports repeat a header for multi-valued fields (one `Sprint`
//! column per membership). Repeated headers collapse into a single
//! comma-joined value so downstream normalization sees one cell per
//! logical field.

use crate::error::Result;
use crate::model::RawRow;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::debug;

/// Read a CSV export into raw rows keyed by header name.
///
/// Cells are trimmed. Empty cells under a repeated header are ignored;
/// non-empty ones are joined with `", "` in column order.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a record fails to
/// parse.
pub fn load_rows(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::new();

        for (idx, header) in headers.iter().enumerate() {
            let Some(value) = record.get(idx) else {
                continue;
            };
            merge_cell(&mut row, header, value);
        }

        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), "Loaded CSV file");
    Ok(rows)
}

fn merge_cell(row: &mut RawRow, header: &str, value: &str) {
    if let Some(existing) = row.get_mut(header) {
        if value.is_empty() {
            return;
        }
        if existing.is_empty() {
            *existing = value.to_string();
        } else {
            existing.push_str(", ");
            existing.push_str(value);
        }
    } else {
        row.insert(header.to_string(), value.to_string());
    }
}
