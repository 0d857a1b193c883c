//! Preview command implementation.
//!
//! Classifies every row in an import file as new, duplicate, or invalid
//! without writing anything, so operators can vet an export before
//! committing it.

use crate::cli::{ImportArgs, csv};
use crate::error::Result;
use crate::import;
use crate::model::{ImportBatch, PreviewResult};
use std::path::PathBuf;
use tracing::info;

/// Execute the preview command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the database cannot be
/// opened.
pub fn execute(args: &ImportArgs, json: bool, db_override: Option<&PathBuf>) -> Result<()> {
    let storage = super::open(db_override)?;

    info!(file = %args.file.display(), issue_type = %args.issue_type, "Previewing import");

    let rows = csv::load_rows(&args.file)?;
    let mut batch = ImportBatch::new(args.issue_type, rows);
    batch.project_key = args.project.clone();
    batch.team = args.team.clone();

    let result = import::preview(&storage, &batch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text(&result);
    }

    Ok(())
}

fn print_text(result: &PreviewResult) {
    println!("Preview: {} records", result.total_records);
    println!("  New:       {}", result.new_count);
    println!("  Duplicate: {}", result.duplicate_count);
    println!("  Invalid:   {}", result.invalid_count);

    if !result.invalid_rows.is_empty() {
        println!("\nInvalid rows:");
        for err in &result.invalid_rows {
            let key = err.issue_key.as_deref().unwrap_or("?");
            println!("  row {} ({key}): {}", err.row + 1, err.reason);
        }
    }

    if !result.sample_records.is_empty() {
        println!("\nSample ({} shown):", result.sample_records.len());
        for record in &result.sample_records {
            let marker = if record.is_duplicate { "dup" } else { "new" };
            println!(
                "  [{marker}] {} {}",
                record.ticket.issue_key, record.ticket.summary
            );
        }
    }
}
