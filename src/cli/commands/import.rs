//! Import command implementation.
//!
//! Commits an import file in one transaction. Re-running the same file
//! is safe: rows already present by natural key become updates.

use crate::cli::{ImportArgs, csv};
use crate::error::Result;
use crate::import;
use crate::model::{CommitResult, ImportBatch};
use std::path::PathBuf;
use tracing::info;

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the database cannot be
/// opened, or the transaction fails.
pub fn execute(args: &ImportArgs, json: bool, db_override: Option<&PathBuf>) -> Result<()> {
    let mut storage = super::open(db_override)?;

    info!(file = %args.file.display(), issue_type = %args.issue_type, "Importing file");

    let rows = csv::load_rows(&args.file)?;
    let mut batch = ImportBatch::new(args.issue_type, rows);
    batch.project_key = args.project.clone();
    batch.team = args.team.clone();

    let result = import::commit(&mut storage, &batch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text(&result);
    }

    Ok(())
}

fn print_text(result: &CommitResult) {
    println!(
        "Imported: {} created, {} updated, {} skipped",
        result.created, result.updated, result.skipped
    );

    if !result.errors.is_empty() {
        println!("\nSkipped rows:");
        for err in &result.errors {
            let key = err.issue_key.as_deref().unwrap_or("?");
            println!("  row {} ({key}): {}", err.row + 1, err.reason);
        }
    }
}
