//! Log command implementation.
//!
//! Lists recent import batches from the audit log, newest first.

use crate::cli::LogArgs;
use crate::error::Result;
use crate::storage::sqlite::METADATA_LAST_IMPORT_TIME;
use std::path::PathBuf;

/// Execute the log command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or queried.
pub fn execute(args: &LogArgs, json: bool, db_override: Option<&PathBuf>) -> Result<()> {
    let storage = super::open(db_override)?;

    let entries = storage.recent_imports(args.limit)?;
    let last_import = storage.get_metadata(METADATA_LAST_IMPORT_TIME)?;

    if json {
        let payload = serde_json::json!({
            "last_import_time": last_import,
            "imports": entries,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if let Some(at) = &last_import {
        println!("Last import: {at}");
    }

    if entries.is_empty() {
        println!("No imports recorded.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{} {} total={} created={} updated={} skipped={}",
            entry.finished_at,
            entry.issue_type,
            entry.total,
            entry.created,
            entry.updated,
            entry.skipped
        );
    }

    Ok(())
}
