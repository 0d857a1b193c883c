//! Natural-key matching, import preview, and batch commit.
//!
//! Preview and commit share one pipeline: normalize each row, classify
//! it against the issue type's table by `issue_key`, then either tally
//! (preview, read-only) or upsert (commit, one transaction per batch).
//! Preview never writes, so two previews of the same file against
//! unchanged storage are identical, and a preview's counts match what a
//! commit of the same batch would do.

use crate::error::{Result, StrideError};
use crate::model::{
    CanonicalTicket, CommitResult, ImportBatch, PreviewResult, RowError, SampleRecord,
};
use crate::normalize::{Normalizer, row_issue_key};
use crate::storage::sqlite::record_import;
use crate::storage::{SqliteStorage, find_ticket, insert_ticket, update_ticket};
use tracing::{debug, info};

/// Maximum number of valid rows retained in a preview sample.
pub const SAMPLE_LIMIT: usize = 50;

/// Classification of an incoming ticket against persisted storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No persisted row shares the `issue_key`.
    New,
    /// A persisted row shares the `issue_key`; any other field
    /// difference is irrelevant.
    Duplicate {
        /// The `issue_id` of the existing row.
        existing_id: String,
    },
}

fn outcome_for(existing: Option<CanonicalTicket>) -> MatchOutcome {
    existing.map_or(MatchOutcome::New, |t| MatchOutcome::Duplicate {
        existing_id: t.issue_id,
    })
}

/// Classify one canonical ticket against its issue-type table.
///
/// Read-only: creates, locks, and reserves nothing. The commit engine
/// re-runs the same check at write time inside its transaction.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn match_ticket(storage: &SqliteStorage, ticket: &CanonicalTicket) -> Result<MatchOutcome> {
    Ok(outcome_for(
        storage.find_by_key(ticket.issue_type, &ticket.issue_key)?,
    ))
}

/// Dry-run an import batch: what would a commit do?
///
/// Normalizes every row, matches every valid row, and keeps the first
/// [`SAMPLE_LIMIT`] valid rows in original file order as an annotated
/// sample. Performs no writes. The returned counts always satisfy
/// `total_records == new_count + duplicate_count + invalid_count`.
///
/// # Errors
///
/// Returns an error only on infrastructure failure; data-quality
/// problems land in the result payload.
pub fn preview(storage: &SqliteStorage, batch: &ImportBatch) -> Result<PreviewResult> {
    let normalizer = Normalizer::new(
        batch.issue_type,
        batch.project_key.as_deref(),
        batch.team.as_deref(),
    );

    let mut result = PreviewResult {
        total_records: batch.rows.len(),
        new_count: 0,
        duplicate_count: 0,
        invalid_count: 0,
        sample_records: Vec::new(),
        invalid_rows: Vec::new(),
    };

    for (idx, row) in batch.rows.iter().enumerate() {
        match normalizer.normalize(row) {
            Err(err) => {
                result.invalid_count += 1;
                result.invalid_rows.push(RowError {
                    row: idx,
                    issue_key: row_issue_key(row, batch.issue_type),
                    reason: err.to_string(),
                });
            }
            Ok(ticket) => {
                let is_duplicate = matches!(
                    match_ticket(storage, &ticket)?,
                    MatchOutcome::Duplicate { .. }
                );
                if is_duplicate {
                    result.duplicate_count += 1;
                } else {
                    result.new_count += 1;
                }
                if result.sample_records.len() < SAMPLE_LIMIT {
                    result.sample_records.push(SampleRecord {
                        ticket,
                        is_duplicate,
                        is_valid: true,
                    });
                }
            }
        }
    }

    info!(
        issue_type = %batch.issue_type,
        total = result.total_records,
        new = result.new_count,
        duplicate = result.duplicate_count,
        invalid = result.invalid_count,
        "Preview complete"
    );

    Ok(result)
}

/// Commit an import batch, idempotently by natural key.
///
/// The whole batch runs inside one IMMEDIATE transaction: on an
/// infrastructure failure nothing is visible; per-row data-quality
/// skips are outcomes, not rollback triggers. For each valid row the
/// natural-key check is re-taken at write time, and an insert that
/// still hits the storage-enforced uniqueness constraint (another
/// writer got there first) falls back to an update rather than failing.
///
/// # Errors
///
/// Returns an error on infrastructure failure; the transaction rolls
/// back and retrying the whole batch is safe.
pub fn commit(storage: &mut SqliteStorage, batch: &ImportBatch) -> Result<CommitResult> {
    let normalizer = Normalizer::new(
        batch.issue_type,
        batch.project_key.as_deref(),
        batch.team.as_deref(),
    );
    let total = batch.rows.len();

    let result = storage.batch(|tx| {
        let mut result = CommitResult::default();

        for (idx, row) in batch.rows.iter().enumerate() {
            let ticket = match normalizer.normalize(row) {
                Ok(ticket) => ticket,
                Err(err) => {
                    debug!(row = idx, reason = %err, "Skipping invalid row");
                    result.skipped += 1;
                    result.errors.push(RowError {
                        row: idx,
                        issue_key: row_issue_key(row, batch.issue_type),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match outcome_for(find_ticket(tx, ticket.issue_type, &ticket.issue_key)?) {
                MatchOutcome::Duplicate { .. } => {
                    update_ticket(tx, &ticket)?;
                    result.updated += 1;
                }
                MatchOutcome::New => match insert_ticket(tx, &ticket) {
                    Ok(()) => result.created += 1,
                    Err(StrideError::UniquenessViolation { .. }) => {
                        // Lost the race to another writer, or the row's
                        // issue_id collides under a different issue_key.
                        let rows = update_ticket(tx, &ticket)?;
                        if rows == 0 {
                            result.skipped += 1;
                            result.errors.push(RowError {
                                row: idx,
                                issue_key: Some(ticket.issue_key.clone()),
                                reason: format!(
                                    "issue_id {} already belongs to a ticket with a different issue_key",
                                    ticket.issue_id
                                ),
                            });
                        } else {
                            debug!(issue_key = %ticket.issue_key, "Insert raced, updated instead");
                            result.updated += 1;
                        }
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        record_import(tx, batch.issue_type, total, &result)?;
        Ok(result)
    })?;

    info!(
        issue_type = %batch.issue_type,
        total,
        created = result.created,
        updated = result.updated,
        skipped = result.skipped,
        "Commit complete"
    );

    Ok(result)
}
