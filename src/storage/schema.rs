//! Database schema definitions.

use crate::model::IssueType;
use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The four ticket tables share one column shape; they are separate
/// tables because the source systems evolved them independently and the
/// aggregator scans them independently.
fn ticket_table_sql(table: &str) -> String {
    format!(
        r"
    CREATE TABLE IF NOT EXISTS {table} (
        issue_key TEXT PRIMARY KEY,
        issue_id TEXT NOT NULL UNIQUE,
        summary TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT '',
        status_category TEXT,
        priority TEXT,
        resolution TEXT,
        project_key TEXT NOT NULL,
        assignee TEXT,
        assignee_id TEXT,
        reporter TEXT,
        reporter_id TEXT,
        creator TEXT,
        creator_id TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        resolved_at DATETIME,
        due_date DATETIME,
        parent_key TEXT,
        sprint_names TEXT NOT NULL DEFAULT '[]',
        story_points REAL,
        team TEXT,
        extra TEXT NOT NULL DEFAULT '{{}}'
    );

    CREATE INDEX IF NOT EXISTS idx_{table}_project ON {table}(project_key);
    CREATE INDEX IF NOT EXISTS idx_{table}_updated_at ON {table}(updated_at);
    CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_key)
        WHERE parent_key IS NOT NULL;
    "
    )
}

/// Bookkeeping tables shared across issue types.
const SUPPORT_SQL: &str = r"
    -- One row per committed import batch (audit trail).
    CREATE TABLE IF NOT EXISTS import_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_type TEXT NOT NULL,
        total INTEGER NOT NULL,
        created INTEGER NOT NULL,
        updated INTEGER NOT NULL,
        skipped INTEGER NOT NULL,
        finished_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_import_log_finished_at ON import_log(finished_at);

    -- Metadata
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Apply the schema, idempotently.
///
/// # Errors
///
/// Returns an error if any DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    for issue_type in [
        IssueType::Epic,
        IssueType::Story,
        IssueType::Bug,
        IssueType::Subtask,
    ] {
        conn.execute_batch(&ticket_table_sql(issue_type.table()))?;
    }
    conn.execute_batch(SUPPORT_SQL)?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_applies_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('epics', 'stories', 'bugs', 'subtasks')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn issue_id_is_unique_per_table() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO bugs (issue_key, issue_id, summary, project_key, created_at, updated_at)
             VALUES ('B-1', '100', 'one', 'B', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let err = conn.execute(
            "INSERT INTO bugs (issue_key, issue_id, summary, project_key, created_at, updated_at)
             VALUES ('B-2', '100', 'two', 'B', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(err.is_err());
    }
}
