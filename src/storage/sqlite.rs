//! `SQLite` storage implementation.

use crate::error::{Result, StrideError};
use crate::model::{CanonicalTicket, CommitResult, IssueType, PersonRef};
use crate::storage::schema::apply_schema;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata key for the last committed import time.
pub const METADATA_LAST_IMPORT_TIME: &str = "last_import_time";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema
    /// application fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Run a batch mutation inside one IMMEDIATE transaction.
    ///
    /// On `Ok` the transaction commits; on `Err` everything rolls back,
    /// so a failed batch leaves no partial writes visible.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error from commit.
    pub fn batch<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Look up a ticket by its natural key. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_by_key(
        &self,
        issue_type: IssueType,
        issue_key: &str,
    ) -> Result<Option<CanonicalTicket>> {
        find_ticket(&self.conn, issue_type, issue_key)
    }

    /// All tickets in one issue-type table, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_type(&self, issue_type: IssueType) -> Result<Vec<CanonicalTicket>> {
        let sql = format!(
            "{} ORDER BY issue_key",
            select_sql(issue_type.table())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map([], |row| ticket_from_row(row, issue_type))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    /// Count rows in one issue-type table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count(&self, issue_type: IssueType) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", issue_type.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Fetch a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Most recent import-log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn recent_imports(&self, limit: usize) -> Result<Vec<ImportLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, issue_type, total, created, updated, skipped, finished_at
             FROM import_log ORDER BY id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok(ImportLogEntry {
                    id: row.get(0)?,
                    issue_type: row.get::<_, String>(1)?,
                    total: usize::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
                    created: usize::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
                    updated: usize::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
                    skipped: usize::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
                    finished_at: parse_datetime(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// One committed batch in the audit trail.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportLogEntry {
    pub id: i64,
    pub issue_type: String,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub finished_at: DateTime<Utc>,
}

/// Look up a ticket by natural key against an open connection or
/// transaction (the commit engine re-checks at write time).
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_ticket(
    conn: &Connection,
    issue_type: IssueType,
    issue_key: &str,
) -> Result<Option<CanonicalTicket>> {
    let sql = format!("{} WHERE issue_key = ?", select_sql(issue_type.table()));
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt.query_row([issue_key], |row| ticket_from_row(row, issue_type));

    match result {
        Ok(ticket) => Ok(Some(ticket)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a new ticket.
///
/// # Errors
///
/// Returns [`StrideError::UniquenessViolation`] when `issue_key` or
/// `issue_id` already exists in the table, so callers can fall back to
/// an update; any other database failure is returned as-is.
pub fn insert_ticket(conn: &Connection, ticket: &CanonicalTicket) -> Result<()> {
    let table = ticket.issue_type.table();
    let sql = format!(
        "INSERT INTO {table} (
            issue_key, issue_id, summary, status, status_category, priority, resolution,
            project_key, assignee, assignee_id, reporter, reporter_id, creator, creator_id,
            created_at, updated_at, resolved_at, due_date, parent_key,
            sprint_names, story_points, team, extra
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );

    let result = conn.execute(
        &sql,
        rusqlite::params![
            ticket.issue_key,
            ticket.issue_id,
            ticket.summary,
            ticket.status,
            ticket.status_category,
            ticket.priority,
            ticket.resolution,
            ticket.project_key,
            ticket.assignee.as_ref().map(|p| p.name.clone()),
            ticket.assignee.as_ref().and_then(|p| p.external_id.clone()),
            ticket.reporter.as_ref().map(|p| p.name.clone()),
            ticket.reporter.as_ref().and_then(|p| p.external_id.clone()),
            ticket.creator.as_ref().map(|p| p.name.clone()),
            ticket.creator.as_ref().and_then(|p| p.external_id.clone()),
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
            ticket.resolved_at.map(|t| t.to_rfc3339()),
            ticket.due_date.map(|t| t.to_rfc3339()),
            ticket.parent_key,
            serde_json::to_string(&ticket.sprint_names)?,
            ticket.story_points,
            ticket.team,
            serde_json::to_string(&ticket.extra)?,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StrideError::UniquenessViolation {
                table,
                issue_key: ticket.issue_key.clone(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Update all mutable fields on an existing row, matched by `issue_key`.
///
/// Identity fields (`issue_key`, `issue_id`, the table, `project_key`)
/// are never written.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn update_ticket(conn: &Connection, ticket: &CanonicalTicket) -> Result<usize> {
    let table = ticket.issue_type.table();
    let sql = format!(
        "UPDATE {table} SET
            summary = ?, status = ?, status_category = ?, priority = ?, resolution = ?,
            assignee = ?, assignee_id = ?, reporter = ?, reporter_id = ?,
            creator = ?, creator_id = ?,
            created_at = ?, updated_at = ?, resolved_at = ?, due_date = ?,
            parent_key = ?, sprint_names = ?, story_points = ?, team = ?, extra = ?
         WHERE issue_key = ?"
    );

    let rows = conn.execute(
        &sql,
        rusqlite::params![
            ticket.summary,
            ticket.status,
            ticket.status_category,
            ticket.priority,
            ticket.resolution,
            ticket.assignee.as_ref().map(|p| p.name.clone()),
            ticket.assignee.as_ref().and_then(|p| p.external_id.clone()),
            ticket.reporter.as_ref().map(|p| p.name.clone()),
            ticket.reporter.as_ref().and_then(|p| p.external_id.clone()),
            ticket.creator.as_ref().map(|p| p.name.clone()),
            ticket.creator.as_ref().and_then(|p| p.external_id.clone()),
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
            ticket.resolved_at.map(|t| t.to_rfc3339()),
            ticket.due_date.map(|t| t.to_rfc3339()),
            ticket.parent_key,
            serde_json::to_string(&ticket.sprint_names)?,
            ticket.story_points,
            ticket.team,
            serde_json::to_string(&ticket.extra)?,
            ticket.issue_key,
        ],
    )?;

    Ok(rows)
}

/// Record one committed batch inside the batch transaction.
///
/// # Errors
///
/// Returns an error if the database update fails.
pub fn record_import(
    conn: &Connection,
    issue_type: IssueType,
    total: usize,
    result: &CommitResult,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO import_log (issue_type, total, created, updated, skipped, finished_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            issue_type.as_str(),
            i64::try_from(total).unwrap_or(i64::MAX),
            i64::try_from(result.created).unwrap_or(i64::MAX),
            i64::try_from(result.updated).unwrap_or(i64::MAX),
            i64::try_from(result.skipped).unwrap_or(i64::MAX),
            now,
        ],
    )?;
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![METADATA_LAST_IMPORT_TIME, now],
    )?;
    Ok(())
}

fn select_sql(table: &str) -> String {
    format!(
        "SELECT issue_key, issue_id, summary, status, status_category, priority, resolution,
                project_key, assignee, assignee_id, reporter, reporter_id, creator, creator_id,
                created_at, updated_at, resolved_at, due_date, parent_key,
                sprint_names, story_points, team, extra
         FROM {table}"
    )
}

fn ticket_from_row(row: &rusqlite::Row, issue_type: IssueType) -> rusqlite::Result<CanonicalTicket> {
    Ok(CanonicalTicket {
        issue_key: row.get(0)?,
        issue_id: row.get(1)?,
        issue_type,
        summary: row.get(2)?,
        status: row.get(3)?,
        status_category: row.get(4)?,
        priority: row.get(5)?,
        resolution: row.get(6)?,
        project_key: row.get(7)?,
        assignee: person_from_row(row, 8, 9)?,
        reporter: person_from_row(row, 10, 11)?,
        creator: person_from_row(row, 12, 13)?,
        created_at: parse_datetime(&row.get::<_, String>(14)?),
        updated_at: parse_datetime(&row.get::<_, String>(15)?),
        resolved_at: row
            .get::<_, Option<String>>(16)?
            .as_deref()
            .map(parse_datetime),
        due_date: row
            .get::<_, Option<String>>(17)?
            .as_deref()
            .map(parse_datetime),
        parent_key: row.get(18)?,
        sprint_names: row
            .get::<_, Option<String>>(19)?
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        story_points: row.get(20)?,
        team: row.get(21)?,
        extra: row
            .get::<_, Option<String>>(22)?
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(BTreeMap::new),
    })
}

fn person_from_row(
    row: &rusqlite::Row,
    name_idx: usize,
    id_idx: usize,
) -> rusqlite::Result<Option<PersonRef>> {
    let name: Option<String> = row.get(name_idx)?;
    let external_id: Option<String> = row.get(id_idx)?;
    Ok(name
        .filter(|n| !n.is_empty())
        .map(|name| PersonRef { name, external_id }))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }

    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn ticket(issue_type: IssueType, key: &str, id: &str) -> CanonicalTicket {
        CanonicalTicket {
            issue_key: key.to_string(),
            issue_id: id.to_string(),
            issue_type,
            summary: "A ticket".into(),
            status: "Open".into(),
            status_category: Some("To Do".into()),
            priority: Some("Medium".into()),
            resolution: None,
            project_key: "PROJ".into(),
            assignee: Some(PersonRef::new("Dana Li")),
            reporter: None,
            creator: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 2, 3, 16, 30, 0).unwrap(),
            resolved_at: None,
            due_date: None,
            parent_key: None,
            sprint_names: vec!["Sprint 1".into()],
            story_points: Some(3.0),
            team: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_open_memory() {
        assert!(SqliteStorage::open_memory().is_ok());
    }

    #[test]
    fn insert_and_find_round_trip() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let t = ticket(IssueType::Story, "PROJ-1", "10001");
        storage.batch(|tx| insert_ticket(tx, &t)).unwrap();

        let found = storage
            .find_by_key(IssueType::Story, "PROJ-1")
            .unwrap()
            .unwrap();
        assert_eq!(found, t);

        // Tables are isolated: the same key in another table is absent.
        assert!(storage.find_by_key(IssueType::Bug, "PROJ-1").unwrap().is_none());
    }

    #[test]
    fn duplicate_key_surfaces_uniqueness_violation() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let t = ticket(IssueType::Bug, "PROJ-2", "10002");
        storage.batch(|tx| insert_ticket(tx, &t)).unwrap();

        let mut dup = ticket(IssueType::Bug, "PROJ-2", "99999");
        dup.summary = "Different body, same key".into();
        let err = storage.batch(|tx| insert_ticket(tx, &dup)).unwrap_err();
        assert!(matches!(
            err,
            StrideError::UniquenessViolation { table: "bugs", .. }
        ));

        // Same issue_id under a different key is also a violation.
        let dup_id = ticket(IssueType::Bug, "PROJ-3", "10002");
        let err = storage.batch(|tx| insert_ticket(tx, &dup_id)).unwrap_err();
        assert!(matches!(err, StrideError::UniquenessViolation { .. }));
    }

    #[test]
    fn update_preserves_identity_fields() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let t = ticket(IssueType::Story, "PROJ-4", "10004");
        storage.batch(|tx| insert_ticket(tx, &t)).unwrap();

        let mut incoming = ticket(IssueType::Story, "PROJ-4", "55555");
        incoming.project_key = "OTHER".into();
        incoming.summary = "Rewritten".into();
        incoming.sprint_names = vec!["Sprint 2".into()];
        let rows = storage.batch(|tx| update_ticket(tx, &incoming)).unwrap();
        assert_eq!(rows, 1);

        let found = storage
            .find_by_key(IssueType::Story, "PROJ-4")
            .unwrap()
            .unwrap();
        assert_eq!(found.summary, "Rewritten");
        assert_eq!(found.sprint_names, vec!["Sprint 2".to_string()]);
        // Identity never overwritten.
        assert_eq!(found.issue_id, "10004");
        assert_eq!(found.project_key, "PROJ");
    }

    #[test]
    fn batch_rolls_back_on_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let t = ticket(IssueType::Subtask, "PROJ-5", "10005");

        let result: Result<()> = storage.batch(|tx| {
            insert_ticket(tx, &t)?;
            Err(StrideError::config("forced failure"))
        });
        assert!(result.is_err());

        assert!(storage
            .find_by_key(IssueType::Subtask, "PROJ-5")
            .unwrap()
            .is_none());
    }

    #[test]
    fn import_log_records_batches() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let result = CommitResult {
            created: 3,
            updated: 1,
            skipped: 1,
            errors: vec![],
        };
        storage
            .batch(|tx| record_import(tx, IssueType::Story, 5, &result))
            .unwrap();

        let entries = storage.recent_imports(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].issue_type, "story");
        assert_eq!(entries[0].total, 5);
        assert_eq!(entries[0].created, 3);

        assert!(storage
            .get_metadata(METADATA_LAST_IMPORT_TIME)
            .unwrap()
            .is_some());
    }

    #[test]
    fn recent_imports_honors_limit_newest_first() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let result = CommitResult {
            created: 2,
            updated: 0,
            skipped: 0,
            errors: vec![],
        };
        storage
            .batch(|tx| record_import(tx, IssueType::Story, 2, &result))
            .unwrap();
        storage
            .batch(|tx| record_import(tx, IssueType::Bug, 2, &result))
            .unwrap();

        let entries = storage.recent_imports(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].issue_type, "bug");
        assert_eq!(entries[0].created, 2);
    }
}
