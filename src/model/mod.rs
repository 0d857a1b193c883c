//! Data types for `stride`.
//!
//! [`CanonicalTicket`] is the superset shape every issue-type-specific CSV
//! row is normalized into before matching, commit, or aggregation. The
//! remaining types are ephemeral request/result payloads: they are built
//! per call and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A raw CSV row as delivered by the upload transport: column name -> cell.
pub type RawRow = BTreeMap<String, String>;

/// Issue type, one persisted table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Epic,
    Story,
    Bug,
    Subtask,
}

impl IssueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Bug => "bug",
            Self::Subtask => "subtask",
        }
    }

    /// Name of the table this issue type persists into.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Epic => "epics",
            Self::Story => "stories",
            Self::Bug => "bugs",
            Self::Subtask => "subtasks",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "story" => Ok(Self::Story),
            "bug" => Ok(Self::Bug),
            "subtask" | "sub-task" => Ok(Self::Subtask),
            other => Err(format!(
                "unknown issue type: {other}. Must be one of: epic, story, bug, subtask"
            )),
        }
    }
}

/// A loosely-coupled reference to a person in the external identity
/// system: display name plus an optional external account id. Not a
/// foreign key into anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl PersonRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
        }
    }
}

/// The canonical ticket record all issue types normalize into.
///
/// `issue_key` and `issue_id` are the natural keys: each is unique within
/// its issue-type table and neither is ever overwritten once persisted.
/// Required fields are non-optional here because the normalizer rejects
/// rows missing them before a `CanonicalTicket` is ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTicket {
    pub issue_key: String,
    pub issue_id: String,
    pub issue_type: IssueType,
    pub summary: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub project_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<PersonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<PersonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<PersonRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Weak reference to an epic or parent issue; not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    /// Ordered set of sprint names, first-seen order, exact duplicates
    /// removed. Canonical regardless of the source encoding.
    #[serde(default)]
    pub sprint_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Unrecognized source columns, preserved opaquely.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl CanonicalTicket {
    /// Exact, case-sensitive sprint membership test.
    #[must_use]
    pub fn in_sprint(&self, sprint_name: &str) -> bool {
        self.sprint_names.iter().any(|s| s == sprint_name)
    }
}

/// One upload request: raw rows plus declared type and project/team
/// context. Built per request, discarded after preview or commit.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub issue_type: IssueType,
    pub rows: Vec<RawRow>,
    /// Fallback project key for rows whose export omitted the column.
    pub project_key: Option<String>,
    /// Fallback team for rows whose export omitted the column.
    pub team: Option<String>,
}

impl ImportBatch {
    #[must_use]
    pub fn new(issue_type: IssueType, rows: Vec<RawRow>) -> Self {
        Self {
            issue_type,
            rows,
            project_key: None,
            team: None,
        }
    }
}

/// A row-level failure descriptor carried in result payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based index into the batch's rows.
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<String>,
    pub reason: String,
}

/// One entry in the preview sample: a normalized ticket annotated with
/// what a commit would do to it.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    #[serde(flatten)]
    pub ticket: CanonicalTicket,
    pub is_duplicate: bool,
    pub is_valid: bool,
}

/// Dry-run result: what a commit of the same batch would do, without
/// touching storage. Recomputed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResult {
    pub total_records: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub invalid_count: usize,
    /// First N valid rows in original file order.
    pub sample_records: Vec<SampleRecord>,
    /// Failure reasons for every invalid row.
    pub invalid_rows: Vec<RowError>,
}

/// Result of committing a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

/// Counts of matched tickets per sprint-scoped table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeBreakdown {
    pub stories: usize,
    pub bugs: usize,
    pub subtasks: usize,
}

/// A matched ticket projected down to the fields the dashboard needs.
#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub issue_key: String,
    pub summary: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Populated for bugs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Derived cross-table statistics for one sprint name.
///
/// Sprint matching is exact and case-sensitive. Breakdown keys are the
/// observed values; tickets with a null/empty value for a dimension are
/// simply absent from that breakdown (no synthetic "unassigned" bucket).
/// Computed fresh on each query.
#[derive(Debug, Clone, Serialize)]
pub struct SprintStatistics {
    pub sprint: String,
    pub type_breakdown: TypeBreakdown,
    pub status_breakdown: BTreeMap<String, usize>,
    pub priority_breakdown: BTreeMap<String, usize>,
    pub assignee_breakdown: BTreeMap<String, usize>,
    pub team_breakdown: BTreeMap<String, usize>,
    /// Bugs only; other types do not contribute.
    pub resolution_breakdown: BTreeMap<String, usize>,
    /// Sum over matched tickets, nulls treated as zero.
    pub total_story_points: f64,
    pub earliest_created: Option<DateTime<Utc>>,
    pub latest_created: Option<DateTime<Utc>>,
    pub earliest_resolved: Option<DateTime<Utc>>,
    pub latest_resolved: Option<DateTime<Utc>>,
    pub stories: Vec<TicketSummary>,
    pub bugs: Vec<TicketSummary>,
    pub subtasks: Vec<TicketSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_type_parses_aliases() {
        assert_eq!("story".parse::<IssueType>().unwrap(), IssueType::Story);
        assert_eq!("Sub-Task".parse::<IssueType>().unwrap(), IssueType::Subtask);
        assert!("widget".parse::<IssueType>().is_err());
    }

    #[test]
    fn issue_type_table_names() {
        assert_eq!(IssueType::Epic.table(), "epics");
        assert_eq!(IssueType::Story.table(), "stories");
        assert_eq!(IssueType::Bug.table(), "bugs");
        assert_eq!(IssueType::Subtask.table(), "subtasks");
    }

    #[test]
    fn sprint_membership_is_case_sensitive() {
        let mut ticket = ticket_fixture();
        ticket.sprint_names = vec!["Sprint 1".into(), "Sprint 2".into()];
        assert!(ticket.in_sprint("Sprint 1"));
        assert!(!ticket.in_sprint("sprint 1"));
        assert!(!ticket.in_sprint("Sprint 1 "));
    }

    fn ticket_fixture() -> CanonicalTicket {
        CanonicalTicket {
            issue_key: "PROJ-1".into(),
            issue_id: "10001".into(),
            issue_type: IssueType::Story,
            summary: "A ticket".into(),
            status: "Open".into(),
            status_category: None,
            priority: None,
            resolution: None,
            project_key: "PROJ".into(),
            assignee: None,
            reporter: None,
            creator: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_at: None,
            due_date: None,
            parent_key: None,
            sprint_names: vec![],
            story_points: None,
            team: None,
            extra: BTreeMap::new(),
        }
    }
}
