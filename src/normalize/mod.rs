//! Per-issue-type CSV row normalization.
//!
//! The four issue-type tables evolved independently, so their CSV exports
//! disagree on column names and on how multi-valued sprint membership is
//! encoded. This module owns all of that: each issue type has a column
//! alias table feeding one [`CanonicalTicket`], and every sprint encoding
//! collapses into one ordered, deduplicated set of names.
//!
//! Normalization is a pure function over its input; it never touches
//! storage.

use crate::model::{CanonicalTicket, IssueType, PersonRef, RawRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// A data-quality failure for a single row. Collected into batch result
/// payloads; never propagated past the batch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRow {
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("unparseable {field} date: {value:?}")]
    BadDate { field: &'static str, value: String },
}

/// Column aliases for one canonical field. The first present, non-empty
/// alias wins; matching is by name, never positional.
type Aliases = &'static [&'static str];

/// Per-issue-type column schema.
///
/// The alias lists reflect how each table's export actually names its
/// columns: stories and epics use the tracker's "Custom field (...)"
/// headers for agile fields, bugs and subtasks predate those and use
/// bare names.
pub struct TypeSchema {
    pub issue_key: Aliases,
    pub issue_id: Aliases,
    pub summary: Aliases,
    pub status: Aliases,
    pub status_category: Aliases,
    pub priority: Aliases,
    pub resolution: Aliases,
    pub project_key: Aliases,
    pub assignee: Aliases,
    pub assignee_id: Aliases,
    pub reporter: Aliases,
    pub reporter_id: Aliases,
    pub creator: Aliases,
    pub creator_id: Aliases,
    pub created: Aliases,
    pub updated: Aliases,
    pub resolved: Aliases,
    pub due_date: Aliases,
    pub parent_key: Aliases,
    pub sprint: Aliases,
    pub story_points: Aliases,
    pub team: Aliases,
}

const STORY_SCHEMA: TypeSchema = TypeSchema {
    issue_key: &["Issue key", "Key"],
    issue_id: &["Issue id", "Id"],
    summary: &["Summary"],
    status: &["Status"],
    status_category: &["Status Category"],
    priority: &["Priority"],
    resolution: &["Resolution"],
    project_key: &["Project key"],
    assignee: &["Assignee"],
    assignee_id: &["Assignee Id"],
    reporter: &["Reporter"],
    reporter_id: &["Reporter Id"],
    creator: &["Creator"],
    creator_id: &["Creator Id"],
    created: &["Created"],
    updated: &["Updated"],
    resolved: &["Resolved"],
    due_date: &["Due date", "Due Date"],
    parent_key: &["Parent", "Custom field (Epic Link)"],
    sprint: &["Sprint", "Custom field (Sprint)"],
    story_points: &[
        "Custom field (Story Points)",
        "Custom field (Story point estimate)",
        "Story Points",
    ],
    team: &["Custom field (Team)", "Team"],
};

const BUG_SCHEMA: TypeSchema = TypeSchema {
    issue_key: &["Issue key", "Key"],
    issue_id: &["Issue id", "Id"],
    summary: &["Summary"],
    status: &["Status"],
    status_category: &["Status Category"],
    priority: &["Priority"],
    resolution: &["Resolution"],
    project_key: &["Project key"],
    assignee: &["Assignee"],
    assignee_id: &["Assignee Id"],
    reporter: &["Reporter"],
    reporter_id: &["Reporter Id"],
    creator: &["Creator"],
    creator_id: &["Creator Id"],
    created: &["Created"],
    updated: &["Updated"],
    resolved: &["Resolved"],
    due_date: &["Due date", "Due Date"],
    parent_key: &["Parent", "Parent key"],
    sprint: &["Sprint", "Sprints"],
    story_points: &["Story Points", "Custom field (Story Points)"],
    team: &["Team"],
};

const SUBTASK_SCHEMA: TypeSchema = TypeSchema {
    issue_key: &["Issue key", "Key"],
    issue_id: &["Issue id", "Id"],
    summary: &["Summary"],
    status: &["Status"],
    status_category: &["Status Category"],
    priority: &["Priority"],
    resolution: &["Resolution"],
    project_key: &["Project key"],
    assignee: &["Assignee"],
    assignee_id: &["Assignee Id"],
    reporter: &["Reporter"],
    reporter_id: &["Reporter Id"],
    creator: &["Creator"],
    creator_id: &["Creator Id"],
    created: &["Created"],
    updated: &["Updated"],
    resolved: &["Resolved"],
    due_date: &["Due date", "Due Date"],
    parent_key: &["Parent", "Parent key"],
    sprint: &["Sprint", "Sprints"],
    story_points: &["Story Points"],
    team: &["Team"],
};

const EPIC_SCHEMA: TypeSchema = TypeSchema {
    issue_key: &["Issue key", "Key"],
    issue_id: &["Issue id", "Id"],
    summary: &["Summary", "Custom field (Epic Name)"],
    status: &["Status"],
    status_category: &["Status Category"],
    priority: &["Priority"],
    resolution: &["Resolution"],
    project_key: &["Project key"],
    assignee: &["Assignee"],
    assignee_id: &["Assignee Id"],
    reporter: &["Reporter"],
    reporter_id: &["Reporter Id"],
    creator: &["Creator"],
    creator_id: &["Creator Id"],
    created: &["Created"],
    updated: &["Updated"],
    resolved: &["Resolved"],
    due_date: &["Due date", "Due Date"],
    parent_key: &[],
    // Epics do not carry sprint membership in this model.
    sprint: &[],
    story_points: &["Custom field (Story Points)", "Story Points"],
    team: &["Custom field (Team)", "Team"],
};

/// Look up the column schema for an issue type.
#[must_use]
pub const fn schema_for(issue_type: IssueType) -> &'static TypeSchema {
    match issue_type {
        IssueType::Epic => &EPIC_SCHEMA,
        IssueType::Story => &STORY_SCHEMA,
        IssueType::Bug => &BUG_SCHEMA,
        IssueType::Subtask => &SUBTASK_SCHEMA,
    }
}

/// Batch-scoped normalizer: one issue-type schema plus the declared
/// project/team context used as fallback when a row omits the column.
pub struct Normalizer<'a> {
    issue_type: IssueType,
    schema: &'static TypeSchema,
    project_fallback: Option<&'a str>,
    team_fallback: Option<&'a str>,
}

impl<'a> Normalizer<'a> {
    #[must_use]
    pub fn new(
        issue_type: IssueType,
        project_fallback: Option<&'a str>,
        team_fallback: Option<&'a str>,
    ) -> Self {
        Self {
            issue_type,
            schema: schema_for(issue_type),
            project_fallback,
            team_fallback,
        }
    }

    /// Convert one raw row into a canonical ticket.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRow`] when a required field is missing/empty or a
    /// required date fails to parse. Optional fields are lenient: bad
    /// values drop to `None` without invalidating the row.
    pub fn normalize(&self, row: &RawRow) -> Result<CanonicalTicket, InvalidRow> {
        let s = self.schema;

        let project_key = lookup(row, s.project_key)
            .map(str::to_string)
            .or_else(|| self.project_fallback.map(str::to_string));

        let mut missing = Vec::new();
        let issue_key = require(row, s.issue_key, "issue_key", &mut missing);
        let issue_id = require(row, s.issue_id, "issue_id", &mut missing);
        let summary = require(row, s.summary, "summary", &mut missing);
        let status = require(row, s.status, "status", &mut missing);
        let created_raw = require(row, s.created, "created", &mut missing);
        let updated_raw = require(row, s.updated, "updated", &mut missing);
        if project_key.is_none() {
            missing.push("project_key".to_string());
        }
        if !missing.is_empty() {
            return Err(InvalidRow::MissingFields { fields: missing });
        }

        // Required dates are strict: unparseable means the row is invalid.
        let created_at = parse_required_date("created", &created_raw)?;
        let updated_at = parse_required_date("updated", &updated_raw)?;

        // Optional dates are lenient: unparseable drops to None.
        let resolved_at = lookup(row, s.resolved).and_then(parse_date);
        let due_date = lookup(row, s.due_date).and_then(parse_date);

        let sprint_names = lookup(row, s.sprint).map_or_else(Vec::new, unify_sprints);
        let story_points = lookup(row, s.story_points).and_then(parse_points);

        let team = lookup(row, s.team)
            .map(str::to_string)
            .or_else(|| self.team_fallback.map(str::to_string));

        Ok(CanonicalTicket {
            issue_key,
            issue_id,
            issue_type: self.issue_type,
            summary,
            status,
            status_category: lookup(row, s.status_category).map(str::to_string),
            priority: lookup(row, s.priority).map(str::to_string),
            resolution: lookup(row, s.resolution).map(str::to_string),
            project_key: project_key.unwrap_or_default(),
            assignee: person(row, s.assignee, s.assignee_id),
            reporter: person(row, s.reporter, s.reporter_id),
            creator: person(row, s.creator, s.creator_id),
            created_at,
            updated_at,
            resolved_at,
            due_date,
            parent_key: lookup(row, s.parent_key).map(str::to_string),
            sprint_names,
            story_points,
            team,
            extra: passthrough(row, s),
        })
    }
}

/// Best-effort issue key extraction for error reporting on rows that
/// failed normalization.
#[must_use]
pub fn row_issue_key(row: &RawRow, issue_type: IssueType) -> Option<String> {
    lookup(row, schema_for(issue_type).issue_key).map(str::to_string)
}

/// First present, non-empty alias value (trimmed).
fn lookup<'r>(row: &'r RawRow, aliases: Aliases) -> Option<&'r str> {
    aliases
        .iter()
        .filter_map(|name| row.get(*name))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn require(row: &RawRow, aliases: Aliases, canonical: &str, missing: &mut Vec<String>) -> String {
    lookup(row, aliases).map(str::to_string).unwrap_or_else(|| {
        missing.push(canonical.to_string());
        String::new()
    })
}

fn person(row: &RawRow, name_aliases: Aliases, id_aliases: Aliases) -> Option<PersonRef> {
    let name = lookup(row, name_aliases)?;
    Some(PersonRef {
        name: name.to_string(),
        external_id: lookup(row, id_aliases).map(str::to_string),
    })
}

/// Columns consumed by no schema field land in `extra`, opaquely.
fn passthrough(row: &RawRow, s: &TypeSchema) -> BTreeMap<String, String> {
    let consumed: Vec<Aliases> = vec![
        s.issue_key,
        s.issue_id,
        s.summary,
        s.status,
        s.status_category,
        s.priority,
        s.resolution,
        s.project_key,
        s.assignee,
        s.assignee_id,
        s.reporter,
        s.reporter_id,
        s.creator,
        s.creator_id,
        s.created,
        s.updated,
        s.resolved,
        s.due_date,
        s.parent_key,
        s.sprint,
        s.story_points,
        s.team,
    ];

    row.iter()
        .filter(|(name, value)| {
            !value.trim().is_empty()
                && !consumed
                    .iter()
                    .any(|aliases| aliases.contains(&name.as_str()))
        })
        .map(|(name, value)| (name.clone(), value.trim().to_string()))
        .collect()
}

/// Date formats the tracker's CSV exporter has been observed to emit.
const DATETIME_FORMATS: [&str; 4] = [
    "%d/%b/%y %I:%M %p",
    "%d/%b/%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%d/%b/%y", "%d/%b/%Y", "%Y-%m-%d"];

/// Parse a tracker export timestamp. Naive values are taken as UTC.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}

fn parse_required_date(field: &'static str, value: &str) -> Result<DateTime<Utc>, InvalidRow> {
    parse_date(value).ok_or_else(|| InvalidRow::BadDate {
        field,
        value: value.to_string(),
    })
}

/// Lenient decimal coercion: non-numeric non-empty values drop to None.
fn parse_points(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Unify the sprint-membership encodings into one ordered set.
///
/// Three source shapes exist: a JSON-array-shaped string (either table),
/// a comma-separated string (bugs/subtasks), and a multi-value column
/// list which the upload transport collapses to comma-joined before it
/// reaches us (stories). A JSON-looking value that fails to parse
/// degrades to a single-element set of the raw trimmed string rather
/// than being dropped.
#[must_use]
pub fn unify_sprints(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            Ok(values) => dedupe_ordered(values.iter().filter_map(json_sprint_name)),
            Err(_) => vec![trimmed.to_string()],
        };
    }

    dedupe_ordered(trimmed.split(',').map(|s| s.trim().to_string()))
}

fn json_sprint_name(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        // Some exports wrap each sprint in an object with a name field.
        serde_json::Value::Object(map) => map
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(|s| s.trim().to_string()),
        _ => None,
    }
}

/// Preserve first-seen order, drop empties and exact duplicates.
fn dedupe_ordered(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
