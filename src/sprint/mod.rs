//! Cross-table sprint statistics.
//!
//! Aggregation scans the three sprint-scoped ticket tables (stories,
//! bugs, subtasks; epics carry no sprint membership in this model) and
//! groups every ticket whose canonical sprint set contains the requested
//! name. Statistics are computed fresh on each query; nothing is cached.

use crate::error::Result;
use crate::model::{
    CanonicalTicket, IssueType, SprintStatistics, TicketSummary, TypeBreakdown,
};
use crate::storage::SqliteStorage;
use std::collections::BTreeMap;
use tracing::debug;

/// Compute statistics for one sprint name.
///
/// Membership is an exact, case-sensitive string match against each
/// ticket's canonical sprint set. A sprint matching zero tickets yields
/// empty breakdowns and all-null date extrema, not an error.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn aggregate(storage: &SqliteStorage, sprint_name: &str) -> Result<SprintStatistics> {
    let stories = matched(storage, IssueType::Story, sprint_name)?;
    let bugs = matched(storage, IssueType::Bug, sprint_name)?;
    let subtasks = matched(storage, IssueType::Subtask, sprint_name)?;

    debug!(
        sprint = sprint_name,
        stories = stories.len(),
        bugs = bugs.len(),
        subtasks = subtasks.len(),
        "Matched sprint tickets"
    );

    let all = || stories.iter().chain(bugs.iter()).chain(subtasks.iter());

    let mut stats = SprintStatistics {
        sprint: sprint_name.to_string(),
        type_breakdown: TypeBreakdown {
            stories: stories.len(),
            bugs: bugs.len(),
            subtasks: subtasks.len(),
        },
        status_breakdown: breakdown(all(), |t| Some(t.status.clone()).filter(|s| !s.is_empty())),
        priority_breakdown: breakdown(all(), |t| t.priority.clone()),
        assignee_breakdown: breakdown(all(), |t| t.assignee.as_ref().map(|p| p.name.clone())),
        team_breakdown: breakdown(all(), |t| t.team.clone()),
        resolution_breakdown: breakdown(bugs.iter(), |t| t.resolution.clone()),
        total_story_points: total_points(all()),
        earliest_created: all().map(|t| t.created_at).min(),
        latest_created: all().map(|t| t.created_at).max(),
        earliest_resolved: all().filter_map(|t| t.resolved_at).min(),
        latest_resolved: all().filter_map(|t| t.resolved_at).max(),
        stories: Vec::new(),
        bugs: Vec::new(),
        subtasks: Vec::new(),
    };

    stats.stories = stories.iter().map(|t| project(t, false)).collect();
    stats.bugs = bugs.iter().map(|t| project(t, true)).collect();
    stats.subtasks = subtasks.iter().map(|t| project(t, false)).collect();

    Ok(stats)
}

fn matched(
    storage: &SqliteStorage,
    issue_type: IssueType,
    sprint_name: &str,
) -> Result<Vec<CanonicalTicket>> {
    let tickets = storage.list_type(issue_type)?;
    Ok(tickets
        .into_iter()
        .filter(|t| t.in_sprint(sprint_name))
        .collect())
}

/// Group tickets on one dimension. Tickets with no value for the
/// dimension are absent from the breakdown, not bucketed under a
/// synthetic key.
fn breakdown<'a>(
    tickets: impl Iterator<Item = &'a CanonicalTicket>,
    key: impl Fn(&CanonicalTicket) -> Option<String>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ticket in tickets {
        if let Some(value) = key(ticket).filter(|v| !v.is_empty()) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    counts
}

/// Sum story points with nulls as zero, rounded to the two decimal
/// places the store carries.
fn total_points<'a>(tickets: impl Iterator<Item = &'a CanonicalTicket>) -> f64 {
    let sum: f64 = tickets.filter_map(|t| t.story_points).sum();
    (sum * 100.0).round() / 100.0
}

/// Project a matched ticket down to the dashboard fields.
fn project(ticket: &CanonicalTicket, include_resolution: bool) -> TicketSummary {
    TicketSummary {
        issue_key: ticket.issue_key.clone(),
        summary: ticket.summary.clone(),
        status: ticket.status.clone(),
        assignee: ticket.assignee.as_ref().map(|p| p.name.clone()),
        story_points: ticket.story_points,
        priority: ticket.priority.clone(),
        resolution: include_resolution
            .then(|| ticket.resolution.clone())
            .flatten(),
    }
}
