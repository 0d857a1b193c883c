//! Sprint command implementation.
//!
//! Shows cross-table statistics for one sprint: counts by type, status,
//! priority, assignee, team, and resolution, plus story point totals and
//! date extrema.

use crate::cli::SprintArgs;
use crate::error::Result;
use crate::model::{SprintStatistics, TicketSummary};
use crate::sprint;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Execute the sprint command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or queries fail.
pub fn execute(args: &SprintArgs, json: bool, db_override: Option<&PathBuf>) -> Result<()> {
    let storage = super::open(db_override)?;

    info!(sprint = %args.name, "Computing sprint statistics");

    let stats = sprint::aggregate(&storage, &args.name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_text(&stats);
    }

    Ok(())
}

fn print_text(stats: &SprintStatistics) {
    let b = &stats.type_breakdown;
    let total = b.stories + b.bugs + b.subtasks;

    println!("Sprint: {}", stats.sprint);
    println!(
        "  Tickets: {total} ({} stories, {} bugs, {} subtasks)",
        b.stories, b.bugs, b.subtasks
    );
    println!("  Story points: {}", stats.total_story_points);

    print_breakdown("By status", &stats.status_breakdown);
    print_breakdown("By priority", &stats.priority_breakdown);
    print_breakdown("By assignee", &stats.assignee_breakdown);
    print_breakdown("By team", &stats.team_breakdown);
    print_breakdown("Bug resolutions", &stats.resolution_breakdown);

    println!("\nDates:");
    print_date("Earliest created", stats.earliest_created);
    print_date("Latest created", stats.latest_created);
    print_date("Earliest resolved", stats.earliest_resolved);
    print_date("Latest resolved", stats.latest_resolved);

    print_tickets("Stories", &stats.stories);
    print_tickets("Bugs", &stats.bugs);
    print_tickets("Subtasks", &stats.subtasks);
}

fn print_breakdown(label: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!("\n{label}:");
    for (key, count) in counts {
        println!("  {key}: {count}");
    }
}

fn print_date(label: &str, value: Option<DateTime<Utc>>) {
    match value {
        Some(at) => println!("  {label}: {}", at.to_rfc3339()),
        None => println!("  {label}: -"),
    }
}

fn print_tickets(label: &str, tickets: &[TicketSummary]) {
    if tickets.is_empty() {
        return;
    }
    println!("\n{label}:");
    for t in tickets {
        let assignee = t.assignee.as_deref().unwrap_or("unassigned");
        println!("  {} [{}] {} ({assignee})", t.issue_key, t.status, t.summary);
    }
}
