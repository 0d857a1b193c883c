//! Sprint aggregation over imported batches.

mod common;

use common::{base_row, story_row, test_db, with_field};
use stride::import::commit;
use stride::model::{ImportBatch, IssueType, RawRow};
use stride::sprint::aggregate;

fn bug_row(key: &str, id: &str, sprint: &str, resolution: &str) -> RawRow {
    let row = with_field(base_row(key, id), "Sprint", sprint);
    with_field(row, "Resolution", resolution)
}

#[test]
fn aggregation_spans_all_three_tables() {
    let mut storage = test_db();

    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Story,
            vec![
                story_row("PROJ-1", "10001", "Sprint 5", "3"),
                story_row("PROJ-2", "10002", "Sprint 5", "2.5"),
                story_row("PROJ-3", "10003", "Sprint 6", "8"),
            ],
        ),
    )
    .unwrap();
    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Bug,
            vec![bug_row("PROJ-10", "10010", "Sprint 5", "Fixed")],
        ),
    )
    .unwrap();
    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Subtask,
            vec![with_field(base_row("PROJ-20", "10020"), "Sprint", "Sprint 5")],
        ),
    )
    .unwrap();
    // Epics never carry sprint membership.
    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Epic,
            vec![with_field(base_row("PROJ-30", "10030"), "Sprint", "Sprint 5")],
        ),
    )
    .unwrap();

    let stats = aggregate(&storage, "Sprint 5").unwrap();
    assert_eq!(stats.type_breakdown.stories, 2);
    assert_eq!(stats.type_breakdown.bugs, 1);
    assert_eq!(stats.type_breakdown.subtasks, 1);
    assert_eq!(stats.total_story_points, 5.5);
    assert_eq!(stats.status_breakdown.get("In Progress"), Some(&4));
    assert_eq!(stats.resolution_breakdown.get("Fixed"), Some(&1));
    assert_eq!(stats.stories.len(), 2);
    assert_eq!(stats.bugs.len(), 1);
    assert_eq!(stats.subtasks.len(), 1);
}

#[test]
fn multi_sprint_tickets_count_in_each() {
    let mut storage = test_db();
    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Story,
            vec![story_row("PROJ-1", "10001", "Sprint 5, Sprint 6", "3")],
        ),
    )
    .unwrap();

    assert_eq!(aggregate(&storage, "Sprint 5").unwrap().type_breakdown.stories, 1);
    assert_eq!(aggregate(&storage, "Sprint 6").unwrap().type_breakdown.stories, 1);
    assert_eq!(aggregate(&storage, "Sprint 7").unwrap().type_breakdown.stories, 0);
}

#[test]
fn json_encoded_sprints_round_trip_into_stats() {
    let mut storage = test_db();
    commit(
        &mut storage,
        &ImportBatch::new(
            IssueType::Story,
            vec![story_row(
                "PROJ-1",
                "10001",
                r#"[{"id": 42, "name": "Sprint 5"}, {"id": 43, "name": "Sprint 6"}]"#,
                "1",
            )],
        ),
    )
    .unwrap();

    let stats = aggregate(&storage, "Sprint 6").unwrap();
    assert_eq!(stats.type_breakdown.stories, 1);
    assert_eq!(stats.stories[0].issue_key, "PROJ-1");
}

#[test]
fn date_extrema_track_created_and_resolved() {
    let mut storage = test_db();

    let early = with_field(
        story_row("PROJ-1", "10001", "Sprint 5", "1"),
        "Created",
        "01/Jan/24 8:00 AM",
    );
    let late = with_field(
        with_field(
            story_row("PROJ-2", "10002", "Sprint 5", "1"),
            "Created",
            "15/Mar/24 8:00 AM",
        ),
        "Resolved",
        "20/Mar/24 5:00 PM",
    );
    commit(
        &mut storage,
        &ImportBatch::new(IssueType::Story, vec![early, late]),
    )
    .unwrap();

    let stats = aggregate(&storage, "Sprint 5").unwrap();
    let earliest = stats.earliest_created.unwrap();
    let latest = stats.latest_created.unwrap();
    assert!(earliest < latest);
    assert_eq!(earliest.format("%d/%b/%y").to_string(), "01/Jan/24");

    // Only one ticket resolved: both resolved extrema are that instant.
    assert_eq!(stats.earliest_resolved, stats.latest_resolved);
    assert!(stats.earliest_resolved.is_some());
}
