#![allow(dead_code)]

use std::sync::Once;

use stride::model::RawRow;
use stride::storage::SqliteStorage;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        stride::logging::init_test_logging();
    });
}

pub fn test_db() -> SqliteStorage {
    init_test_logging();
    SqliteStorage::open_memory().expect("Failed to create test database")
}

/// A raw CSV row with the columns every issue type requires.
pub fn base_row(key: &str, id: &str) -> RawRow {
    [
        ("Issue key", key),
        ("Issue id", id),
        ("Summary", "Fix the widget"),
        ("Status", "In Progress"),
        ("Project key", "PROJ"),
        ("Created", "01/Feb/24 9:15 AM"),
        ("Updated", "03/Feb/24 4:30 PM"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn with_field(mut row: RawRow, key: &str, value: &str) -> RawRow {
    row.insert(key.to_string(), value.to_string());
    row
}

/// A story row carrying a sprint and story points.
pub fn story_row(key: &str, id: &str, sprint: &str, points: &str) -> RawRow {
    let row = with_field(base_row(key, id), "Sprint", sprint);
    with_field(row, "Custom field (Story Points)", points)
}
