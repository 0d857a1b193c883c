//! `SQLite` storage layer for `stride`.
//!
//! Persistence uses one table per issue type (epics, stories, bugs,
//! subtasks), each keyed by the natural `issue_key` with a UNIQUE
//! `issue_id`. The uniqueness invariant is enforced by the database, not
//! by callers: the commit engine's read-before-write is advisory and an
//! insert-time constraint violation is surfaced as a typed error.
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main `SQLite` storage implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{ImportLogEntry, SqliteStorage, find_ticket, insert_ticket, update_ticket};
