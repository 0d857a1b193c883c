//! Error types for `stride`.
//!
//! Infrastructure failures abort the in-flight call and roll back any open
//! transaction. Row-level data-quality problems are *not* represented here;
//! they live in [`crate::normalize::InvalidRow`] and are collected into
//! result payloads instead of propagating.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StrideError>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum StrideError {
    /// No `.stride` workspace found.
    #[error("no .stride workspace found (run `stride init` first)")]
    NotInitialized,

    /// Configuration or usage error.
    #[error("{0}")]
    Config(String),

    /// A natural-key collision surfaced by the storage layer at insert
    /// time. The commit engine converts this into an update; it never
    /// escapes a batch commit.
    #[error("uniqueness violation in {table}: {issue_key}")]
    UniquenessViolation { table: &'static str, issue_key: String },

    /// Database error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// CSV parse error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrideError {
    /// Build a config error from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
