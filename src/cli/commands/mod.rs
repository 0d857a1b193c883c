//! Command implementations.

pub mod import;
pub mod init;
pub mod log;
pub mod preview;
pub mod sprint;

use crate::config;
use crate::error::Result;
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open workspace storage, honoring a `--db` override.
///
/// Discovery starts from the absolute current directory so the upward
/// walk can ascend past it; a relative start would have nowhere to pop.
fn open(db_override: Option<&PathBuf>) -> Result<SqliteStorage> {
    if let Some(path) = db_override {
        return SqliteStorage::open(path);
    }
    let stride_dir = config::discover_stride_dir(None)?;
    let (storage, _paths) = config::open_storage(&stride_dir, None)?;
    Ok(storage)
}
