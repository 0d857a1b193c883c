//! Workspace discovery and path resolution.
//!
//! A stride workspace is marked by a `.stride` directory. Resolution
//! precedence (highest wins):
//! 1. CLI `--db` override
//! 2. `STRIDE_DIR` environment variable
//! 3. Upward walk from the current directory for `.stride`

use crate::error::{Result, StrideError};
use crate::storage::SqliteStorage;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default database filename used when metadata is missing.
const DEFAULT_DB_FILENAME: &str = "stride.db";

/// Startup metadata describing the database path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub database: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            database: DEFAULT_DB_FILENAME.to_string(),
        }
    }
}

impl Metadata {
    /// Load metadata.json from the stride directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(stride_dir: &Path) -> Result<Self> {
        let path = stride_dir.join("metadata.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let mut metadata: Self = serde_json::from_str(&contents)?;

        if metadata.database.trim().is_empty() {
            metadata.database = DEFAULT_DB_FILENAME.to_string();
        }

        Ok(metadata)
    }
}

/// Resolved paths for this workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub stride_dir: PathBuf,
    pub db_path: PathBuf,
    pub metadata: Metadata,
}

impl ConfigPaths {
    /// Resolve the database path using metadata and the CLI override.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be read.
    pub fn resolve(stride_dir: &Path, db_override: Option<&PathBuf>) -> Result<Self> {
        let metadata = Metadata::load(stride_dir)?;
        let db_path = resolve_db_path(stride_dir, &metadata, db_override);

        Ok(Self {
            stride_dir: stride_dir.to_path_buf(),
            db_path,
            metadata,
        })
    }
}

/// Discover the active `.stride` directory.
///
/// Honors `STRIDE_DIR` when set, otherwise walks up from `start` (or CWD).
///
/// # Errors
///
/// Returns an error if no stride directory is found or the CWD cannot be read.
pub fn discover_stride_dir(start: Option<&Path>) -> Result<PathBuf> {
    discover_stride_dir_with_env(start, None)
}

fn discover_stride_dir_with_env(
    start: Option<&Path>,
    env_override: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = env_override {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
    } else if let Ok(value) = env::var("STRIDE_DIR") {
        if !value.trim().is_empty() {
            let path = PathBuf::from(value);
            if path.is_dir() {
                return Ok(path);
            }
        }
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(".stride");
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    Err(StrideError::NotInitialized)
}

/// Create a `.stride` workspace under `base` and its database file.
///
/// Idempotent: an existing workspace is left as-is and its path returned.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn init_workspace(base: &Path) -> Result<PathBuf> {
    let stride_dir = base.join(".stride");
    fs::create_dir_all(&stride_dir)?;

    let paths = ConfigPaths::resolve(&stride_dir, None)?;
    SqliteStorage::open(&paths.db_path)?;

    Ok(stride_dir)
}

/// Open storage using resolved config paths, returning the storage and paths used.
///
/// # Errors
///
/// Returns an error if metadata cannot be read or the database cannot be opened.
pub fn open_storage(
    stride_dir: &Path,
    db_override: Option<&PathBuf>,
) -> Result<(SqliteStorage, ConfigPaths)> {
    let paths = ConfigPaths::resolve(stride_dir, db_override)?;
    let storage = SqliteStorage::open(&paths.db_path)?;
    Ok((storage, paths))
}

fn resolve_db_path(
    stride_dir: &Path,
    metadata: &Metadata,
    db_override: Option<&PathBuf>,
) -> PathBuf {
    if let Some(override_path) = db_override {
        return override_path.clone();
    }

    let candidate = PathBuf::from(&metadata.database);
    if candidate.is_absolute() {
        candidate
    } else {
        stride_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn metadata_defaults_when_missing() {
        let temp = TempDir::new().expect("tempdir");
        let stride_dir = temp.path().join(".stride");
        fs::create_dir_all(&stride_dir).expect("create stride dir");

        let metadata = Metadata::load(&stride_dir).expect("metadata");
        assert_eq!(metadata.database, DEFAULT_DB_FILENAME);
    }

    #[test]
    fn metadata_override_path() {
        let temp = TempDir::new().expect("tempdir");
        let stride_dir = temp.path().join(".stride");
        fs::create_dir_all(&stride_dir).expect("create stride dir");

        fs::write(
            stride_dir.join("metadata.json"),
            r#"{"database": "custom.db"}"#,
        )
        .expect("write metadata");

        let paths = ConfigPaths::resolve(&stride_dir, None).expect("paths");
        assert_eq!(paths.db_path, stride_dir.join("custom.db"));
    }

    #[test]
    fn db_override_wins() {
        let temp = TempDir::new().expect("tempdir");
        let stride_dir = temp.path().join(".stride");
        fs::create_dir_all(&stride_dir).expect("create stride dir");

        let override_path = temp.path().join("elsewhere.db");
        let paths = ConfigPaths::resolve(&stride_dir, Some(&override_path)).expect("paths");
        assert_eq!(paths.db_path, override_path);
    }

    #[test]
    fn discover_stride_dir_uses_env_override() {
        let temp = TempDir::new().expect("tempdir");
        let stride_dir = temp.path().join(".stride");
        fs::create_dir_all(&stride_dir).expect("create stride dir");

        let discovered = discover_stride_dir_with_env(None, Some(&stride_dir)).expect("discover");
        assert_eq!(discovered, stride_dir);
    }

    #[test]
    fn discover_stride_dir_walks_up() {
        let temp = TempDir::new().expect("tempdir");
        let stride_dir = temp.path().join(".stride");
        fs::create_dir_all(&stride_dir).expect("create stride dir");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("create nested");

        let discovered = discover_stride_dir(Some(&nested)).expect("discover");
        assert_eq!(discovered, stride_dir);
    }

    #[test]
    fn init_workspace_is_idempotent() {
        let temp = TempDir::new().expect("tempdir");

        let first = init_workspace(temp.path()).expect("init");
        let second = init_workspace(temp.path()).expect("re-init");
        assert_eq!(first, second);
        assert!(first.join("stride.db").exists());
    }
}
