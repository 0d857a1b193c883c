//! Init command implementation.

use crate::config;
use crate::error::Result;
use std::env;
use tracing::info;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the workspace directory or database cannot be
/// created.
pub fn execute(json: bool) -> Result<()> {
    let cwd = env::current_dir()?;
    let stride_dir = config::init_workspace(&cwd)?;

    info!(path = %stride_dir.display(), "Workspace initialized");

    if json {
        let payload = serde_json::json!({ "stride_dir": stride_dir });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Initialized stride workspace at {}", stride_dir.display());
    }

    Ok(())
}
