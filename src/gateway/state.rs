//! Last successfully applied configuration, kept in a local JSON file.
//!
//! The file is the "previous" side of the next reconciliation. A missing
//! file means nothing has been applied yet.

use crate::error::{Error, Result};
use crate::models::DhcpServiceSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppliedState {
    pub applied_at: DateTime<Utc>,
    pub spec: DhcpServiceSpec,
}

impl AppliedState {
    pub fn now(spec: DhcpServiceSpec) -> AppliedState {
        AppliedState {
            applied_at: Utc::now(),
            spec,
        }
    }
}

/// Read the state file, `None` if it does not exist.
pub fn read_state(path: &Path) -> Result<Option<AppliedState>> {
    if !path.exists() {
        log::info!("No state file at {}, starting from empty", path.display());
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Error reading state file {}: {e}", path.display())))?;
    let mut deserializer = serde_json::Deserializer::from_str(&json);
    let state: AppliedState = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        Error::Config(format!(
            "Error parsing state file {}: path={} error={}",
            path.display(),
            e.path(),
            e
        ))
    })?;
    log::info!(
        "Read state file {} (applied {})",
        path.display(),
        state.applied_at.to_rfc3339()
    );
    Ok(Some(state))
}

pub fn write_state(path: &Path, state: &AppliedState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::Config(format!("Error serializing state: {e}")))?;
    log::info!("Writing state file: {}", path.display());
    std::fs::write(path, json)
        .map_err(|e| Error::Config(format!("Error writing state file {}: {e}", path.display())))
}

/// Remove the state file after everything was torn down.
pub fn clear_state(path: &Path) -> Result<()> {
    if path.exists() {
        log::info!("Removing state file: {}", path.display());
        std::fs::remove_file(path).map_err(|e| {
            Error::Config(format!("Error removing state file {}: {e}", path.display()))
        })?;
    }
    Ok(())
}
