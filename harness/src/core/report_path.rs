//! Dotted paths into the run report and the milestones recorded there.

use anyhow::{Result, anyhow};

/// Top-level key holding one record per data plane.
pub const DATAPLANES_KEY: &str = "dataplanes";
/// Key under a data plane record holding one record per capability.
pub const CAPABILITIES_KEY: &str = "capabilities";
/// Key under a capability record holding one record per app.
pub const APPS_KEY: &str = "apps";
/// Top-level key holding the environment the run was executed against.
pub const ENV_KEY: &str = "ENV";

/// Durable facts about a data plane's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Created,
    RunCommands,
    TunnelConnected,
    O11yConfig,
}

impl Milestone {
    pub fn key(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::RunCommands => "runCommands",
            Self::TunnelConnected => "tunnelConnected",
            Self::O11yConfig => "o11yConfig",
        }
    }
}

/// Split a dotted path (`.dataplanes.dp1.created`) into its segments.
///
/// A single leading dot is optional. Empty segments are rejected.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.strip_prefix('.').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(anyhow!("report path must not be empty"));
    }
    let segments: Vec<&str> = trimmed.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(anyhow!("report path '{path}' has an empty segment"));
    }
    Ok(segments)
}
