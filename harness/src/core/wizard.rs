//! Stages of the data plane creation workflow.

use std::fmt;

/// A state of the creation workflow.
///
/// The happy path runs `Start` through `Done`; `CleanupAndRetry` loops back to
/// `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStage {
    Start,
    BasicInfo,
    NamespaceConfig,
    ReviewConfig,
    Preview,
    AwaitRegistration,
    RunCommands,
    AwaitTunnel,
    Done,
    CleanupAndRetry,
}

impl CreationStage {
    /// Title of the wizard tab that is active while this stage is shown.
    pub fn wizard_title(self) -> Option<&'static str> {
        match self {
            Self::BasicInfo => Some("Basic"),
            Self::NamespaceConfig => Some("Namespace & Service account"),
            Self::ReviewConfig => Some("Configuration"),
            Self::Preview => Some("Preview"),
            _ => None,
        }
    }
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Start => "start",
            Self::BasicInfo => "basic_info",
            Self::NamespaceConfig => "namespace_config",
            Self::ReviewConfig => "review_config",
            Self::Preview => "preview",
            Self::AwaitRegistration => "await_registration",
            Self::RunCommands => "run_commands",
            Self::AwaitTunnel => "await_tunnel",
            Self::Done => "done",
            Self::CleanupAndRetry => "cleanup_and_retry",
        };
        f.write_str(label)
    }
}
