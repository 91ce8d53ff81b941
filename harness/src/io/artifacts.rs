//! Canonical run-scoped artifact paths.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::io::config::HarnessConfig;

/// All run-scoped paths under the report root.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub report_path: PathBuf,
    /// `{root}/{attempt}/screenshots`
    pub screenshots_dir: PathBuf,
    /// `{root}/dp_commands`
    pub commands_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>, report_file: &str, attempt: u32) -> Self {
        let root = root.into();
        Self {
            report_path: root.join(report_file),
            screenshots_dir: root.join(attempt.to_string()).join("screenshots"),
            commands_dir: root.join("dp_commands"),
            root,
        }
    }

    pub fn from_config(cfg: &HarnessConfig) -> Self {
        Self::new(&cfg.report.root, &cfg.report.file, cfg.report.attempt)
    }

    /// Path for a screenshot, creating the screenshot directory if needed.
    pub fn screenshot_path(&self, file_name: &str) -> Result<PathBuf> {
        ensure_dir(&self.screenshots_dir)?;
        Ok(self.screenshots_dir.join(file_name))
    }

    /// Path for a downloaded command file, creating its directory if needed.
    pub fn command_file_path(&self, file_name: &str) -> Result<PathBuf> {
        ensure_dir(&self.commands_dir)?;
        Ok(self.commands_dir.join(file_name))
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_report_layout() {
        let paths = ArtifactPaths::new("/tmp/report", "report.json", 2);
        assert_eq!(paths.report_path, PathBuf::from("/tmp/report/report.json"));
        assert_eq!(
            paths.screenshots_dir,
            PathBuf::from("/tmp/report/2/screenshots")
        );
        assert_eq!(paths.commands_dir, PathBuf::from("/tmp/report/dp_commands"));
    }

    #[test]
    fn artifact_dirs_are_created_on_demand() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ArtifactPaths::new(temp.path(), "report.json", 0);
        assert!(!paths.commands_dir.exists());

        let script = paths.command_file_path("dp1_1.sh").expect("command path");
        assert!(paths.commands_dir.is_dir());
        assert_eq!(script, paths.commands_dir.join("dp1_1.sh"));

        let shot = paths.screenshot_path("error-x.png").expect("screenshot path");
        assert!(paths.screenshots_dir.is_dir());
        assert_eq!(shot.file_name().and_then(|n| n.to_str()), Some("error-x.png"));
    }
}
