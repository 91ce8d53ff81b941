//! Run-scoped report store.
//!
//! The report is a JSON document that records every durable milestone of the
//! run (`.harness/report/report.json`). Each `set` writes through to disk so a
//! later process can resume from what is recorded here.
//!
//! Layout:
//! ```text
//! {
//!   "ENV": { "CONSOLE_URL": "..." },
//!   "dataplanes": {
//!     "dp1": {
//!       "created": true,
//!       "runCommands": true,
//!       "tunnelConnected": true,
//!       "capabilities": { "bwce": { "apps": { "app1": { "status": "Running" } } } }
//!     }
//!   }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::report_path::{
    APPS_KEY, CAPABILITIES_KEY, DATAPLANES_KEY, Milestone, split_path,
};

/// Durable key/value report for the current run.
#[derive(Debug, Clone)]
pub struct RunReport {
    path: PathBuf,
    doc: Value,
}

impl RunReport {
    /// Open the report at `path`. A missing file yields an empty report.
    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening run report");
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                doc: Value::Object(Map::new()),
            });
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read run report {}", path.display()))?;
        let doc: Value = if contents.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("parse run report {}", path.display()))?
        };
        if !doc.is_object() {
            return Err(anyhow!(
                "run report {} must contain a JSON object",
                path.display()
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments = split_path(path).ok()?;
        self.get_at(&segments)
    }

    /// Set the value at a dotted path, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments = split_path(path)?;
        self.set_at(&segments, value.into())
    }

    pub fn is_dataplane_created(&self, dataplane: &str) -> bool {
        self.is_milestone_set(dataplane, Milestone::Created)
    }

    pub fn is_milestone_set(&self, dataplane: &str, milestone: Milestone) -> bool {
        matches!(
            self.get_at(&[DATAPLANES_KEY, dataplane, milestone.key()]),
            Some(Value::Bool(true))
        )
    }

    /// Record that `dataplane` exists in the console.
    pub fn set_dataplane(&mut self, dataplane: &str) -> Result<()> {
        self.set_milestone(dataplane, Milestone::Created)
    }

    pub fn set_milestone(&mut self, dataplane: &str, milestone: Milestone) -> Result<()> {
        self.set_at(&[DATAPLANES_KEY, dataplane, milestone.key()], Value::Bool(true))
    }

    pub fn set_dataplane_info(
        &mut self,
        dataplane: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_at(&[DATAPLANES_KEY, dataplane, key], value.into())
    }

    pub fn get_dataplane_info(&self, dataplane: &str, key: &str) -> Option<&Value> {
        self.get_at(&[DATAPLANES_KEY, dataplane, key])
    }

    /// Names of every recorded data plane, sorted.
    pub fn dataplanes(&self) -> Vec<String> {
        self.child_keys(&[DATAPLANES_KEY])
    }

    /// Capabilities recorded under `dataplane`, sorted.
    pub fn capabilities(&self, dataplane: &str) -> Vec<String> {
        self.child_keys(&[DATAPLANES_KEY, dataplane, CAPABILITIES_KEY])
    }

    pub fn set_capability_info(
        &mut self,
        dataplane: &str,
        capability: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_at(
            &[DATAPLANES_KEY, dataplane, CAPABILITIES_KEY, capability, key],
            value.into(),
        )
    }

    /// Apps recorded under a capability, sorted.
    pub fn capability_apps(&self, dataplane: &str, capability: &str) -> Vec<String> {
        self.child_keys(&[DATAPLANES_KEY, dataplane, CAPABILITIES_KEY, capability, APPS_KEY])
    }

    pub fn set_capability_app_info(
        &mut self,
        dataplane: &str,
        capability: &str,
        app: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.set_at(
            &[
                DATAPLANES_KEY,
                dataplane,
                CAPABILITIES_KEY,
                capability,
                APPS_KEY,
                app,
                key,
            ],
            value.into(),
        )
    }

    pub fn get_capability_app_info(
        &self,
        dataplane: &str,
        capability: &str,
        app: &str,
        key: &str,
    ) -> Option<&Value> {
        self.get_at(&[
            DATAPLANES_KEY,
            dataplane,
            CAPABILITIES_KEY,
            capability,
            APPS_KEY,
            app,
            key,
        ])
    }

    /// Drop the whole record of `dataplane`. Returns whether one existed.
    pub fn remove_dataplane(&mut self, dataplane: &str) -> Result<bool> {
        let removed = self
            .doc
            .get_mut(DATAPLANES_KEY)
            .and_then(Value::as_object_mut)
            .and_then(|dataplanes| dataplanes.remove(dataplane))
            .is_some();
        if removed {
            debug!(dataplane, "removed data plane record");
            self.persist()?;
        }
        Ok(removed)
    }

    fn get_at(&self, segments: &[&str]) -> Option<&Value> {
        let mut cursor = &self.doc;
        for segment in segments {
            cursor = cursor.as_object()?.get(*segment)?;
        }
        Some(cursor)
    }

    fn set_at(&mut self, segments: &[&str], value: Value) -> Result<()> {
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| anyhow!("report path must not be empty"))?;
        let mut cursor = &mut self.doc;
        for (depth, segment) in parents.iter().enumerate() {
            let map = cursor.as_object_mut().ok_or_else(|| {
                anyhow!(
                    "report value at '{}' is not an object",
                    segments[..depth].join(".")
                )
            })?;
            cursor = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let map = cursor.as_object_mut().ok_or_else(|| {
            anyhow!(
                "report value at '{}' is not an object",
                parents.join(".")
            )
        })?;
        debug!(path = %segments.join("."), value = %value, "recording report value");
        map.insert((*last).to_string(), value);
        self.persist()
    }

    fn child_keys(&self, segments: &[&str]) -> Vec<String> {
        self.get_at(segments)
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Atomically write the report to disk (temp file + rename).
    fn persist(&self) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(&self.doc).context("serialize run report")?;
        buf.push('\n');
        let parent = self
            .path
            .parent()
            .with_context(|| format!("run report path missing parent {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf)
            .with_context(|| format!("write temp run report {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace run report {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_report_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = RunReport::open(&temp.path().join("report.json")).expect("open");
        assert!(report.dataplanes().is_empty());
        assert!(!report.is_dataplane_created("dp1"));
        assert!(report.get(".ENV.CONSOLE_URL").is_none());
    }

    /// Milestones written by one process are visible to the next one.
    #[test]
    fn milestones_survive_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/report.json");

        let mut report = RunReport::open(&path).expect("open");
        report.set_dataplane("dp1").expect("set created");
        report
            .set_milestone("dp1", Milestone::RunCommands)
            .expect("set runCommands");
        report.set(".ENV.CONSOLE_URL", "https://cp").expect("set env");

        let reopened = RunReport::open(&path).expect("reopen");
        assert!(reopened.is_dataplane_created("dp1"));
        assert!(reopened.is_milestone_set("dp1", Milestone::RunCommands));
        assert!(!reopened.is_milestone_set("dp1", Milestone::TunnelConnected));
        assert_eq!(
            reopened.get("ENV.CONSOLE_URL"),
            Some(&Value::String("https://cp".to_string()))
        );
        assert!(!temp.path().join("nested/report.json.tmp").exists());
    }

    #[test]
    fn capability_and_app_records_are_nested() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut report = RunReport::open(&temp.path().join("report.json")).expect("open");
        report
            .set_capability_app_info("dp1", "bwce", "app-b", "status", "Running")
            .expect("set app");
        report
            .set_capability_app_info("dp1", "bwce", "app-a", "status", "Stopped")
            .expect("set app");
        report
            .set_capability_info("dp1", "flogo", "provisioned", true)
            .expect("set capability");

        assert_eq!(report.dataplanes(), vec!["dp1"]);
        assert_eq!(report.capabilities("dp1"), vec!["bwce", "flogo"]);
        assert_eq!(report.capability_apps("dp1", "bwce"), vec!["app-a", "app-b"]);
        assert_eq!(
            report.get_capability_app_info("dp1", "bwce", "app-b", "status"),
            Some(&Value::String("Running".to_string()))
        );
        assert_eq!(
            report.get(".dataplanes.dp1.capabilities.flogo.provisioned"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn set_refuses_to_descend_through_scalars() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut report = RunReport::open(&temp.path().join("report.json")).expect("open");
        report.set("a.b", 1).expect("set scalar");
        let err = report.set("a.b.c", 2).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn remove_dataplane_retracts_the_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        let mut report = RunReport::open(&path).expect("open");
        report.set_dataplane("dp1").expect("set");
        report.set_dataplane("dp2").expect("set");

        assert!(report.remove_dataplane("dp1").expect("remove"));
        assert!(!report.remove_dataplane("dp1").expect("remove again"));

        let reopened = RunReport::open(&path).expect("reopen");
        assert_eq!(reopened.dataplanes(), vec!["dp2"]);
    }

    #[test]
    fn non_object_report_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        fs::write(&path, "[1, 2]").expect("write");
        let err = RunReport::open(&path).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }
}
