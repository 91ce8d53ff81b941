//! Test-only fakes: a scripted [`Page`], a recording [`ShellRunner`], and a
//! temp-dir fixture with a ready-to-use config.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::artifacts::ArtifactPaths;
use crate::io::config::HarnessConfig;
use crate::io::run_report::RunReport;
use crate::io::shell::{ScriptOutcome, ScriptRequest, ShellRunner};
use crate::page::{Locator, Page, WaitState};

/// Everything a [`ScriptedPage`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Goto(String),
    Reload,
    Click(String),
    Fill(String, String),
    Download(String, PathBuf),
    Screenshot(PathBuf),
    Pause(Duration),
}

#[derive(Debug, Clone)]
enum Visibility {
    Always(bool),
    /// Consumed one value per probe; the last value repeats.
    Sequence(VecDeque<bool>),
}

impl Visibility {
    fn next(&mut self) -> bool {
        match self {
            Self::Always(visible) => *visible,
            Self::Sequence(values) => {
                if values.len() > 1 {
                    values.pop_front().unwrap_or(false)
                } else {
                    values.front().copied().unwrap_or(false)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    visibility: HashMap<String, Visibility>,
    counts: HashMap<String, usize>,
    texts: HashMap<String, Vec<String>>,
    disabled: HashSet<String>,
    absent: HashSet<String>,
    visibility_checks: HashMap<String, usize>,
    actions: Vec<PageAction>,
}

/// In-memory [`Page`] whose answers are scripted per locator.
///
/// Locators are keyed by their `Display` form. Unscripted locators are not
/// visible to `is_visible`, but `wait_for` and `click` succeed on them so
/// flows can progress without scripting every element.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    state: RefCell<PageState>,
    fail_all: bool,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page where every fallible operation errors.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn with_visible(self, locator: &Locator, visible: bool) -> Self {
        self.state
            .borrow_mut()
            .visibility
            .insert(locator.to_string(), Visibility::Always(visible));
        self
    }

    pub fn with_visibility_sequence(self, locator: &Locator, values: Vec<bool>) -> Self {
        self.state
            .borrow_mut()
            .visibility
            .insert(locator.to_string(), Visibility::Sequence(values.into()));
        self
    }

    pub fn with_count(self, locator: &Locator, count: usize) -> Self {
        self.state
            .borrow_mut()
            .counts
            .insert(locator.to_string(), count);
        self
    }

    pub fn with_texts(self, locator: &Locator, texts: &[&str]) -> Self {
        self.state.borrow_mut().texts.insert(
            locator.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_disabled(self, locator: &Locator) -> Self {
        self.state.borrow_mut().disabled.insert(locator.to_string());
        self
    }

    /// Make `wait_for` and `click` fail for `locator`.
    pub fn with_absent(self, locator: &Locator) -> Self {
        self.state.borrow_mut().absent.insert(locator.to_string());
        self
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.state.borrow().actions.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                PageAction::Click(target) => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn clicks_on(&self, locator: &Locator) -> usize {
        let key = locator.to_string();
        self.clicks().iter().filter(|c| **c == key).count()
    }

    pub fn reloads(&self) -> usize {
        self.actions()
            .iter()
            .filter(|action| **action == PageAction::Reload)
            .count()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                PageAction::Pause(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                PageAction::Download(trigger, dest) => Some((trigger, dest)),
                _ => None,
            })
            .collect()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                PageAction::Screenshot(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_checks(&self, locator: &Locator) -> usize {
        self.state
            .borrow()
            .visibility_checks
            .get(&locator.to_string())
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, action: PageAction) {
        self.state.borrow_mut().actions.push(action);
    }

    fn check_available(&self, op: &str) -> Result<()> {
        if self.fail_all {
            return Err(anyhow!("scripted page failure during {op}"));
        }
        Ok(())
    }

    fn check_present(&self, locator: &Locator) -> Result<()> {
        if self.state.borrow().absent.contains(&locator.to_string()) {
            return Err(anyhow!("no element matches {locator}"));
        }
        Ok(())
    }
}

impl Page for ScriptedPage {
    fn goto(&self, url: &str) -> Result<()> {
        self.check_available("goto")?;
        self.state.borrow_mut().url = url.to_string();
        self.record(PageAction::Goto(url.to_string()));
        Ok(())
    }

    fn url(&self) -> Result<String> {
        self.check_available("url")?;
        Ok(self.state.borrow().url.clone())
    }

    fn reload(&self) -> Result<()> {
        self.check_available("reload")?;
        self.record(PageAction::Reload);
        Ok(())
    }

    fn wait_for_load(&self) -> Result<()> {
        self.check_available("wait_for_load")
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        self.check_available("click")?;
        self.check_present(locator)?;
        self.record(PageAction::Click(locator.to_string()));
        Ok(())
    }

    fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.check_available("fill")?;
        self.check_present(locator)?;
        self.record(PageAction::Fill(locator.to_string(), value.to_string()));
        Ok(())
    }

    fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let key = locator.to_string();
        let mut state = self.state.borrow_mut();
        *state.visibility_checks.entry(key.clone()).or_insert(0) += 1;
        if self.fail_all {
            return Err(anyhow!("scripted page failure during is_visible"));
        }
        Ok(state
            .visibility
            .get_mut(&key)
            .map(Visibility::next)
            .unwrap_or(false))
    }

    fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        self.check_available("is_enabled")?;
        Ok(!self.state.borrow().disabled.contains(&locator.to_string()))
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        self.check_available("count")?;
        Ok(self
            .state
            .borrow()
            .counts
            .get(&locator.to_string())
            .copied()
            .unwrap_or(0))
    }

    fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>> {
        self.check_available("all_text_contents")?;
        Ok(self
            .state
            .borrow()
            .texts
            .get(&locator.to_string())
            .cloned()
            .unwrap_or_default())
    }

    fn wait_for(&self, locator: &Locator, state: WaitState) -> Result<()> {
        self.check_available("wait_for")?;
        if state == WaitState::Detached {
            return Ok(());
        }
        self.check_present(locator)?;
        let key = locator.to_string();
        let visible = self
            .state
            .borrow_mut()
            .visibility
            .get_mut(&key)
            .map(Visibility::next)
            .unwrap_or(true);
        if visible {
            Ok(())
        } else {
            Err(anyhow!("timed out waiting for {locator} to be visible"))
        }
    }

    fn pause(&self, duration: Duration) {
        self.record(PageAction::Pause(duration));
    }

    fn download(&self, trigger: &Locator, dest: &Path) -> Result<()> {
        self.check_available("download")?;
        self.check_present(trigger)?;
        fs::write(dest, format!("#!/bin/sh\necho '{trigger}'\n"))?;
        self.record(PageAction::Download(trigger.to_string(), dest.to_path_buf()));
        Ok(())
    }

    fn screenshot(&self, path: &Path) -> Result<()> {
        self.check_available("screenshot")?;
        fs::write(path, b"png")?;
        self.record(PageAction::Screenshot(path.to_path_buf()));
        Ok(())
    }
}

/// [`ShellRunner`] that records every script and returns a fixed outcome.
#[derive(Debug)]
pub struct RecordingShell {
    outcome: ScriptOutcome,
    runs: RefCell<Vec<PathBuf>>,
}

impl Default for RecordingShell {
    fn default() -> Self {
        Self::with_outcome(ScriptOutcome::Succeeded)
    }
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(outcome: ScriptOutcome) -> Self {
        Self {
            outcome,
            runs: RefCell::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<PathBuf> {
        self.runs.borrow().clone()
    }

    /// File names of the scripts that ran, in order.
    pub fn run_names(&self) -> Vec<String> {
        self.runs()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

impl ShellRunner for RecordingShell {
    fn run(&self, request: &ScriptRequest) -> Result<ScriptOutcome> {
        self.runs.borrow_mut().push(request.script_path.clone());
        Ok(self.outcome)
    }
}

/// Temp directory with a config whose report root and download directory
/// live inside it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: HarnessConfig,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = HarnessConfig::default();
        config.report.root = dir.path().join("report");
        config.browser.download_dir = dir.path().join("downloads");
        config.console.url = "https://console.test".to_string();
        Ok(Self { dir, config })
    }

    pub fn artifacts(&self) -> ArtifactPaths {
        ArtifactPaths::from_config(&self.config)
    }

    pub fn open_report(&self) -> Result<RunReport> {
        RunReport::open(&self.artifacts().report_path)
    }
}
