//! Harness configuration stored in `harness.toml`, with `HARNESS_*`
//! environment overrides on top.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::retry::DEFAULT_MAX_ATTEMPTS;

/// Harness configuration (TOML).
///
/// Missing fields default to values that target a local chromedriver and a
/// report directory under `.harness/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub console: ConsoleConfig,
    pub browser: BrowserConfig,
    pub report: ReportConfig,
    pub dataplane: DataPlaneConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Console URL opened when a session starts.
    pub url: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    /// W3C WebDriver endpoint (e.g. chromedriver).
    pub webdriver_url: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Directory the browser saves downloads into before they are moved.
    pub download_dir: PathBuf,
    /// Upper bound for blocking element waits.
    pub element_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            viewport_width: 2000,
            viewport_height: 1080,
            download_dir: PathBuf::from(".harness/downloads"),
            element_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Root directory for the run report, screenshots and command files.
    pub root: PathBuf,
    /// Run report file name under `root`.
    pub file: String,
    /// Attempt folder that screenshots of this run are grouped under.
    pub attempt: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".harness/report"),
            file: "report.json".to_string(),
            attempt: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DataPlaneConfig {
    pub namespace: String,
    pub service_account: String,
    /// Creation aborts when the console already lists more data planes.
    pub max_data_planes: u32,
    /// Creation attempts before the run is aborted.
    pub max_create_attempts: u32,
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            namespace: "dataplane-ns".to_string(),
            service_account: "dataplane-sa".to_string(),
            max_data_planes: 50,
            max_create_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Interpreter argv; the downloaded script path is appended.
    pub interpreter: Vec<String>,
    /// Wall-clock budget for a single script.
    pub timeout_secs: u64,
    /// Truncate script stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Delay after each script before the next step.
    pub settle_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["bash".to_string()],
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
            settle_secs: 3,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.console.url.trim().is_empty() {
            return Err(anyhow!("console.url must not be empty"));
        }
        if self.browser.webdriver_url.trim().is_empty() {
            return Err(anyhow!("browser.webdriver_url must not be empty"));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(anyhow!("browser viewport must be > 0"));
        }
        if self.browser.element_timeout_secs == 0 {
            return Err(anyhow!("browser.element_timeout_secs must be > 0"));
        }
        if self.report.file.trim().is_empty() {
            return Err(anyhow!("report.file must not be empty"));
        }
        if self.dataplane.namespace.trim().is_empty() {
            return Err(anyhow!("dataplane.namespace must not be empty"));
        }
        if self.dataplane.service_account.trim().is_empty() {
            return Err(anyhow!("dataplane.service_account must not be empty"));
        }
        if self.dataplane.max_create_attempts == 0 {
            return Err(anyhow!("dataplane.max_create_attempts must be > 0"));
        }
        if self.commands.interpreter.is_empty() || self.commands.interpreter[0].trim().is_empty()
        {
            return Err(anyhow!("commands.interpreter must be a non-empty array"));
        }
        if self.commands.timeout_secs == 0 {
            return Err(anyhow!("commands.timeout_secs must be > 0"));
        }
        if self.commands.output_limit_bytes == 0 {
            return Err(anyhow!("commands.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from `path` and apply `HARNESS_*` overrides from the process
/// environment.
pub fn load_config_with_env(path: &Path) -> Result<HarnessConfig> {
    let cfg = load_config(path)?;
    apply_env_overrides(cfg, |key| std::env::var(key).ok())
}

/// Apply `HARNESS_*` overrides resolved through `lookup`.
pub fn apply_env_overrides<F>(mut cfg: HarnessConfig, lookup: F) -> Result<HarnessConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("HARNESS_CONSOLE_URL") {
        cfg.console.url = url;
    }
    if let Some(url) = lookup("HARNESS_WEBDRIVER_URL") {
        cfg.browser.webdriver_url = url;
    }
    if let Some(raw) = lookup("HARNESS_HEADLESS") {
        cfg.browser.headless = parse_bool("HARNESS_HEADLESS", &raw)?;
    }
    if let Some(root) = lookup("HARNESS_REPORT_ROOT") {
        cfg.report.root = PathBuf::from(root);
    }
    if let Some(raw) = lookup("HARNESS_ATTEMPT") {
        cfg.report.attempt = raw
            .trim()
            .parse()
            .with_context(|| format!("parse HARNESS_ATTEMPT '{raw}'"))?;
    }
    if let Some(namespace) = lookup("HARNESS_DP_NAMESPACE") {
        cfg.dataplane.namespace = namespace;
    }
    if let Some(service_account) = lookup("HARNESS_DP_SERVICE_ACCOUNT") {
        cfg.dataplane.service_account = service_account;
    }
    if let Some(raw) = lookup("HARNESS_MAX_DATA_PLANES") {
        cfg.dataplane.max_data_planes = raw
            .trim()
            .parse()
            .with_context(|| format!("parse HARNESS_MAX_DATA_PLANES '{raw}'"))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("{key} must be a boolean (got '{other}')")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, HarnessConfig::default());
        assert_eq!(cfg.dataplane.max_data_planes, 50);
        assert_eq!(cfg.dataplane.max_create_attempts, 3);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness.toml");
        fs::write(&path, "[dataplane]\nmax_data_planes = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.dataplane.max_data_planes, 5);
        assert_eq!(cfg.dataplane.namespace, "dataplane-ns");
        assert_eq!(cfg.commands.settle_secs, 3);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("harness.toml");
        fs::write(&path, "[commands]\ninterpreter = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("commands.interpreter"));
    }

    #[test]
    fn env_overrides_apply_on_top_of_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HARNESS_HEADLESS", "false"),
            ("HARNESS_MAX_DATA_PLANES", "7"),
            ("HARNESS_DP_NAMESPACE", "env-ns"),
            ("HARNESS_ATTEMPT", "2"),
        ]);
        let cfg = apply_env_overrides(HarnessConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .expect("overrides");
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.dataplane.max_data_planes, 7);
        assert_eq!(cfg.dataplane.namespace, "env-ns");
        assert_eq!(cfg.report.attempt, 2);
        assert_eq!(cfg.console.url, "https://localhost");
    }

    #[test]
    fn env_overrides_reject_malformed_values() {
        let err = apply_env_overrides(HarnessConfig::default(), |key| {
            (key == "HARNESS_HEADLESS").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("HARNESS_HEADLESS"));

        let err = apply_env_overrides(HarnessConfig::default(), |key| {
            (key == "HARNESS_DP_NAMESPACE").then(|| "  ".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("dataplane.namespace"));
    }
}
