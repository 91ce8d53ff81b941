//! [`Page`] implementation over the W3C WebDriver protocol.
//!
//! Talks to a WebDriver endpoint (chromedriver) with blocking HTTP calls. One
//! `WebDriverPage` owns one browser session; [`WebDriverPage::quit`] ends it.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::{Locator, Page, WaitState};
use crate::io::config::BrowserConfig;

/// Key under which the protocol returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_TICK: Duration = Duration::from_millis(250);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const LOAD_TIMEOUT: Duration = Duration::from_secs(60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const PARTIAL_DOWNLOAD_EXTENSIONS: [&str; 3] = ["crdownload", "part", "tmp"];

/// Error payload returned by a WebDriver endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDriverError {
    pub status: u16,
    /// W3C error code, e.g. `no such element`.
    pub error: String,
    pub message: String,
}

impl fmt::Display for WebDriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "webdriver error {} ({}): {}",
            self.error, self.status, self.message
        )
    }
}

impl std::error::Error for WebDriverError {}

/// Connection settings for a WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub endpoint: String,
    pub headless: bool,
    pub viewport: (u32, u32),
    pub download_dir: PathBuf,
    pub element_timeout: Duration,
}

impl WebDriverOptions {
    pub fn from_config(cfg: &BrowserConfig) -> Self {
        Self {
            endpoint: cfg.webdriver_url.trim_end_matches('/').to_string(),
            headless: cfg.headless,
            viewport: (cfg.viewport_width, cfg.viewport_height),
            download_dir: cfg.download_dir.clone(),
            element_timeout: Duration::from_secs(cfg.element_timeout_secs),
        }
    }

    /// New-session capabilities: Chrome with insecure certificates accepted
    /// and downloads saved to `download_dir` without prompting.
    pub fn capabilities(&self, download_dir: &Path) -> Value {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.viewport.0, self.viewport.1
        )];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "acceptInsecureCerts": true,
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir.display().to_string(),
                            "download.prompt_for_download": false,
                            "safebrowsing.enabled": true
                        }
                    }
                }
            }
        })
    }
}

/// A browser session driven over WebDriver.
pub struct WebDriverPage {
    client: Client,
    endpoint: String,
    session_id: String,
    download_dir: PathBuf,
    element_timeout: Duration,
}

impl WebDriverPage {
    /// Start a new browser session.
    #[instrument(skip_all, fields(endpoint = %options.endpoint, headless = options.headless))]
    pub fn connect(options: &WebDriverOptions) -> Result<Self> {
        fs::create_dir_all(&options.download_dir).with_context(|| {
            format!("create download dir {}", options.download_dir.display())
        })?;
        let download_dir = std::path::absolute(&options.download_dir).with_context(|| {
            format!("resolve download dir {}", options.download_dir.display())
        })?;

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("build webdriver http client")?;
        let url = format!("{}/session", options.endpoint);
        let response = client
            .post(&url)
            .json(&options.capabilities(&download_dir))
            .send()
            .with_context(|| format!("create webdriver session at {url}"))?;
        let value = decode_response(response)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("webdriver new session response missing sessionId"))?
            .to_string();

        info!(session_id = %session_id, "browser session started");
        Ok(Self {
            client,
            endpoint: options.endpoint.clone(),
            session_id,
            download_dir,
            element_timeout: options.element_timeout,
        })
    }

    /// End the browser session.
    pub fn quit(&self) -> Result<()> {
        debug!(session_id = %self.session_id, "deleting webdriver session");
        self.command(Method::DELETE, "", None)?;
        Ok(())
    }

    fn command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, suffix);
        let mut request = self.client.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }
        let response = request
            .send()
            .with_context(|| format!("webdriver {method} {suffix}"))?;
        decode_response(response).with_context(|| format!("webdriver {method} {suffix}"))
    }

    fn find_in(&self, scope: Option<&str>, selector: &str) -> Result<Vec<String>> {
        let suffix = match scope {
            Some(element) => format!("/element/{element}/elements"),
            None => "/elements".to_string(),
        };
        let value = self.command(
            Method::POST,
            &suffix,
            Some(json!({ "using": "css selector", "value": selector })),
        )?;
        let elements = value
            .as_array()
            .ok_or_else(|| anyhow!("find elements returned a non-array"))?;
        elements
            .iter()
            .map(|element| {
                element
                    .get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("element reference missing {ELEMENT_KEY}"))
            })
            .collect()
    }

    fn resolve(&self, locator: &Locator) -> Result<Vec<String>> {
        self.resolve_in(None, locator)
    }

    /// Resolve `locator` relative to `scope` (the document when `None`).
    fn resolve_in(&self, scope: Option<&str>, locator: &Locator) -> Result<Vec<String>> {
        let roots: Vec<Option<String>> = match locator.parent() {
            Some(parent) => self
                .resolve_in(scope, parent)?
                .into_iter()
                .map(Some)
                .collect(),
            None => vec![scope.map(str::to_string)],
        };

        let mut matches = Vec::new();
        for root in &roots {
            for element in self.find_in(root.as_deref(), locator.selector())? {
                if locator.text_filter().is_some() {
                    let text = self.element_text(&element)?;
                    if !locator.matches_text(&text) {
                        continue;
                    }
                }
                if let Some(inner) = locator.has_filter()
                    && self.resolve_in(Some(element.as_str()), inner)?.is_empty()
                {
                    continue;
                }
                if !matches.contains(&element) {
                    matches.push(element);
                }
            }
        }

        Ok(match locator.index() {
            Some(index) => matches.into_iter().nth(index).into_iter().collect(),
            None => matches,
        })
    }

    fn first(&self, locator: &Locator) -> Result<String> {
        self.resolve(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no element matches {locator}"))
    }

    fn element_text(&self, element: &str) -> Result<String> {
        let value = self.command(Method::GET, &format!("/element/{element}/text"), None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn element_flag(&self, element: &str, flag: &str) -> Result<bool> {
        let value = self.command(Method::GET, &format!("/element/{element}/{flag}"), None)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Poll `check` every tick until it holds or `timeout` elapses.
    fn wait_until<F>(&self, timeout: Duration, what: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            // Elements can go stale between lookup and inspection; retry until the deadline.
            if let Ok(true) = check() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("timed out after {timeout:?} waiting for {what}"));
            }
            thread::sleep(POLL_TICK);
        }
    }

    fn completed_downloads(&self) -> Result<HashSet<PathBuf>> {
        let mut files = HashSet::new();
        for entry in fs::read_dir(&self.download_dir)
            .with_context(|| format!("read {}", self.download_dir.display()))?
        {
            let path = entry.context("read download entry")?.path();
            let partial = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| PARTIAL_DOWNLOAD_EXTENSIONS.contains(&ext));
            if path.is_file() && !partial {
                files.insert(path);
            }
        }
        Ok(files)
    }
}

impl Page for WebDriverPage {
    fn goto(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn url(&self) -> Result<String> {
        let value = self.command(Method::GET, "/url", None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn reload(&self) -> Result<()> {
        self.command(Method::POST, "/refresh", None)?;
        Ok(())
    }

    fn wait_for_load(&self) -> Result<()> {
        self.wait_until(LOAD_TIMEOUT, "document load", || {
            let state = self.command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": "return document.readyState", "args": [] })),
            )?;
            Ok(state.as_str() == Some("complete"))
        })
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.first(locator)?;
        debug!(%locator, "click");
        self.command(Method::POST, &format!("/element/{element}/click"), None)?;
        Ok(())
    }

    fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        let element = self.first(locator)?;
        self.command(Method::POST, &format!("/element/{element}/clear"), None)?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": value })),
        )?;
        Ok(())
    }

    fn is_visible(&self, locator: &Locator) -> Result<bool> {
        match self.resolve(locator)?.first() {
            Some(element) => self.element_flag(element, "displayed"),
            None => Ok(false),
        }
    }

    fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        let element = self.first(locator)?;
        self.element_flag(&element, "enabled")
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.resolve(locator)?.len())
    }

    fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>> {
        self.resolve(locator)?
            .iter()
            .map(|element| self.element_text(element))
            .collect()
    }

    fn wait_for(&self, locator: &Locator, state: WaitState) -> Result<()> {
        let what = format!("{locator} to be {state:?}");
        self.wait_until(self.element_timeout, &what, || match state {
            WaitState::Visible => self.is_visible(locator),
            WaitState::Detached => Ok(self.resolve(locator)?.is_empty()),
        })
    }

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn download(&self, trigger: &Locator, dest: &Path) -> Result<()> {
        let before = self.completed_downloads()?;
        self.click(trigger)?;

        let mut saved = None;
        self.wait_until(DOWNLOAD_TIMEOUT, "download to complete", || {
            saved = self.completed_downloads()?.difference(&before).next().cloned();
            Ok(saved.is_some())
        })?;
        let saved = saved.ok_or_else(|| anyhow!("download from {trigger} not found"))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::copy(&saved, dest)
            .with_context(|| format!("copy {} to {}", saved.display(), dest.display()))?;
        fs::remove_file(&saved).with_context(|| format!("remove {}", saved.display()))?;
        debug!(from = %saved.display(), to = %dest.display(), "download saved");
        Ok(())
    }

    fn screenshot(&self, path: &Path) -> Result<()> {
        let value = self.command(Method::GET, "/screenshot", None)?;
        let encoded = value
            .as_str()
            .ok_or_else(|| anyhow!("screenshot response is not a string"))?;
        let bytes = STANDARD.decode(encoded).context("decode screenshot")?;
        fs::write(path, bytes).with_context(|| format!("write screenshot {}", path.display()))
    }
}

/// Unwrap the `value` member of a WebDriver response, mapping error payloads
/// to [`WebDriverError`].
fn decode_response(response: Response) -> Result<Value> {
    let status = response.status();
    let mut payload: Value = response.json().context("decode webdriver response")?;
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(value);
    }
    Err(parse_error(status.as_u16(), &value).into())
}

fn parse_error(status: u16, value: &Value) -> WebDriverError {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    WebDriverError {
        status,
        error: field("error"),
        message: field("message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_request_headless_chrome_with_downloads() {
        let options = WebDriverOptions::from_config(&BrowserConfig::default());
        assert_eq!(options.endpoint, "http://localhost:9515");
        let caps = options.capabilities(Path::new("/tmp/downloads"));
        let chrome = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"];
        let args: Vec<&str> = chrome["args"]
            .as_array()
            .expect("args")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(args.contains(&"--headless=new"));
        assert!(args.contains(&"--window-size=2000,1080"));
        assert_eq!(
            chrome["prefs"]["download.default_directory"],
            Value::String("/tmp/downloads".to_string())
        );
        assert_eq!(
            caps["capabilities"]["alwaysMatch"]["acceptInsecureCerts"],
            Value::Bool(true)
        );
    }

    #[test]
    fn headed_sessions_omit_headless_flag() {
        let mut cfg = BrowserConfig::default();
        cfg.headless = false;
        cfg.webdriver_url = "http://grid:4444/".to_string();
        let options = WebDriverOptions::from_config(&cfg);
        assert_eq!(options.endpoint, "http://grid:4444");
        let caps = options.capabilities(Path::new("/d"));
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .expect("args")
            .clone();
        assert!(!args.contains(&Value::String("--headless=new".to_string())));
    }

    #[test]
    fn error_payload_maps_to_webdriver_error() {
        let value = json!({ "error": "no such element", "message": "missing", "stacktrace": "" });
        let err = parse_error(404, &value);
        assert_eq!(err.error, "no such element");
        assert_eq!(err.message, "missing");
        assert_eq!(
            err.to_string(),
            "webdriver error no such element (404): missing"
        );
    }
}
