//! Browser session lifecycle.

use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::io::config::HarnessConfig;
use crate::page::webdriver::{WebDriverOptions, WebDriverPage};

/// One browser session for the lifetime of a CLI command.
///
/// Dropping an open session closes it on a best-effort basis.
pub struct Session {
    page: WebDriverPage,
    started: Instant,
    closed: bool,
}

impl Session {
    pub fn open(config: &HarnessConfig) -> Result<Self> {
        let started = Instant::now();
        let page = WebDriverPage::connect(&WebDriverOptions::from_config(&config.browser))?;
        info!(outcome = "success", "browser launched");
        Ok(Self {
            page,
            started,
            closed: false,
        })
    }

    pub fn page(&self) -> &WebDriverPage {
        &self.page
    }

    /// Quit the browser and log the total running time.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.page.quit();
        if result.is_ok() {
            info!(outcome = "success", "browser closed");
        }
        info!(
            elapsed_secs = %format!("{:.2}", self.started.elapsed().as_secs_f64()),
            now = %chrono::Local::now().format("%m/%d/%Y %H:%M:%S"),
            "total running time"
        );
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "browser session did not close cleanly");
        }
    }
}
