//! Process exit gate.
//!
//! Every unrecoverable condition funnels through [`exit_error`]: capture a
//! screenshot of the page, log the message, and hand back a [`FatalError`]
//! that `main` turns into exit code 1 after closing the browser session.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, warn};

use crate::core::naming::{error_screenshot_name, warning_screenshot_name};
use crate::exit_codes;
use crate::io::artifacts::ArtifactPaths;
use crate::page::Page;

/// A run aborted on purpose. The message is already logged when this is
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub message: String,
    /// Screenshot captured at the moment of failure, when one could be taken.
    pub screenshot: Option<PathBuf>,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FatalError {}

/// Capture `error-{context}.png`, log `message`, and return the fatal error
/// to propagate.
pub fn exit_error<P: Page + ?Sized>(
    page: &P,
    artifacts: &ArtifactPaths,
    message: impl Into<String>,
    context: &str,
) -> anyhow::Error {
    let message = message.into();
    let screenshot = capture(page, artifacts, &error_screenshot_name(context));
    error!(
        context,
        screenshot = ?screenshot.as_ref().map(|p| p.display().to_string()),
        "{message}"
    );
    FatalError {
        message,
        screenshot,
    }
    .into()
}

/// Send an error that escaped a workflow through the gate, so it also leaves
/// `error-{context}.png` behind. Errors that already passed the gate are
/// returned unchanged.
pub fn into_fatal<P: Page + ?Sized>(
    page: &P,
    artifacts: &ArtifactPaths,
    err: anyhow::Error,
    context: &str,
) -> anyhow::Error {
    if is_fatal(&err) {
        return err;
    }
    exit_error(page, artifacts, format!("{err:#}"), context)
}

/// Capture `warning-{context}.png` for a non-fatal diagnostic.
pub fn warning_screenshot<P: Page + ?Sized>(
    page: &P,
    artifacts: &ArtifactPaths,
    context: &str,
) -> Option<PathBuf> {
    let path = capture(page, artifacts, &warning_screenshot_name(context));
    if let Some(path) = &path {
        warn!(context, screenshot = %path.display(), "warning screenshot captured");
    }
    path
}

pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<FatalError>().is_some()
}

/// Map a command result to a process exit code.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => exit_codes::OK,
        Err(_) => exit_codes::FATAL,
    }
}

fn capture<P: Page + ?Sized>(page: &P, artifacts: &ArtifactPaths, name: &str) -> Option<PathBuf> {
    let path = match artifacts.screenshot_path(name) {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, "cannot prepare screenshot directory");
            return None;
        }
    };
    match page.screenshot(&path) {
        Ok(()) => Some(path),
        Err(err) => {
            warn!(error = %err, name, "screenshot failed");
            None
        }
    }
}
