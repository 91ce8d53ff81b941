//! Browser driver seam.
//!
//! The [`Page`] trait is the only way orchestration code touches the browser.
//! [`webdriver::WebDriverPage`] drives a real browser over the W3C WebDriver
//! protocol; tests use a scripted page that records every action.

pub mod locator;
pub mod webdriver;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

pub use locator::Locator;

/// Element state awaited by [`Page::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Detached,
}

/// One browser page.
///
/// Not safe to drive from more than one logical flow at a time; every
/// workflow in this crate is strictly sequential.
pub trait Page {
    fn goto(&self, url: &str) -> Result<()>;
    fn url(&self) -> Result<String>;
    fn reload(&self) -> Result<()>;
    /// Block until the document finished loading.
    fn wait_for_load(&self) -> Result<()>;
    fn click(&self, locator: &Locator) -> Result<()>;
    /// Replace the value of an input.
    fn fill(&self, locator: &Locator, value: &str) -> Result<()>;
    /// Non-blocking probe of the first match.
    fn is_visible(&self, locator: &Locator) -> Result<bool>;
    fn is_enabled(&self, locator: &Locator) -> Result<bool>;
    fn count(&self, locator: &Locator) -> Result<usize>;
    /// Text of every match, in document order.
    fn all_text_contents(&self, locator: &Locator) -> Result<Vec<String>>;
    /// Block until the locator reaches `state`, bounded by the driver's
    /// element timeout.
    fn wait_for(&self, locator: &Locator, state: WaitState) -> Result<()>;
    /// Timed wait. The only suspension point that is not tied to page state.
    fn pause(&self, duration: Duration);
    /// Click `trigger` and save the download it starts to `dest`.
    fn download(&self, trigger: &Locator, dest: &Path) -> Result<()>;
    fn screenshot(&self, path: &Path) -> Result<()>;
}
