//! Bounded condition polling against a [`Page`].
//!
//! The console renders most state asynchronously, so every "is it there yet"
//! question goes through [`poll_until`]: a warm-up pause, then up to
//! `floor(max_wait / interval)` checks, optionally reloading the page between
//! failed checks. Polls answer with a `bool` and never fail; callers decide
//! whether a negative answer is fatal.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::poll_spec::PollSpec;
use crate::page::{Locator, Page, WaitState};

/// Tick of [`wait_for_success_message`].
pub const MESSAGE_TICK: Duration = Duration::from_millis(500);
/// Page reloads attempted by [`refresh_until_visible`].
pub const REFRESH_ROUNDS: u32 = 3;
/// Poll used by [`click_when_enabled`].
pub const ENABLED_POLL: PollSpec = PollSpec::from_secs(1, 30);

/// Toast shown when the console accepted an action.
pub fn success_notification() -> Locator {
    Locator::css(".notification-message")
}

/// Toast shown when the console rejected an action.
pub fn error_notification() -> Locator {
    Locator::css(".pl-notification--error")
}

/// Poll `condition` until it holds or the poll budget is spent.
///
/// Errors raised by `condition` (element missing, stale, navigation in
/// flight) count as "not yet". No pause or reload follows the last check.
pub fn poll_until<P, F>(page: &P, spec: &PollSpec, mut condition: F) -> bool
where
    P: Page + ?Sized,
    F: FnMut(&P) -> Result<bool>,
{
    if let Err(err) = spec.validate() {
        warn!(error = %err, "invalid poll spec");
        return false;
    }

    page.pause(spec.warmup());
    let attempts = spec.attempts();
    for attempt in 1..=attempts {
        match condition(page) {
            Ok(true) => {
                debug!(attempt, "poll condition met");
                return true;
            }
            Ok(false) => {}
            Err(err) => debug!(attempt, error = %err, "poll condition errored"),
        }
        if attempt == attempts {
            break;
        }
        if spec.refresh_on_stall
            && let Err(err) = refresh_page(page)
        {
            debug!(error = %err, "refresh between checks failed");
        }
        page.pause(spec.interval);
    }

    warn!(
        attempts,
        max_wait = ?spec.max_wait,
        "condition not met within poll budget"
    );
    false
}

/// Poll until `locator` is visible.
pub fn poll_visible<P: Page + ?Sized>(page: &P, locator: &Locator, spec: &PollSpec) -> bool {
    poll_until(page, spec, |p| p.is_visible(locator))
}

/// Reload the current page and wait for the document to finish loading.
pub fn refresh_page<P: Page + ?Sized>(page: &P) -> Result<()> {
    if let Ok(url) = page.url() {
        debug!(url = %url, "reloading page");
    }
    page.reload()?;
    page.wait_for_load()
}

/// Wait up to `timeout` for the console's success notification.
///
/// Returns `false` as soon as an error notification shows up.
pub fn wait_for_success_message<P: Page + ?Sized>(page: &P, timeout: Duration) -> bool {
    let success = success_notification();
    let failure = error_notification();
    let ticks = (timeout.as_millis() / MESSAGE_TICK.as_millis()).max(1);
    for _ in 0..ticks {
        if page.is_visible(&success).unwrap_or(false) {
            info!("success notification shown");
            return true;
        }
        if page.is_visible(&failure).unwrap_or(false) {
            warn!("error notification shown");
            return false;
        }
        page.pause(MESSAGE_TICK);
    }
    warn!(?timeout, "no notification shown");
    false
}

/// Check for `target` once, then reload up to [`REFRESH_ROUNDS`] times,
/// waiting for `ready` to render after each reload before checking again.
pub fn refresh_until_visible<P: Page + ?Sized>(
    page: &P,
    target: &Locator,
    ready: &Locator,
    label: &str,
) -> bool {
    if page.is_visible(target).unwrap_or(false) {
        return true;
    }
    for round in 1..=REFRESH_ROUNDS {
        info!(label, round, "not visible yet, reloading");
        if let Err(err) = refresh_page(page) {
            debug!(label, error = %err, "reload failed");
            continue;
        }
        if let Err(err) = page.wait_for(ready, WaitState::Visible) {
            debug!(label, error = %err, "page content did not render");
        }
        if page.is_visible(target).unwrap_or(false) {
            return true;
        }
    }
    false
}

/// Wait for `locator` to become visible and enabled, then click it.
pub fn click_when_enabled<P: Page + ?Sized>(page: &P, locator: &Locator) -> Result<()> {
    page.wait_for(locator, WaitState::Visible)?;
    if !poll_until(page, &ENABLED_POLL, |p| p.is_enabled(locator)) {
        anyhow::bail!("{locator} did not become enabled");
    }
    page.click(locator)
}
