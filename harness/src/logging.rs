//! Console logging for harness runs.
//!
//! Every state transition of a workflow emits a leveled `tracing` event.
//! Successful milestones are `info` events carrying `outcome = "success"`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `harness=info,warn` so workflow progress is
/// visible while dependency noise stays quiet.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=harness=debug harness create-dataplane dp1
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harness=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
