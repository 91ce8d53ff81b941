//! Browser-driven end-to-end harness for provisioning data planes through the
//! control-plane web console.
//!
//! The harness registers a data plane, downloads the generated bootstrap
//! command files, runs them against the target cluster and polls the console
//! until the new resource converges. Progress is recorded in a run report so a
//! re-run resumes instead of repeating expensive steps. The architecture keeps
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (poll arithmetic, retry
//!   bookkeeping, report paths, artifact names). No I/O.
//! - **[`io`]**: Side-effecting operations (configuration, run report,
//!   artifacts, script execution).
//! - **[`page`]**: The browser driver seam and its WebDriver implementation.
//!
//! Orchestration modules ([`poll`], [`dataplane`], [`gate`], [`session`],
//! [`command`]) compose driver actions with the run report to implement CLI
//! commands.

pub mod command;
pub mod core;
pub mod dataplane;
pub mod exit_codes;
pub mod gate;
pub mod io;
pub mod logging;
pub mod page;
pub mod poll;
pub mod session;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
