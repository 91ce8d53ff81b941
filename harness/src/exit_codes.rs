//! Stable exit codes for harness CLI commands.

/// Command completed and every milestone it touched was recorded.
pub const OK: i32 = 0;
/// Command aborted through the exit gate, or failed before reaching the console.
pub const FATAL: i32 = 1;
