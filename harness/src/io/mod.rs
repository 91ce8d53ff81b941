//! I/O helpers for harness commands.

pub mod artifacts;
pub mod config;
pub mod process;
pub mod run_report;
pub mod shell;
