//! Deterministic, pure logic shared by the harness.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod naming;
pub mod poll_spec;
pub mod report_path;
pub mod retry;
pub mod wizard;
