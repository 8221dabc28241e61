//! Deterministic, pure logic shared by the reviewer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod edits;
pub mod sanitize;
pub mod status;
pub mod types;
