//! Bounded review → fix → re-review loop around an external coding agent.
//!
//! The crate drives an agent CLI through repeated passes until it declares a
//! clean state or the pass budget runs out. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (status extraction, edit tracking,
//!   shared types). No I/O, fully testable in isolation.
//! - **[`engine`]**: The agent engine boundary. The [`engine::Engine`] trait
//!   hides the actual agent process so tests can script event streams.
//! - **[`io`]**: Side-effecting helpers (config file, skill text loading).
//!
//! Orchestration modules ([`pass`], [`looping`]) combine the two to implement a
//! single pass and the recursive fix loop. [`render`] prints events for humans.

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod pass;
pub mod prompt;
pub mod render;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
