//! Stable exit codes for the reviewer CLI.
//!
//! "Max passes reached" and "stopped without edits" are reported as warnings
//! and still exit with [`OK`].

/// The run finished (clean or with a non-fatal "issues may remain" notice).
pub const OK: i32 = 0;
/// Invalid configuration: bad flags, config file, skill file, or empty prompt.
pub const INVALID: i32 = 1;
/// The agent engine failed (spawn, stream I/O, timeout, non-zero exit).
pub const ENGINE: i32 = 2;
