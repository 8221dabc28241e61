//! I/O helpers for the reviewer CLI.

pub mod config;
pub mod skill;
