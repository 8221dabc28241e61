//! Distinguishable error kinds carried inside `anyhow::Error`.
//!
//! Callers recover the kind with `err.downcast_ref::<ConfigError>()` or
//! `err.downcast_ref::<EngineError>()`. Anything else is an internal failure.

use std::fmt;

/// Invalid input detected before any engine call. Never retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Transport or protocol failure of the agent engine.
///
/// Fatal to the current run. The loop controller never retries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent engine failed: {}", self.message)
    }
}

impl std::error::Error for EngineError {}

/// Map an error chain to a stable exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<EngineError>().is_some() {
        crate::exit_codes::ENGINE
    } else {
        crate::exit_codes::INVALID
    }
}
