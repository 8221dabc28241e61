//! Agent engine abstraction.
//!
//! The [`Engine`] trait decouples pass execution from the actual agent backend
//! (currently an agent CLI streaming JSON lines, see [`cli::CliEngine`]). Tests
//! use scripted engines that replay predetermined events without spawning
//! processes.

pub mod cli;
pub mod event;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

use crate::engine::event::Event;

/// Ordered, finite sequence of events produced by one engine call.
///
/// Pulling the next item blocks until the engine emits it. An `Err` item is a
/// transport failure; consumers stop at the first one.
pub type EventStream = Box<dyn Iterator<Item = Result<Event>>>;

/// Tool permission policy handed to the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
}

impl PermissionMode {
    /// Wire value understood by the agent CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Model identifier; `None` leaves the agent's default.
    pub model: Option<String>,
    /// Tools the agent may call.
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    /// Upper bound on agent turns within one call.
    pub max_turns: Option<u32>,
    /// Directory the agent operates in; `None` inherits the current one.
    pub working_directory: Option<PathBuf>,
    /// Text appended to the agent's system prompt.
    pub system_prompt_append: String,
}

/// Abstraction over agent execution backends.
pub trait Engine {
    /// Submit `prompt` and return the event stream for this call.
    ///
    /// Errors returned here, or yielded by the stream, should be
    /// [`crate::error::EngineError`] so callers can tell them apart.
    fn submit(&self, prompt: &str, config: &EngineConfig) -> Result<EventStream>;
}
