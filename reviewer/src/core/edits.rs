//! Counting mutating tool invocations in the engine's event stream.

use std::collections::BTreeSet;

use crate::engine::event::{Block, Event};

/// Default tool names whose invocations create or modify files.
pub const DEFAULT_MUTATING_TOOLS: [&str; 2] = ["Write", "Edit"];
/// Default input field carrying the target path.
pub const DEFAULT_PATH_FIELD: &str = "file_path";

/// Recognizes mutating tool invocations and extracts the paths they touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTracker {
    tool_names: Vec<String>,
    path_field: String,
}

impl Default for EditTracker {
    fn default() -> Self {
        Self::new(
            DEFAULT_MUTATING_TOOLS.iter().map(|name| name.to_string()).collect(),
            DEFAULT_PATH_FIELD,
        )
    }
}

impl EditTracker {
    pub fn new(tool_names: Vec<String>, path_field: impl Into<String>) -> Self {
        Self {
            tool_names,
            path_field: path_field.into(),
        }
    }

    /// Count mutating invocations in `event`, recording their paths in `edited`.
    ///
    /// Only assistant turns carry tool invocations; every other event counts
    /// zero. A block without a usable path still counts as an edit.
    pub fn observe(&self, event: &Event, edited: &mut BTreeSet<String>) -> u32 {
        let mut count = 0;
        for block in event.blocks() {
            let Block::ToolUse { name, input } = block else {
                continue;
            };
            if !self.is_mutating(name) {
                continue;
            }
            count += 1;
            if let Some(path) = input
                .get(&self.path_field)
                .and_then(|value| value.as_str())
                .filter(|path| !path.is_empty())
            {
                edited.insert(path.to_string());
            }
        }
        count
    }

    fn is_mutating(&self, name: &str) -> bool {
        self.tool_names.iter().any(|tool| tool == name)
    }
}
