//! Shared deterministic types for the pass executor and loop controller.

use std::collections::BTreeSet;

/// Aggregated outcome of a single pass against the agent engine.
///
/// Built fresh for every pass and never mutated after it is returned. The loop
/// controller reads it to decide the next prompt and then drops it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResult {
    /// Most recent non-empty text block the agent emitted; empty if none.
    pub last_text: String,
    /// Number of mutating tool invocations observed.
    pub edit_count: u32,
    /// Distinct file paths referenced by those invocations.
    pub edited_files: BTreeSet<String>,
}

impl PassResult {
    pub fn made_edits(&self) -> bool {
        self.edit_count > 0
    }
}
