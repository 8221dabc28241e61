//! One request/response cycle against the agent engine.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::edits::EditTracker;
use crate::core::sanitize::sanitize_prompt;
use crate::core::types::PassResult;
use crate::engine::{Engine, EngineConfig};
use crate::error::ConfigError;
use crate::render::Renderer;

/// Anything that can run a single pass for the loop controller.
pub trait PassRunner {
    fn run_pass(&mut self, prompt: &str) -> Result<PassResult>;
}

/// Runs passes against an [`Engine`], rendering every event.
pub struct PassExecutor<'a, E: Engine, R: Renderer> {
    engine: &'a E,
    renderer: &'a mut R,
    tracker: EditTracker,
    config: EngineConfig,
}

impl<'a, E: Engine, R: Renderer> PassExecutor<'a, E, R> {
    pub fn new(engine: &'a E, renderer: &'a mut R, tracker: EditTracker, config: EngineConfig) -> Self {
        Self {
            engine,
            renderer,
            tracker,
            config,
        }
    }
}

impl<E: Engine, R: Renderer> PassRunner for PassExecutor<'_, E, R> {
    fn run_pass(&mut self, prompt: &str) -> Result<PassResult> {
        execute_pass(self.engine, self.renderer, &self.tracker, prompt, &self.config)
    }
}

/// Submit `prompt`, drain the event stream in order, and aggregate the result.
///
/// Fails with [`ConfigError`] when the prompt is empty after sanitization,
/// before the engine is called. Engine errors propagate unchanged; render
/// errors are logged and skipped.
#[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
pub fn execute_pass<E: Engine, R: Renderer>(
    engine: &E,
    renderer: &mut R,
    tracker: &EditTracker,
    prompt: &str,
    config: &EngineConfig,
) -> Result<PassResult> {
    let prompt = sanitize_prompt(prompt);
    if prompt.trim().is_empty() {
        return Err(ConfigError::new("prompt is empty after removing control characters").into());
    }

    let mut last_text = String::new();
    let mut edit_count = 0u32;
    let mut edited_files = BTreeSet::new();
    let mut events = 0usize;

    for event in engine.submit(&prompt, config)? {
        let event = event?;
        events += 1;
        edit_count += tracker.observe(&event, &mut edited_files);
        if let Err(err) = renderer.render(&event) {
            warn!(err = %err, "failed to render event");
        }
        if let Some(text) = event.texts().last() {
            last_text = text.to_string();
        }
    }

    debug!(events, "engine stream drained");
    info!(edit_count, files = edited_files.len(), "pass finished");
    Ok(PassResult {
        last_text,
        edit_count,
        edited_files,
    })
}
