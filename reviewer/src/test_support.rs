//! Test-only helpers: scripted engines, recording renderers, pass fixtures.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::core::types::PassResult;
use crate::engine::event::{Block, Event};
use crate::engine::{Engine, EngineConfig, EventStream, PermissionMode};
use crate::error::EngineError;
use crate::pass::PassRunner;
use crate::render::Renderer;

/// Events for one engine call, optionally ending in a transport failure.
#[derive(Debug, Clone)]
pub struct Script {
    pub events: Vec<Event>,
    pub failure: Option<String>,
}

/// Engine that replays one [`Script`] per call and records submitted prompts.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: RefCell<VecDeque<Script>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(calls: Vec<Vec<Event>>) -> Self {
        Self::from_scripts(
            calls
                .into_iter()
                .map(|events| Script {
                    events,
                    failure: None,
                })
                .collect(),
        )
    }

    /// Single call that yields `events` and then fails with `message`.
    pub fn with_failure(events: Vec<Event>, message: &str) -> Self {
        Self::from_scripts(vec![Script {
            events,
            failure: Some(message.to_string()),
        }])
    }

    pub fn from_scripts(scripts: Vec<Script>) -> Self {
        Self {
            scripts: RefCell::new(scripts.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts submitted so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Engine for ScriptedEngine {
    fn submit(&self, prompt: &str, _config: &EngineConfig) -> Result<EventStream> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let script = self
            .scripts
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| EngineError::new("no scripted engine call left"))?;
        let failure: Option<Result<Event>> = script
            .failure
            .map(|message| Err(EngineError::new(message).into()));
        Ok(Box::new(script.events.into_iter().map(Ok).chain(failure)))
    }
}

/// Renderer that keeps every event; optionally fails after recording.
#[derive(Default)]
pub struct RecordingRenderer {
    pub events: Vec<Event>,
    fail: bool,
}

impl RecordingRenderer {
    pub fn failing() -> Self {
        Self {
            events: Vec::new(),
            fail: true,
        }
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, event: &Event) -> Result<()> {
        self.events.push(event.clone());
        if self.fail {
            return Err(anyhow!("terminal closed"));
        }
        Ok(())
    }
}

/// Pass runner that returns predetermined results and records prompts.
pub struct ScriptedPasses {
    results: VecDeque<Result<PassResult, String>>,
    pub prompts: Vec<String>,
}

impl ScriptedPasses {
    pub fn new(results: Vec<PassResult>) -> Self {
        Self {
            results: results.into_iter().map(Ok).collect(),
            prompts: Vec::new(),
        }
    }

    /// Results followed by an engine failure on the next call.
    pub fn failing_after(results: Vec<PassResult>, message: &str) -> Self {
        let mut passes = Self::new(results);
        passes.results.push_back(Err(message.to_string()));
        passes
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }
}

impl PassRunner for ScriptedPasses {
    fn run_pass(&mut self, prompt: &str) -> Result<PassResult> {
        self.prompts.push(prompt.to_string());
        match self.results.pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(EngineError::new(message).into()),
            None => Err(anyhow!("unexpected pass {}", self.prompts.len())),
        }
    }
}

/// Pass result with `edit_count` edits spread over `files` and a transcript.
pub fn pass_result(edit_count: u32, files: &[&str], last_text: &str) -> PassResult {
    PassResult {
        last_text: last_text.to_string(),
        edit_count,
        edited_files: files.iter().map(|file| file.to_string()).collect::<BTreeSet<_>>(),
    }
}

/// A mutating tool invocation targeting `path`.
pub fn edit_block(tool: &str, path: &str) -> Block {
    Block::tool_use(tool, json!({ "file_path": path }))
}

/// Deterministic engine config for tests.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        model: None,
        allowed_tools: vec!["Read".to_string(), "Edit".to_string(), "Write".to_string()],
        permission_mode: PermissionMode::AcceptEdits,
        max_turns: None,
        working_directory: None,
        system_prompt_append: String::new(),
    }
}
