//! Reviewer configuration stored in `.reviewer/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::edits::{DEFAULT_MUTATING_TOOLS, DEFAULT_PATH_FIELD, EditTracker};
use crate::engine::{EngineConfig, PermissionMode};
use crate::error::ConfigError;
use crate::looping::{DEFAULT_MAX_PASSES, validate_max_passes};
use crate::prompt::system_prompt_append;

/// Config path relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".reviewer/config.toml";

/// Reviewer configuration (TOML).
///
/// Edited by humans. Missing fields fall back to defaults; CLI flags
/// override what is loaded here.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewerConfig {
    pub agent: AgentConfig,
    #[serde(rename = "loop")]
    pub fix_loop: LoopConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent program and leading arguments (e.g. `["claude"]`).
    pub command: Vec<String>,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub max_turns: Option<u32>,
    /// Wall-clock budget for one pass, in seconds.
    pub pass_timeout_secs: u64,
    /// Extra text appended after the status line contract.
    pub system_prompt_append: String,
    /// Directory for raw JSON-lines logs of every engine call.
    pub stream_log_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string()],
            model: None,
            allowed_tools: ["Read", "Grep", "Glob", "Edit", "Write", "Bash"]
                .iter()
                .map(|tool| tool.to_string())
                .collect(),
            permission_mode: PermissionMode::AcceptEdits,
            max_turns: None,
            pass_timeout_secs: 30 * 60,
            system_prompt_append: String::new(),
            stream_log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Pass bound for `--fix-recursive` when `--max-passes` is not given.
    pub max_passes: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tool names counted as file mutations.
    pub mutating_tools: Vec<String>,
    /// Tool input field holding the mutated path.
    pub path_field: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mutating_tools: DEFAULT_MUTATING_TOOLS
                .iter()
                .map(|tool| tool.to_string())
                .collect(),
            path_field: DEFAULT_PATH_FIELD.to_string(),
        }
    }
}

impl ReviewerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(ConfigError::new("agent.command must be a non-empty array"));
        }
        if self.agent.pass_timeout_secs == 0 {
            return Err(ConfigError::new("agent.pass_timeout_secs must be > 0"));
        }
        if self.agent.max_turns == Some(0) {
            return Err(ConfigError::new("agent.max_turns must be > 0 when set"));
        }
        validate_max_passes(self.fix_loop.max_passes)?;
        if self.tracking.mutating_tools.is_empty() {
            return Err(ConfigError::new("tracking.mutating_tools must not be empty"));
        }
        if self.tracking.path_field.trim().is_empty() {
            return Err(ConfigError::new("tracking.path_field must not be empty"));
        }
        Ok(())
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.pass_timeout_secs)
    }

    pub fn edit_tracker(&self) -> EditTracker {
        EditTracker::new(
            self.tracking.mutating_tools.clone(),
            self.tracking.path_field.clone(),
        )
    }

    /// Engine configuration for every pass of this run.
    pub fn engine_config(&self, working_directory: Option<PathBuf>) -> EngineConfig {
        EngineConfig {
            model: self.agent.model.clone(),
            allowed_tools: self.agent.allowed_tools.clone(),
            permission_mode: self.agent.permission_mode,
            max_turns: self.agent.max_turns,
            working_directory,
            system_prompt_append: system_prompt_append(&self.agent.system_prompt_append),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ReviewerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ReviewerConfig> {
    if !path.exists() {
        return Ok(ReviewerConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ReviewerConfig = toml::from_str(&contents)
        .map_err(|err| ConfigError::new(format!("parse {}: {err}", path.display())))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Resolve which config file to read.
///
/// An explicit path must exist; otherwise `.reviewer/config.toml` under `root`
/// is used when present.
pub fn resolve_config_path(explicit: Option<&Path>, root: &Path) -> Result<PathBuf> {
    match explicit {
        Some(path) if !path.exists() => Err(ConfigError::new(format!(
            "config file {} does not exist",
            path.display()
        ))
        .into()),
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(root.join(DEFAULT_CONFIG_PATH)),
    }
}
