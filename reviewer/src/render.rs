//! Human-readable rendering of engine events.
//!
//! Rendering is a side channel: the pass executor logs and ignores render
//! failures, so nothing here may influence loop decisions.

use std::io::Write;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::engine::event::{Block, Event};

/// Consumer of every event in a pass, in emission order.
pub trait Renderer {
    fn render(&mut self, event: &Event) -> Result<()>;
}

/// Plain-text renderer for a terminal or any other writer.
pub struct TerminalRenderer<W: Write> {
    out: W,
    /// Print thinking blocks behind a `thinking:` prefix.
    show_thinking: bool,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_thinking: false,
        }
    }

    pub fn with_thinking(mut self, show: bool) -> Self {
        self.show_thinking = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_block(&mut self, block: &Block) -> Result<()> {
        match block {
            Block::Text { text } if !text.trim().is_empty() => {
                writeln!(self.out, "{}", text.trim_end())?;
            }
            Block::ToolUse { name, input } => {
                writeln!(self.out, "→ {}{}", name, tool_target(input))?;
            }
            Block::Thinking { thinking } if self.show_thinking && !thinking.trim().is_empty() => {
                for line in thinking.trim_end().lines() {
                    writeln!(self.out, "  thinking: {line}")?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Assistant { message } => {
                for block in &message.content {
                    self.render_block(block)?;
                }
            }
            Event::User { tool_result } => {
                if let Some(stderr) = tool_result
                    .as_ref()
                    .and_then(|result| result.stderr.as_deref())
                    .map(str::trim)
                    .filter(|stderr| !stderr.is_empty())
                {
                    writeln!(self.out, "  stderr: {}", first_line(stderr))?;
                }
            }
            Event::ToolProgress {
                tool_name,
                elapsed_seconds,
            } => {
                writeln!(self.out, "  … {tool_name} running ({elapsed_seconds:.0}s)")?;
            }
            Event::Result {
                turns,
                duration_ms,
                cost_usd,
                is_error,
                errors,
            } => {
                let label = if *is_error { "finished with errors" } else { "finished" };
                writeln!(
                    self.out,
                    "── {label}: {turns} turns, {:.1}s, ${cost_usd:.4}",
                    *duration_ms as f64 / 1000.0
                )?;
                for err in errors.iter().flatten() {
                    writeln!(self.out, "   error: {err}")?;
                }
            }
            Event::Other => {}
        }
        self.out.flush().context("flush rendered output")
    }
}

/// Short description of what a tool call targets, for the `→ Tool target` line.
fn tool_target(input: &Value) -> String {
    ["file_path", "path", "command", "pattern"]
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .map(|target| format!(" {}", first_line(target)))
        .unwrap_or_default()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
