//! Structured events emitted by the agent engine.
//!
//! The agent CLI streams one JSON object per line, tagged by `type`. Decoding
//! is deliberately forgiving: unknown event or block types become `Other`, and
//! a known event whose fields have unexpected shapes degrades field by field
//! instead of failing the pass.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// One message from the engine's event stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An assistant turn: text, tool invocations, thinking.
    Assistant {
        #[serde(default)]
        message: AssistantMessage,
    },
    /// A user turn, in practice the result of a tool invocation.
    User {
        #[serde(default, rename = "tool_use_result", deserialize_with = "lenient")]
        tool_result: Option<ToolResult>,
    },
    /// Heartbeat for a long-running tool.
    ToolProgress {
        #[serde(default)]
        tool_name: String,
        #[serde(default, rename = "elapsed_time_seconds")]
        elapsed_seconds: f64,
    },
    /// Terminal summary of the engine call.
    Result {
        #[serde(default, rename = "num_turns")]
        turns: u32,
        #[serde(default)]
        duration_ms: u64,
        #[serde(default, rename = "total_cost_usd")]
        cost_usd: f64,
        #[serde(default)]
        is_error: bool,
        #[serde(default, deserialize_with = "lenient")]
        errors: Option<Vec<String>>,
    },
    /// System/init messages and anything this crate does not model.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, deserialize_with = "lenient_blocks")]
    pub content: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub stderr: Option<String>,
}

/// A content block inside an assistant turn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

impl Event {
    /// Build an assistant event from blocks.
    pub fn assistant(content: Vec<Block>) -> Self {
        Event::Assistant {
            message: AssistantMessage { content },
        }
    }

    /// Content blocks of an assistant turn; empty for every other event.
    pub fn blocks(&self) -> &[Block] {
        match self {
            Event::Assistant { message } => &message.content,
            _ => &[],
        }
    }

    /// Non-empty text blocks, in emission order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.blocks().iter().filter_map(|block| match block {
            Block::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        })
    }

    /// Decode one line of the engine's JSON-lines stream.
    ///
    /// Returns `None` for blank or non-JSON lines (banners, warnings printed by
    /// the agent CLI). A JSON value that does not fit any modeled event decodes
    /// as [`Event::Other`].
    pub fn decode_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                debug!(err = %err, "skipping non-json engine output line");
                return None;
            }
        };
        Some(serde_json::from_value(value).unwrap_or_else(|err| {
            debug!(err = %err, "unrecognized engine event shape");
            Event::Other
        }))
    }
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn tool_use(name: impl Into<String>, input: Value) -> Self {
        Block::ToolUse {
            name: name.into(),
            input,
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_blocks<'de, D>(deserializer: D) -> Result<Vec<Block>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or(Block::Other))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_assistant_blocks() {
        let line = r#"{"type":"assistant","message":{"id":"m1","content":[
            {"type":"thinking","thinking":"hmm"},
            {"type":"text","text":"Fixing."},
            {"type":"tool_use","id":"t1","name":"Edit","input":{"file_path":"src/a.rs"}}
        ]},"session_id":"s"}"#
            .replace('\n', "");
        let event = Event::decode_line(&line).expect("event");
        assert_eq!(
            event.blocks(),
            &[
                Block::Thinking {
                    thinking: "hmm".to_string()
                },
                Block::text("Fixing."),
                Block::tool_use("Edit", json!({"file_path": "src/a.rs"})),
            ]
        );
        assert_eq!(event.texts().collect::<Vec<_>>(), vec!["Fixing."]);
    }

    #[test]
    fn decodes_result_summary() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"num_turns":7,"duration_ms":1200,"total_cost_usd":0.42,"result":"ALL_CLEAR"}"#;
        assert_eq!(
            Event::decode_line(line),
            Some(Event::Result {
                turns: 7,
                duration_ms: 1200,
                cost_usd: 0.42,
                is_error: false,
                errors: None,
            })
        );
    }

    #[test]
    fn decodes_tool_progress_and_user_stderr() {
        let progress = r#"{"type":"tool_progress","tool_name":"Bash","elapsed_time_seconds":3.5}"#;
        assert_eq!(
            Event::decode_line(progress),
            Some(Event::ToolProgress {
                tool_name: "Bash".to_string(),
                elapsed_seconds: 3.5,
            })
        );

        let user = r#"{"type":"user","message":{"content":[]},"tool_use_result":{"stdout":"","stderr":"boom"}}"#;
        assert_eq!(
            Event::decode_line(user),
            Some(Event::User {
                tool_result: Some(ToolResult {
                    stderr: Some("boom".to_string())
                })
            })
        );
    }

    #[test]
    fn string_tool_result_degrades_to_none() {
        let user = r#"{"type":"user","tool_use_result":"Error: file not found"}"#;
        assert_eq!(
            Event::decode_line(user),
            Some(Event::User { tool_result: None })
        );
    }

    #[test]
    fn unknown_types_become_other() {
        assert_eq!(
            Event::decode_line(r#"{"type":"system","subtype":"init"}"#),
            Some(Event::Other)
        );
        assert_eq!(Event::decode_line(r#"{"no_type":1}"#), Some(Event::Other));
    }

    #[test]
    fn malformed_block_does_not_drop_siblings() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":42},{"type":"image"},{"type":"text","text":"ok"}]}}"#;
        let event = Event::decode_line(line).expect("event");
        assert_eq!(
            event.blocks(),
            &[Block::Other, Block::Other, Block::text("ok")]
        );
    }

    #[test]
    fn non_json_and_blank_lines_are_skipped() {
        assert_eq!(Event::decode_line(""), None);
        assert_eq!(Event::decode_line("   "), None);
        assert_eq!(Event::decode_line("Welcome to the agent CLI"), None);
    }
}
