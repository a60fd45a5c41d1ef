//! A single representation of chat message content. Messages reach
//! us in a few different shapes (UI messages with `parts`, plain
//! `content` strings, OpenAI messages with tool calls) and are
//! normalized here once instead of being sniffed wherever they're
//! rendered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::openai::{Message, Role};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    Text { value: String },
    ToolCall { name: String, arguments: String },
    ToolResult { value: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
}

fn text_part(value: &str) -> Option<MessagePart> {
    if value.is_empty() {
        None
    } else {
        Some(MessagePart::Text {
            value: value.to_string(),
        })
    }
}

/// Extract the parts of a message in any of the shapes we know about.
/// Anything unrecognized is skipped.
pub fn normalize(msg: &Value) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let is_tool_result = msg["role"].as_str() == Some("tool");

    if let Some(ui_parts) = msg["parts"].as_array() {
        for part in ui_parts {
            if part["type"].as_str() == Some("text") {
                if let Some(p) = part["text"].as_str().and_then(text_part) {
                    parts.push(p);
                }
            }
        }
    } else {
        match &msg["content"] {
            Value::String(content) if is_tool_result => parts.push(MessagePart::ToolResult {
                value: content.clone(),
            }),
            Value::String(content) => parts.extend(text_part(content)),
            Value::Array(content_parts) => {
                for part in content_parts {
                    if part["type"].as_str() == Some("text") {
                        parts.extend(part["text"].as_str().and_then(text_part));
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(tool_calls) = msg["tool_calls"].as_array() {
        for call in tool_calls {
            let function = &call["function"];
            if let Some(name) = function["name"].as_str() {
                parts.push(MessagePart::ToolCall {
                    name: name.to_string(),
                    arguments: function["arguments"].as_str().unwrap_or_default().to_string(),
                });
            }
        }
    }

    parts
}

/// The text of a message with every text part joined.
pub fn text(parts: &[MessagePart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::Text { value } => Some(value.as_str()),
            _ => None,
        })
        .collect()
}

/// Normalize a stored transcript for display. System messages are not
/// part of the conversation the user sees.
pub fn normalize_transcript(messages: &[Message]) -> Vec<NormalizedMessage> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .filter_map(|m| {
            let value = serde_json::to_value(m).ok()?;
            Some(NormalizedMessage {
                role: value["role"].as_str().unwrap_or_default().to_string(),
                parts: normalize(&value),
            })
        })
        .collect()
}
