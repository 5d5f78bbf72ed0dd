//! Protocol and conversation message types.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text of the system message enqueued when a run begins.
pub const STARTED_TEXT: &str = "Agent process started.";

/// Text of the terminal system message that ends every run.
pub const FINISHED_TEXT: &str = "Agent process finished.";

/// Prefix of the system message reporting an agent-loop failure.
pub const ERROR_PREFIX: &str = "An error occurred: ";

/// Content block emitted by the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain response text.
    Text { text: String },
    /// Tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Intermediate reasoning.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Reasoning the provider chose to redact.
    RedactedThinking { data: String },
}

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Result of a single tool execution.
///
/// Every field is optional; tools report whatever subset applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Standard output of the tool.
    #[serde(default)]
    pub output: Option<String>,
    /// Error text, if the tool failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Screenshot or other image, base64 encoded.
    #[serde(default)]
    pub base64_image: Option<String>,
}

impl ToolResult {
    /// Successful result carrying output text.
    #[must_use]
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    /// Failed result carrying error text.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach a base64 encoded image.
    #[must_use]
    pub fn with_image(mut self, base64_image: impl Into<String>) -> Self {
        self.base64_image = Some(base64_image.into());
        self
    }

    /// Extract a tool result from arbitrary JSON.
    ///
    /// Never fails: missing fields stay `None`, non-string values are
    /// rendered as JSON text, and a bare string is taken as the output.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let field = |key: &str| map.get(key).and_then(render_text);
                Self {
                    output: field("output"),
                    error: field("error"),
                    base64_image: field("base64_image"),
                }
            }
            other => Self {
                output: render_text(other),
                ..Self::default()
            },
        }
    }

    /// Decode the attached image, if present and valid base64.
    #[must_use]
    pub fn decode_image(&self) -> Option<Vec<u8>> {
        self.base64_image
            .as_deref()
            .and_then(|data| BASE64.decode(data).ok())
    }
}

fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Message streamed to a client.
///
/// Serialized with a `role` tag; the shape of `content` depends on the role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// User input echoed to the client.
    User { content: String },
    /// Content block produced by the agent.
    Assistant { content: ContentBlock },
    /// Result of a tool call, correlated by `tool_id`.
    Tool { content: ToolResult, tool_id: String },
    /// Lifecycle notice from the bridge itself.
    System {
        content: String,
        /// Set only on the last message of a run.
        #[serde(default)]
        terminal: bool,
    },
}

impl ProtocolMessage {
    /// Non-terminal system notice.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
            terminal: false,
        }
    }

    /// The "started" notice.
    #[must_use]
    pub fn started() -> Self {
        Self::system(STARTED_TEXT)
    }

    /// The terminal "finished" message.
    #[must_use]
    pub fn finished() -> Self {
        Self::System {
            content: FINISHED_TEXT.to_string(),
            terminal: true,
        }
    }

    /// System notice describing an agent-loop failure.
    #[must_use]
    pub fn agent_error(error: &dyn fmt::Display) -> Self {
        Self::system(format!("{ERROR_PREFIX}{error}"))
    }

    /// Wrap an agent content block.
    #[must_use]
    pub const fn assistant(content: ContentBlock) -> Self {
        Self::Assistant { content }
    }

    /// Wrap a tool result.
    #[must_use]
    pub fn tool(content: ToolResult, tool_id: impl Into<String>) -> Self {
        Self::Tool {
            content,
            tool_id: tool_id.into(),
        }
    }

    /// Whether this message ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::System { terminal: true, .. })
    }

    /// Role tag as it appears on the wire.
    #[must_use]
    pub const fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
            Self::System { .. } => "system",
        }
    }
}

/// Role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Assistant,
}

/// One entry of the conversation history handed to the agent loop.
///
/// Content blocks are kept as raw JSON: the history belongs to the agent
/// loop and is only seeded and stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: Vec<Value>,
}

impl ConversationMessage {
    /// User message with a single text block.
    #[must_use]
    pub fn user_text(text: &str) -> Self {
        Self {
            role: ConversationRole::User,
            content: vec![serde_json::json!({ "type": "text", "text": text })],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_finished_is_only_terminal_message() {
        assert!(ProtocolMessage::finished().is_terminal());
        assert!(!ProtocolMessage::started().is_terminal());
        // Same text without the flag must not end the stream.
        assert!(!ProtocolMessage::system(FINISHED_TEXT).is_terminal());
    }

    #[test]
    fn test_system_message_wire_format() {
        let json = serde_json::to_value(ProtocolMessage::finished()).unwrap();
        assert_eq!(
            json,
            json!({"role": "system", "content": "Agent process finished.", "terminal": true})
        );

        let json = serde_json::to_value(ProtocolMessage::started()).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "Agent process started.");
        assert_eq!(json["terminal"], false);
    }

    #[test]
    fn test_tool_message_wire_format() {
        let msg = ProtocolMessage::tool(ToolResult::output("file.txt"), "toolu_01");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "role": "tool",
                "content": {"output": "file.txt", "error": null, "base64_image": null},
                "tool_id": "toolu_01"
            })
        );
    }

    #[test]
    fn test_assistant_message_wire_format() {
        let block = ContentBlock::ToolUse {
            id: "toolu_02".into(),
            name: "computer".into(),
            input: json!({"action": "screenshot"}),
        };
        let json = serde_json::to_value(ProtocolMessage::assistant(block)).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"]["type"], "tool_use");
        assert_eq!(json["content"]["name"], "computer");
    }

    #[test]
    fn test_agent_error_carries_error_text() {
        let msg = ProtocolMessage::agent_error(&"rate limited");
        assert_eq!(msg, ProtocolMessage::system("An error occurred: rate limited"));
    }

    #[test]
    fn test_tool_result_from_partial_object() {
        let result = ToolResult::from_value(&json!({"error": "permission denied"}));
        assert_eq!(result, ToolResult::error("permission denied"));
    }

    #[test]
    fn test_tool_result_from_malformed_value() {
        let result = ToolResult::from_value(&json!({"output": 42, "error": null, "extra": true}));
        assert_eq!(result.output.as_deref(), Some("42"));
        assert_eq!(result.error, None);

        let result = ToolResult::from_value(&json!("plain text"));
        assert_eq!(result.output.as_deref(), Some("plain text"));

        assert_eq!(ToolResult::from_value(&Value::Null), ToolResult::default());
    }

    #[test]
    fn test_decode_image() {
        let result = ToolResult::default().with_image("aGVsbG8=");
        assert_eq!(result.decode_image().as_deref(), Some(&b"hello"[..]));

        let result = ToolResult::default().with_image("not base64!");
        assert!(result.decode_image().is_none());
    }

    #[test]
    fn test_conversation_seed() {
        let msg = ConversationMessage::user_text("list files in /tmp");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({"role": "user", "content": [{"type": "text", "text": "list files in /tmp"}]})
        );
    }
}
