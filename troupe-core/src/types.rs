//! Core Data Types
//!
//! Shared message, role, and tool-call types used across the runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// A message in a session's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    /// When the message was appended.
    pub created_at: DateTime<Utc>,
}

/// Message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content — text, tool calls, a tool result, or an agent transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    ToolResult(ToolResultMessage),
    Transfer(Transfer),
}

/// A tool result recorded in the conversation, correlated to its call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultMessage {
    /// The tool call id this result corresponds to.
    pub tool_call_id: String,
    #[serde(flatten)]
    pub result: ToolCallResult,
}

/// A hand-off of the conversation to another agent in the team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Name of the agent that takes over.
    pub target: String,
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(text.into()))
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::new(Role::Assistant, MessageContent::ToolCalls(calls))
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result: ToolCallResult) -> Self {
        Self::new(
            Role::Tool,
            MessageContent::ToolResult(ToolResultMessage {
                tool_call_id: tool_call_id.into(),
                result,
            }),
        )
    }

    pub fn transfer(target: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            MessageContent::Transfer(Transfer {
                target: target.into(),
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// A tool call requested by the model (or synthesized by the runtime).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique tool-call id assigned by the provider.
    pub id: String,
    pub function: FunctionCall,
}

/// The function half of a tool call: name plus raw JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON document conforming to the tool's parameters schema.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Result returned from executing a tool handler.
///
/// A populated `error` is a well-formed tool-level failure the model can
/// react to; transport-level failures are signalled by the handler
/// returning `Err(_)` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The tool's output — free text or a JSON document.
    pub output: String,
    /// Set when the tool itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A tool descriptor advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_roundtrip_omits_empty_error() {
        let ok = ToolCallResult::success("42");
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));

        let failed = ToolCallResult::failure("boom");
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("boom"));
        assert!(failed.is_error());
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("yo").role, Role::Assistant);
        assert_eq!(Message::system("sys").role, Role::System);
        assert_eq!(
            Message::tool_result("tc1", ToolCallResult::success("ok")).role,
            Role::Tool
        );
        let transfer = Message::transfer("researcher");
        match transfer.content {
            MessageContent::Transfer(t) => assert_eq!(t.target, "researcher"),
            other => panic!("unexpected content: {other:?}"),
        }
    }
}
