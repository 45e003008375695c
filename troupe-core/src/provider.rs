//! Model Client Trait and Types
//!
//! Defines the `ModelClient` trait and supporting types for model
//! responses, streaming deltas, token usage, and model metadata. Wire
//! protocol implementations live outside the core; the runtime only
//! depends on this interface.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCall, ToolDescriptor};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Information about the model behind a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub name: String,
    /// Maximum input context tokens.
    pub max_context_tokens: usize,
    /// Maximum output tokens per response.
    pub max_output_tokens: usize,
    /// Provider name (e.g. "anthropic", "openai").
    pub provider_name: String,
}

/// Token usage for a single model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Error,
}

/// Response from a `ModelClient::complete()` call.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text content (may be empty if only tool calls).
    pub content: String,
    /// Tool calls requested by the model, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage.
    pub usage: TokenUsage,
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Callback invoked for each streamed delta from the model.
pub type StreamCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Deltas emitted while a response streams.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A text chunk.
    TextDelta(String),
    /// A tool call has started.
    ToolCallStart { id: String, name: String },
    /// A tool call arguments chunk.
    ToolCallDelta { id: String, arguments_delta: String },
}

/// Folds a provider's delta stream into the aggregated response parts.
///
/// Client implementations emit [`StreamEvent`]s as they arrive and use
/// the accumulator to build the final [`ModelResponse`]; tool-call
/// deltas are keyed by the provider-assigned call id, so interleaved
/// streams aggregate correctly.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: Vec<PendingToolCall>,
}

#[derive(Debug)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the accumulated state.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => self.content.push_str(text),
            StreamEvent::ToolCallStart { id, name } => self.tool_calls.push(PendingToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: String::new(),
            }),
            StreamEvent::ToolCallDelta {
                id,
                arguments_delta,
            } => {
                if let Some(call) = self.tool_calls.iter_mut().find(|c| &c.id == id) {
                    call.arguments.push_str(arguments_delta);
                }
            }
        }
    }

    /// Build the aggregated response. Tool calls keep emission order;
    /// empty argument buffers become empty JSON objects.
    pub fn finish(self, stop_reason: StopReason, usage: TokenUsage) -> ModelResponse {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                };
                crate::types::ToolCall::new(call.id, call.name, arguments)
            })
            .collect();
        ModelResponse {
            content: self.content,
            tool_calls,
            stop_reason,
            usage,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelClient trait
// ---------------------------------------------------------------------------

/// A streaming model client. Implementations aggregate the stream and
/// invoke `stream_cb` for each delta as it arrives.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Client identifier (e.g. the bound model reference).
    fn name(&self) -> &str;

    /// Send a completion request against the conversation so far.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        stream_cb: Option<StreamCallback>,
    ) -> Result<ModelResponse>;

    /// Return metadata about the bound model.
    fn model_info(&self) -> ModelInfo;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
