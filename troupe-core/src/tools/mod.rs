//! Tools and Tool Sets
//!
//! A [`Tool`] is an addressable function with JSON-schema'd input and
//! output; a [`ToolSet`] is a live, enumerable provider of tools with a
//! Start/Stop lifecycle. Handlers are async and receive a [`ToolContext`]
//! carrying the cancellation scope and working directory.

pub mod builtin;
pub mod codemode;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::types::{ToolCall, ToolCallResult, ToolDescriptor};

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Async callback that executes a tool call and returns the result.
///
/// Returning `Err(_)` signals an invocation-level failure (network,
/// panic); a [`ToolCallResult`] with a populated `error` is a well-formed
/// tool-level failure.
pub type ToolHandler =
    Arc<dyn Fn(ToolContext, ToolCall) -> BoxFuture<'static, Result<ToolCallResult>> + Send + Sync>;

/// Per-invocation context passed to tool handlers.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation scope of the enclosing operation.
    pub cancel: CancellationToken,
    /// Working directory the session is bound to.
    pub working_dir: PathBuf,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cancel,
            working_dir: working_dir.into(),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            working_dir: PathBuf::from("."),
        }
    }
}

/// A tool: uniform descriptor plus its handler.
#[derive(Clone)]
pub struct Tool {
    /// Unique name within its tool set.
    pub name: String,
    /// Grouping label (e.g. "todo", "code mode").
    pub category: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema (object) for the tool's arguments.
    pub parameters: serde_json::Value,
    /// JSON Schema for the tool's output.
    pub output_schema: serde_json::Value,
    /// Structured output schema used in Code-Mode. When present, the
    /// tool's output is parsed as JSON before being handed to a script.
    pub code_mode_output_schema: Option<serde_json::Value>,
    /// The async handler.
    pub handler: ToolHandler,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

impl Tool {
    /// Build a tool with default schemas. `parameters` defaults to an
    /// empty object schema; `output_schema` to `{"type": "string"}`.
    pub fn new(name: impl Into<String>, handler: ToolHandler) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
            output_schema: serde_json::json!({"type": "string"}),
            code_mode_output_schema: None,
            handler,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameters(mut self, schema: serde_json::Value) -> Self {
        self.parameters = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_code_mode_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.code_mode_output_schema = Some(schema);
        self
    }

    /// The descriptor advertised to the model for this tool.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Wrap a plain async closure `(ctx, call) -> Result<ToolCallResult>`
/// into a [`ToolHandler`].
pub fn handler_fn<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(ToolContext, ToolCall) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ToolCallResult>> + Send + 'static,
{
    Arc::new(move |ctx, call| Box::pin(f(ctx, call)))
}

// ---------------------------------------------------------------------------
// ToolSet
// ---------------------------------------------------------------------------

/// A live provider of tools.
///
/// `tools` may be called multiple times and may return different tools
/// across calls (e.g. remote discovery). `start`/`stop` are idempotent
/// and must bracket any use of the tools.
#[async_trait]
pub trait ToolSet: Send + Sync {
    /// Enumerate the currently available tools.
    async fn tools(&self) -> Result<Vec<Tool>>;

    /// Bring the tool set online. Idempotent.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Tear the tool set down. Idempotent.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Extra guidance appended to the system prompt of agents carrying
    /// this tool set.
    fn instructions(&self) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// StaticToolSet
// ---------------------------------------------------------------------------

/// A fixed collection of tools with no lifecycle.
pub struct StaticToolSet {
    tools: Vec<Tool>,
    instructions: Option<String>,
}

impl StaticToolSet {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

#[async_trait]
impl ToolSet for StaticToolSet {
    async fn tools(&self) -> Result<Vec<Tool>> {
        Ok(self.tools.clone())
    }

    fn instructions(&self) -> Option<String> {
        self.instructions.clone()
    }
}

// ---------------------------------------------------------------------------
// CompositeToolSet
// ---------------------------------------------------------------------------

/// Flattens several tool sets into one; lifecycle fans out to all members.
pub struct CompositeToolSet {
    members: Vec<Arc<dyn ToolSet>>,
}

impl CompositeToolSet {
    pub fn new(members: Vec<Arc<dyn ToolSet>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl ToolSet for CompositeToolSet {
    async fn tools(&self) -> Result<Vec<Tool>> {
        let mut all = Vec::new();
        for member in &self.members {
            all.extend(member.tools().await?);
        }
        Ok(all)
    }

    async fn start(&self) -> Result<()> {
        for member in &self.members {
            member.start().await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        for member in &self.members {
            member.stop().await?;
        }
        Ok(())
    }

    fn instructions(&self) -> Option<String> {
        let parts: Vec<String> = self
            .members
            .iter()
            .filter_map(|m| m.instructions())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
