//! # Troupe Core
//!
//! Core library for the Troupe multi-agent LLM runtime. Provides the
//! tool and tool-set contracts, the Code-Mode scripting adapter, agent
//! and team definitions, append-only sessions, the turn loop, and the
//! multi-tenant service manager.

pub mod agent;
pub mod config;
pub mod error;
pub mod provider;
pub mod retry;
pub mod runtime;
pub mod services;
pub mod session;
pub mod system_prompt;
pub mod team;
pub mod tools;
pub mod types;

// Re-export key types
pub use agent::{Agent, AgentBuilder};
pub use config::RuntimeConfig;
pub use error::Error;
pub use provider::{
    ModelClient, ModelInfo, ModelResponse, StopReason, StreamAccumulator, StreamCallback,
    StreamEvent, TokenUsage,
};
pub use runtime::{Runtime, TurnResult, TRANSFER_TOOL};
pub use services::{ContentStore, Executor, Manager, ModelFactory, Resolver, SessionStream};
pub use session::{Session, SessionId, SessionInfo};
pub use team::Team;
pub use tools::codemode::{CodeModeToolSet, ScriptResult, ToolTrace, RUN_TOOLS_WITH_JAVASCRIPT};
pub use tools::{handler_fn, CompositeToolSet, StaticToolSet, Tool, ToolContext, ToolSet};
pub use types::{
    FunctionCall, Message, MessageContent, Role, ToolCall, ToolCallResult, ToolDescriptor,
};
