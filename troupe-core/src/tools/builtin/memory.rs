//! Memory Tool Set
//!
//! Long-lived user memories the model can record, list, and delete. The
//! backing store is a trait so deployments can plug in a database; an
//! in-memory implementation ships for tests and demos. Mutating tools
//! return the full memory list, surfaced as structured JSON in Code-Mode.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::tools::{handler_fn, Tool, ToolSet};
use crate::types::ToolCallResult;

/// A single recorded memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub created_at: String,
    pub memory: String,
}

/// Storage backend for user memories.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add(&self, memory: Memory) -> Result<()>;
    async fn list(&self) -> Result<Vec<Memory>>;
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Volatile store backing tests and demos.
pub struct InMemoryStore {
    memories: tokio::sync::Mutex<Vec<Memory>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            memories: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, memory: Memory) -> Result<()> {
        self.memories.lock().await.push(memory);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Memory>> {
        Ok(self.memories.lock().await.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut memories = self.memories.lock().await;
        let before = memories.len();
        memories.retain(|m| m.id != id);
        Ok(memories.len() < before)
    }
}

// ---------------------------------------------------------------------------
// Tool set
// ---------------------------------------------------------------------------

/// Tool set exposing `add_memory`, `get_memories`, and `delete_memory`.
pub struct MemoryToolSet {
    store: Arc<dyn MemoryStore>,
}

impl MemoryToolSet {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    async fn render(store: &Arc<dyn MemoryStore>) -> Result<ToolCallResult> {
        let memories = store.list().await?;
        Ok(ToolCallResult::success(serde_json::to_string(&memories)?))
    }
}

fn memory_list_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["id", "created_at", "memory"],
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The unique ID of the memory"
                },
                "created_at": {
                    "type": "string",
                    "description": "When the memory was recorded"
                },
                "memory": {
                    "type": "string",
                    "description": "The memory text"
                }
            },
            "additionalProperties": false
        }
    })
}

#[async_trait]
impl ToolSet for MemoryToolSet {
    async fn tools(&self) -> Result<Vec<Tool>> {
        let store = self.store.clone();
        let add = Tool::new(
            "add_memory",
            handler_fn(move |_ctx, call| {
                let store = store.clone();
                async move {
                    #[derive(Deserialize)]
                    struct Args {
                        memory: String,
                    }
                    let args: Args = match serde_json::from_str(&call.function.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            return Ok(ToolCallResult::failure(format!(
                                "invalid add_memory arguments: {e}"
                            )))
                        }
                    };
                    store
                        .add(Memory {
                            id: Uuid::new_v4().to_string(),
                            created_at: Utc::now().to_rfc3339(),
                            memory: args.memory,
                        })
                        .await?;
                    MemoryToolSet::render(&store).await
                }
            }),
        )
        .with_category("memory")
        .with_description("Record something worth remembering about the user or task")
        .with_parameters(json!({
            "type": "object",
            "required": ["memory"],
            "properties": {
                "memory": {
                    "type": "string",
                    "description": "The memory text to record"
                }
            },
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(memory_list_schema());

        let store = self.store.clone();
        let get = Tool::new(
            "get_memories",
            handler_fn(move |_ctx, _call| {
                let store = store.clone();
                async move { MemoryToolSet::render(&store).await }
            }),
        )
        .with_category("memory")
        .with_description("List every recorded memory")
        .with_parameters(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(memory_list_schema());

        let store = self.store.clone();
        let delete = Tool::new(
            "delete_memory",
            handler_fn(move |_ctx, call| {
                let store = store.clone();
                async move {
                    #[derive(Deserialize)]
                    struct Args {
                        id: String,
                    }
                    let args: Args = match serde_json::from_str(&call.function.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            return Ok(ToolCallResult::failure(format!(
                                "invalid delete_memory arguments: {e}"
                            )))
                        }
                    };
                    if !store.delete(&args.id).await? {
                        return Ok(ToolCallResult::failure(format!(
                            "no memory with id '{}'",
                            args.id
                        )));
                    }
                    MemoryToolSet::render(&store).await
                }
            }),
        )
        .with_category("memory")
        .with_description("Delete a recorded memory by id")
        .with_parameters(json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The ID of the memory to delete"
                }
            },
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(memory_list_schema());

        Ok(vec![add, get, delete])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
