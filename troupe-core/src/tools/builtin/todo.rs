//! Todo Tool Set
//!
//! An in-memory task list the model can manage across a session. Each
//! mutating tool returns the full list so the model always sees current
//! state; in Code-Mode the list is surfaced as structured JSON via the
//! tools' `code_mode_output_schema`.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tools::{handler_fn, Tool, ToolSet};
use crate::types::ToolCallResult;

/// A single todo item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub description: String,
    pub status: String,
}

/// Tool set exposing `create_todo`, `list_todos`, and `complete_todo`.
pub struct TodoToolSet {
    todos: Arc<Mutex<Vec<Todo>>>,
}

impl TodoToolSet {
    pub fn new() -> Self {
        Self {
            todos: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn render(todos: &[Todo]) -> Result<ToolCallResult> {
        Ok(ToolCallResult::success(serde_json::to_string(todos)?))
    }
}

impl Default for TodoToolSet {
    fn default() -> Self {
        Self::new()
    }
}

fn todo_list_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["id", "description", "status"],
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The unique ID of the todo"
                },
                "description": {
                    "type": "string",
                    "description": "The description of the todo"
                },
                "status": {
                    "type": "string",
                    "description": "Either \"pending\" or \"done\""
                }
            },
            "additionalProperties": false
        }
    })
}

#[async_trait]
impl ToolSet for TodoToolSet {
    async fn tools(&self) -> Result<Vec<Tool>> {
        let todos = self.todos.clone();
        let create = Tool::new(
            "create_todo",
            handler_fn(move |_ctx, call| {
                let todos = todos.clone();
                async move {
                    #[derive(Deserialize)]
                    struct Args {
                        description: String,
                    }
                    let args: Args = match serde_json::from_str(&call.function.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            return Ok(ToolCallResult::failure(format!(
                                "invalid create_todo arguments: {e}"
                            )))
                        }
                    };
                    let mut todos = todos.lock().expect("todo list lock");
                    let id = format!("todo_{}", todos.len() + 1);
                    todos.push(Todo {
                        id,
                        description: args.description,
                        status: "pending".to_string(),
                    });
                    TodoToolSet::render(&todos)
                }
            }),
        )
        .with_category("todo")
        .with_description("Create a new todo item with a description")
        .with_parameters(json!({
            "type": "object",
            "required": ["description"],
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Description of the todo item"
                }
            },
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(todo_list_schema());

        let todos = self.todos.clone();
        let list = Tool::new(
            "list_todos",
            handler_fn(move |_ctx, _call| {
                let todos = todos.clone();
                async move {
                    let todos = todos.lock().expect("todo list lock");
                    TodoToolSet::render(&todos)
                }
            }),
        )
        .with_category("todo")
        .with_description("List all todo items")
        .with_parameters(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(todo_list_schema());

        let todos = self.todos.clone();
        let complete = Tool::new(
            "complete_todo",
            handler_fn(move |_ctx, call| {
                let todos = todos.clone();
                async move {
                    #[derive(Deserialize)]
                    struct Args {
                        id: String,
                    }
                    let args: Args = match serde_json::from_str(&call.function.arguments) {
                        Ok(args) => args,
                        Err(e) => {
                            return Ok(ToolCallResult::failure(format!(
                                "invalid complete_todo arguments: {e}"
                            )))
                        }
                    };
                    let mut todos = todos.lock().expect("todo list lock");
                    match todos.iter_mut().find(|t| t.id == args.id) {
                        Some(todo) => {
                            todo.status = "done".to_string();
                            TodoToolSet::render(&todos)
                        }
                        None => Ok(ToolCallResult::failure(format!(
                            "no todo with id '{}'",
                            args.id
                        ))),
                    }
                }
            }),
        )
        .with_category("todo")
        .with_description("Mark a todo item as done")
        .with_parameters(json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {
                    "type": "string",
                    "description": "The ID of the todo to complete"
                }
            },
            "additionalProperties": false
        }))
        .with_output_schema(json!({"type": "string"}))
        .with_code_mode_output_schema(todo_list_schema());

        Ok(vec![create, list, complete])
    }

    fn instructions(&self) -> Option<String> {
        Some("Track multi-step work with the todo tools: create one item per step and mark items done as you finish them.".to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
