//! End-to-end tests for the Code-Mode adapter: script execution, trace
//! capture, structured output, and console handling.

use std::sync::Arc;

use serde_json::json;
use troupe_core::tools::builtin::{InMemoryStore, Memory, MemoryToolSet, Todo, TodoToolSet};
use troupe_core::{
    handler_fn, CodeModeToolSet, ScriptResult, StaticToolSet, Tool, ToolCall, ToolCallResult,
    ToolContext, ToolSet, RUN_TOOLS_WITH_JAVASCRIPT,
};

async fn run_script(inner: Arc<dyn ToolSet>, script: &str) -> anyhow::Result<ScriptResult> {
    let adapter = CodeModeToolSet::wrap(inner);
    let tools = adapter.tools().await?;
    assert_eq!(tools.len(), 1, "adapter must expose exactly one tool");
    assert_eq!(tools[0].name, RUN_TOOLS_WITH_JAVASCRIPT);

    let arguments = serde_json::to_string(&json!({ "script": script }))?;
    let call = ToolCall::new("tc1", RUN_TOOLS_WITH_JAVASCRIPT, arguments);
    let result = (tools[0].handler)(ToolContext::default(), call).await?;
    Ok(serde_json::from_str(&result.output)?)
}

fn constant_tool(name: &str, output: &str) -> Tool {
    let output = output.to_string();
    Tool::new(
        name,
        handler_fn(move |_ctx, _call| {
            let output = output.clone();
            async move { Ok(ToolCallResult::success(output)) }
        }),
    )
}

#[tokio::test]
async fn call_hello() {
    let inner = Arc::new(StaticToolSet::new(vec![constant_tool(
        "hello_world",
        "Hello, World!",
    )]));

    let result = run_script(inner, "return hello_world();").await.unwrap();

    assert_eq!(result.value, "Hello, World!");
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn call_with_object_literal_arguments() {
    let tool = constant_tool("echo", "ECHO").with_parameters(json!({
        "type": "object",
        "required": ["message"],
        "properties": {
            "message": {"type": "string", "description": "Message to echo"}
        },
        "additionalProperties": false
    }));
    let inner = Arc::new(StaticToolSet::new(vec![tool]));

    let result = run_script(inner, "return echo({'message':'ECHO'});")
        .await
        .unwrap();

    assert_eq!(result.value, "ECHO");
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn success_does_not_include_tool_calls() {
    let inner = Arc::new(StaticToolSet::new(vec![constant_tool("get_data", "data")]));

    let result = run_script(inner, "return get_data();").await.unwrap();

    assert_eq!(result.value, "data");
    assert!(
        result.tool_calls.is_empty(),
        "successful execution should not include tool_calls"
    );
}

#[tokio::test]
async fn failure_includes_tool_calls_in_order() {
    let inner = Arc::new(StaticToolSet::new(vec![
        constant_tool("first_tool", "first result"),
        constant_tool("second_tool", "second result"),
    ]));

    let result = run_script(
        inner,
        "var a = first_tool(); var b = second_tool(); throw new Error('runtime error');",
    )
    .await
    .unwrap();

    assert!(result.value.contains("runtime error"));
    assert_eq!(
        result.tool_calls.len(),
        2,
        "failed execution should include tool_calls"
    );

    assert_eq!(result.tool_calls[0].name, "first_tool");
    assert_eq!(result.tool_calls[0].result, "first result");
    assert!(result.tool_calls[0].error.is_empty());

    assert_eq!(result.tool_calls[1].name, "second_tool");
    assert_eq!(result.tool_calls[1].result, "second result");
    assert!(result.tool_calls[1].error.is_empty());
}

#[tokio::test]
async fn failure_includes_tool_error() {
    let failing = Tool::new(
        "failing_tool",
        handler_fn(|_ctx, _call| async { anyhow::bail!("network unreachable") }),
    );
    let inner = Arc::new(StaticToolSet::new(vec![failing]));

    let result = run_script(inner, "return failing_tool();").await.unwrap();

    assert!(result.value.contains("network unreachable"));
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "failing_tool");
    assert!(result.tool_calls[0].result.is_empty());
    assert!(result.tool_calls[0].error.contains("network unreachable"));
}

#[tokio::test]
async fn tool_level_error_result_is_thrown_and_recorded() {
    let failing = Tool::new(
        "failing_tool",
        handler_fn(|_ctx, _call| async {
            Ok(ToolCallResult::failure("quota exceeded"))
        }),
    );
    let inner = Arc::new(StaticToolSet::new(vec![failing]));

    let result = run_script(inner, "return failing_tool();").await.unwrap();

    assert!(result.value.contains("quota exceeded"));
    assert_eq!(result.tool_calls.len(), 1);
    assert!(result.tool_calls[0].error.contains("quota exceeded"));
}

#[tokio::test]
async fn failure_includes_tool_arguments() {
    let tool = constant_tool("tool_with_args", "result").with_parameters(json!({
        "type": "object",
        "required": ["value"],
        "properties": {
            "value": {"type": "string", "description": "Test value"}
        },
        "additionalProperties": false
    }));
    let inner = Arc::new(StaticToolSet::new(vec![tool]));

    let result = run_script(
        inner,
        "tool_with_args({'value': 'test123'}); throw new Error('forced error');",
    )
    .await
    .unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].name, "tool_with_args");
    assert_eq!(result.tool_calls[0].arguments, json!({"value": "test123"}));
    assert_eq!(result.tool_calls[0].result, "result");
}

#[tokio::test]
async fn undefined_argument_fields_are_omitted() {
    let tool = constant_tool("tool_with_args", "result");
    let inner = Arc::new(StaticToolSet::new(vec![tool]));

    let result = run_script(
        inner,
        "tool_with_args({value: 'x', extra: undefined}); throw new Error('forced error');",
    )
    .await
    .unwrap();

    assert_eq!(result.tool_calls[0].arguments, json!({"value": "x"}));
}

#[tokio::test]
async fn caught_tool_error_still_counts_as_success() {
    let failing = Tool::new(
        "failing_tool",
        handler_fn(|_ctx, _call| async { anyhow::bail!("nope") }),
    );
    let inner = Arc::new(StaticToolSet::new(vec![failing]));

    let result = run_script(
        inner,
        "try { failing_tool(); } catch (e) {} return 'survived';",
    )
    .await
    .unwrap();

    assert_eq!(result.value, "survived");
    assert!(
        result.tool_calls.is_empty(),
        "trace is only reported on script failure"
    );
}

#[tokio::test]
async fn structured_output_for_todo() {
    let inner = Arc::new(TodoToolSet::new());

    let result = run_script(
        inner.clone(),
        "return create_todo({'description': 'Test task'});",
    )
    .await
    .unwrap();

    let todos: Vec<Todo> = serde_json::from_str(&result.value)
        .expect("create_todo should return structured JSON in code mode");
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].id, "todo_1");
    assert_eq!(todos[0].description, "Test task");
    assert_eq!(todos[0].status, "pending");

    let result = run_script(inner, "return list_todos();").await.unwrap();
    let todos: Vec<Todo> = serde_json::from_str(&result.value).unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].description, "Test task");
}

#[tokio::test]
async fn structured_output_for_memory() {
    let store = Arc::new(InMemoryStore::new());
    let inner = Arc::new(MemoryToolSet::new(store));

    let result = run_script(
        inner.clone(),
        "return add_memory({'memory': 'Test memory'});",
    )
    .await
    .unwrap();

    let memories: Vec<Memory> = serde_json::from_str(&result.value)
        .expect("add_memory should return structured JSON in code mode");
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].memory, "Test memory");

    let result = run_script(inner, "return get_memories();").await.unwrap();
    let memories: Vec<Memory> = serde_json::from_str(&result.value).unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].memory, "Test memory");
}

#[tokio::test]
async fn structured_values_compose_inside_the_script() {
    let inner = Arc::new(TodoToolSet::new());

    // The parsed structured value is a real array the script can index.
    let result = run_script(
        inner,
        "var todos = create_todo({'description': 'alpha'}); return todos[0].id;",
    )
    .await
    .unwrap();

    assert_eq!(result.value, "todo_1");
}

#[tokio::test]
async fn console_output_is_captured_per_stream() {
    let inner = Arc::new(StaticToolSet::new(vec![]));

    let result = run_script(
        inner,
        "console.log('step', 1); console.error('bad'); return 'ok';",
    )
    .await
    .unwrap();

    assert_eq!(result.value, "ok");
    assert_eq!(result.stdout, "step 1\n");
    assert_eq!(result.stderr, "bad\n");
}

#[tokio::test]
async fn objects_serialize_to_json_and_undefined_to_marker() {
    let inner = Arc::new(StaticToolSet::new(vec![]));

    let result = run_script(inner.clone(), "return {a: 1, b: 'x'};").await.unwrap();
    assert_eq!(result.value, r#"{"a":1,"b":"x"}"#);

    let result = run_script(inner.clone(), "var x = 1;").await.unwrap();
    assert_eq!(result.value, "undefined");

    let result = run_script(inner, "return 42;").await.unwrap();
    assert_eq!(result.value, "42");
}

#[tokio::test]
async fn unknown_tool_call_fails_the_script() {
    let inner = Arc::new(StaticToolSet::new(vec![]));

    let result = run_script(inner, "return not_a_tool();").await.unwrap();
    assert!(result.value.contains("not_a_tool"));
    assert!(result.tool_calls.is_empty());
}

#[tokio::test]
async fn engine_state_does_not_leak_between_executions() {
    let inner = Arc::new(StaticToolSet::new(vec![]));
    let adapter = CodeModeToolSet::wrap(inner);
    let tools = adapter.tools().await.unwrap();
    let tool = &tools[0];

    let run = |script: &str| {
        let arguments = serde_json::to_string(&json!({ "script": script })).unwrap();
        (tool.handler)(
            ToolContext::default(),
            ToolCall::new("tc", RUN_TOOLS_WITH_JAVASCRIPT, arguments),
        )
    };

    let first = run("var leak = 42; return 'planted';").await.unwrap();
    let first: ScriptResult = serde_json::from_str(&first.output).unwrap();
    assert_eq!(first.value, "planted");

    let second = run("return typeof leak;").await.unwrap();
    let second: ScriptResult = serde_json::from_str(&second.output).unwrap();
    assert_eq!(second.value, "undefined");
}

#[tokio::test]
async fn description_embeds_the_jsdoc_projection() {
    let tool = constant_tool("create_todo", "[]")
        .with_description("Create new todo")
        .with_parameters(json!({
            "type": "object",
            "properties": {"description": {"type": "string"}}
        }));
    let adapter = CodeModeToolSet::wrap(Arc::new(StaticToolSet::new(vec![tool])));

    let tools = adapter.tools().await.unwrap();
    let description = &tools[0].description;
    assert!(description.contains("/**"));
    assert!(description.contains(" * Create new todo"));
    assert!(description.contains("function create_todo(args: Input): Output { ... }"));
}

#[tokio::test]
async fn malformed_script_parameter_is_an_invocation_error() {
    let adapter = CodeModeToolSet::wrap(Arc::new(StaticToolSet::new(vec![])));
    let tools = adapter.tools().await.unwrap();

    let outcome = (tools[0].handler)(
        ToolContext::default(),
        ToolCall::new("tc", RUN_TOOLS_WITH_JAVASCRIPT, r#"{"not_script": 1}"#),
    )
    .await;

    assert!(outcome.is_err());
}
