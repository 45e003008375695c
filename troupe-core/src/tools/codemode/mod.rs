//! Code-Mode Tool Adapter
//!
//! Wraps a [`ToolSet`] and exposes a single `run_tools_with_javascript`
//! tool. The tool executes a model-authored script inside an embedded JS
//! engine where every wrapped tool is bound as a global function; one
//! scripted round-trip replaces N tool-call round-trips.
//!
//! The engine runs on a blocking thread with a fresh context per
//! execution. Tool invocations cross a synchronous bridge: the script's
//! host function forwards the call over a channel to an async pump task
//! and blocks until the handler's reply arrives. Every invocation is
//! recorded in a trace that is returned only when the script fails, so
//! the model can see how far it got.

pub mod functions;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use boa_engine::{
    js_string, Context, JsArgs, JsError, JsNativeError, JsResult, JsString, JsValue,
    NativeFunction, Source,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::tools::{Tool, ToolContext, ToolHandler, ToolSet};
use crate::types::{ToolCall, ToolCallResult};

/// Name of the single tool exposed by the adapter.
pub const RUN_TOOLS_WITH_JAVASCRIPT: &str = "run_tools_with_javascript";

// ---------------------------------------------------------------------------
// Script result
// ---------------------------------------------------------------------------

/// Outcome of one script execution, serialized as the outer tool's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResult {
    /// The value returned by the script, or the error message on failure.
    pub value: String,
    /// Accumulated `console.log` output.
    pub stdout: String,
    /// Accumulated `console.error` output.
    pub stderr: String,
    /// Tool invocations attempted, in order. Present only on failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolTrace>,
}

/// One recorded tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTrace {
    /// The name of the tool that was called.
    pub name: String,
    /// The arguments passed to the tool, as a decoded JSON value.
    pub arguments: serde_json::Value,
    /// The raw response returned by the tool.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    /// The error message, if the tool call failed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

// ---------------------------------------------------------------------------
// Adapter tool set
// ---------------------------------------------------------------------------

/// The Code-Mode adapter: a [`ToolSet`] exposing one scripting tool
/// backed by the wrapped set.
pub struct CodeModeToolSet {
    inner: Arc<dyn ToolSet>,
}

impl CodeModeToolSet {
    /// Wrap a tool set. The wrapped tools are no longer advertised
    /// individually; they become script-callable functions.
    pub fn wrap(inner: Arc<dyn ToolSet>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ToolSet for CodeModeToolSet {
    async fn tools(&self) -> Result<Vec<Tool>> {
        let inner_tools = self.inner.tools().await?;

        let mut description = String::from(DESCRIPTION_HEADER);
        for tool in &inner_tools {
            if functions::is_js_identifier(&tool.name) {
                description.push_str(&functions::tool_to_jsdoc(tool));
            }
        }

        let inner = self.inner.clone();
        let handler: ToolHandler = Arc::new(move |ctx, call| {
            let inner = inner.clone();
            Box::pin(execute_script(inner, ctx, call))
        });

        Ok(vec![Tool {
            name: RUN_TOOLS_WITH_JAVASCRIPT.to_string(),
            category: "code mode".to_string(),
            description,
            parameters: parameters_schema(),
            output_schema: output_schema(),
            code_mode_output_schema: None,
            handler,
        }])
    }

    async fn start(&self) -> Result<()> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<()> {
        self.inner.stop().await
    }
}

const DESCRIPTION_HEADER: &str = "Run a JavaScript program that calls the available tools and returns a value, \
instead of invoking the tools one call at a time.\n\
Each tool is bound as a global function taking a single arguments object. \
Use `return` to produce the script's value; console.log and console.error \
output is captured. The available functions are:\n";

fn parameters_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["script"],
        "properties": {
            "script": {
                "type": "string",
                "description": "Script to execute"
            }
        },
        "additionalProperties": false
    })
}

fn output_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["value", "stdout", "stderr"],
        "properties": {
            "value": {
                "type": "string",
                "description": "The value returned by the script"
            },
            "stdout": {
                "type": "string",
                "description": "The standard output of the console"
            },
            "stderr": {
                "type": "string",
                "description": "The standard error of the console"
            },
            "tool_calls": {
                "type": "array",
                "description": "The list of tool calls made during script execution, only included on failure",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name", "arguments"],
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "The name of the tool that was called"
                        },
                        "arguments": {
                            "description": "The arguments passed to the tool"
                        },
                        "result": {
                            "type": "string",
                            "description": "The raw response returned by the tool"
                        },
                        "error": {
                            "type": "string",
                            "description": "The error message, if the tool call failed"
                        }
                    }
                }
            }
        },
        "additionalProperties": false
    })
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ScriptParams {
    script: String,
}

/// Reply sent back across the bridge: a handler result or a
/// transport-level error message.
type BridgeReply = Result<ToolCallResult, String>;

/// A tool invocation crossing from the engine thread to the async pump.
struct BridgeRequest {
    call: ToolCall,
    reply: std::sync::mpsc::Sender<BridgeReply>,
}

/// Per-execution state installed on the engine thread while the script
/// runs. The host functions read and update it through a thread-local.
struct ScriptEnv {
    dispatch: tokio::sync::mpsc::Sender<BridgeRequest>,
    structured: HashSet<String>,
    trace: Vec<ToolTrace>,
    stdout: String,
    stderr: String,
    cancel: CancellationToken,
}

thread_local! {
    static SCRIPT_ENV: RefCell<Option<ScriptEnv>> = const { RefCell::new(None) };
}

/// Outcome of one engine run, extracted before the thread is released.
struct EngineOutcome {
    /// `Ok(serialized value)` or `Err(error message)`.
    value: Result<String, String>,
    stdout: String,
    stderr: String,
    trace: Vec<ToolTrace>,
}

async fn execute_script(
    inner: Arc<dyn ToolSet>,
    ctx: ToolContext,
    call: ToolCall,
) -> Result<ToolCallResult> {
    let params: ScriptParams = serde_json::from_str(&call.function.arguments)
        .map_err(|e| anyhow!("invalid {RUN_TOOLS_WITH_JAVASCRIPT} arguments: {e}"))?;

    // Snapshot the wrapped tools for this execution.
    let mut by_name: HashMap<String, Tool> = HashMap::new();
    let mut structured: HashSet<String> = HashSet::new();
    let mut stubs = String::new();
    for tool in inner.tools().await? {
        if !functions::is_js_identifier(&tool.name) {
            warn!(tool = %tool.name, "skipping tool with non-identifier name in code mode");
            continue;
        }
        if tool.code_mode_output_schema.is_some() {
            structured.insert(tool.name.clone());
        }
        stubs.push_str(&functions::tool_stub(&tool.name));
        by_name.insert(tool.name.clone(), tool);
    }

    // Pump task: executes handlers on the async side while the engine
    // thread blocks on the reply channel.
    let (dispatch_tx, mut dispatch_rx) = tokio::sync::mpsc::channel::<BridgeRequest>(8);
    let pump_ctx = ctx.clone();
    let pump_cancel = ctx.cancel.clone();
    let pump = tokio::spawn(async move {
        while let Some(req) = dispatch_rx.recv().await {
            let name = req.call.function.name.clone();
            let outcome: BridgeReply = match by_name.get(&name) {
                None => Err(format!("unknown tool: {name}")),
                Some(tool) => {
                    debug!(tool = %name, "code mode tool call");
                    tokio::select! {
                        _ = pump_cancel.cancelled() => Err("tool call cancelled".to_string()),
                        result = (tool.handler)(pump_ctx.clone(), req.call.clone()) => {
                            result.map_err(|e| format!("{e:#}"))
                        }
                    }
                }
            };
            let _ = req.reply.send(outcome);
        }
    });

    let prelude = format!("{}\n{}", functions::RUNTIME_GLUE, stubs);
    let env = ScriptEnv {
        dispatch: dispatch_tx,
        structured,
        trace: Vec::new(),
        stdout: String::new(),
        stderr: String::new(),
        cancel: ctx.cancel.clone(),
    };
    let script = params.script;

    let outcome = tokio::task::spawn_blocking(move || run_in_engine(&prelude, &script, env))
        .await
        .map_err(|e| anyhow!("script execution thread failed: {e}"))??;

    // The engine dropped its dispatch sender, so the pump drains and ends.
    let _ = pump.await;

    if ctx.cancel.is_cancelled() {
        bail!("script execution cancelled");
    }

    let result = match outcome.value {
        Ok(value) => ScriptResult {
            value,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            tool_calls: Vec::new(),
        },
        Err(message) => ScriptResult {
            value: message,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            tool_calls: outcome.trace,
        },
    };

    Ok(ToolCallResult::success(serde_json::to_string(&result)?))
}

/// Run one script in a fresh engine context on the current (blocking)
/// thread. Installs the bridge state, evaluates the prelude and the
/// wrapped script, and always uninstalls the state before returning.
fn run_in_engine(prelude: &str, script: &str, env: ScriptEnv) -> Result<EngineOutcome> {
    SCRIPT_ENV.with(|cell| *cell.borrow_mut() = Some(env));

    let evaluated = (|| -> Result<Result<String, String>> {
        let mut context = Context::default();
        context
            .register_global_callable(
                js_string!("__tool_call"),
                2,
                NativeFunction::from_fn_ptr(host_tool_call),
            )
            .map_err(|e| anyhow!("failed to install tool bridge: {e}"))?;
        context
            .register_global_callable(
                js_string!("__console_write"),
                2,
                NativeFunction::from_fn_ptr(host_console_write),
            )
            .map_err(|e| anyhow!("failed to install console bridge: {e}"))?;
        context
            .eval(Source::from_bytes(prelude))
            .map_err(|e| anyhow!("failed to install tool stubs: {e}"))?;

        let wrapped = functions::wrap_script(script);
        match context.eval(Source::from_bytes(&wrapped)) {
            Ok(value) => {
                let text = value
                    .to_string(&mut context)
                    .map(|s| s.to_std_string_escaped())
                    .unwrap_or_default();
                Ok(Ok(text))
            }
            Err(err) => Ok(Err(js_error_message(err, &mut context))),
        }
    })();

    let env = SCRIPT_ENV
        .with(|cell| cell.borrow_mut().take())
        .expect("script environment still installed");
    let value = evaluated?;

    Ok(EngineOutcome {
        value,
        stdout: env.stdout,
        stderr: env.stderr,
        trace: env.trace,
    })
}

fn js_error_message(err: JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}

/// Host side of a scripted tool call. Records the trace entry, forwards
/// the call to the pump, and either returns the reply (a JSON document
/// the stub parses) or throws the failure back into the script.
fn host_tool_call(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let name = args
        .get_or_undefined(0)
        .to_string(context)?
        .to_std_string_escaped();
    let json_args = args
        .get_or_undefined(1)
        .to_string(context)?
        .to_std_string_escaped();
    let decoded: serde_json::Value =
        serde_json::from_str(&json_args).unwrap_or(serde_json::Value::Null);

    let bridged: Result<String, String> = SCRIPT_ENV.with(|cell| {
        let mut slot = cell.borrow_mut();
        let env = slot.as_mut().ok_or("tool bridge not installed")?;

        if env.cancel.is_cancelled() {
            return Err("script execution cancelled".to_string());
        }

        env.trace.push(ToolTrace {
            name: name.clone(),
            arguments: decoded,
            result: String::new(),
            error: String::new(),
        });

        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        let call = ToolCall::new(
            format!("codemode-{}", uuid::Uuid::new_v4()),
            name.clone(),
            json_args.clone(),
        );
        env.dispatch
            .blocking_send(BridgeRequest {
                call,
                reply: reply_tx,
            })
            .map_err(|_| "tool bridge closed".to_string())?;
        let reply = reply_rx
            .recv()
            .map_err(|_| "tool bridge closed".to_string())?;

        let entry = env.trace.last_mut().expect("trace entry just pushed");
        match reply {
            Ok(result) => {
                if let Some(error) = result.error {
                    entry.error = error.clone();
                    Err(error)
                } else if env.structured.contains(&name) {
                    match serde_json::from_str::<serde_json::Value>(&result.output) {
                        Ok(_) => {
                            entry.result = result.output.clone();
                            Ok(result.output)
                        }
                        Err(e) => {
                            let message = format!("tool '{name}' returned invalid JSON: {e}");
                            entry.error = message.clone();
                            Err(message)
                        }
                    }
                } else {
                    entry.result = result.output.clone();
                    Ok(serde_json::to_string(&result.output)
                        .unwrap_or_else(|_| "\"\"".to_string()))
                }
            }
            Err(error) => {
                entry.error = error.clone();
                Err(error)
            }
        }
    });

    match bridged {
        Ok(reply) => Ok(JsValue::from(JsString::from(reply.as_str()))),
        Err(message) => Err(JsNativeError::error().with_message(message).into()),
    }
}

/// Host side of the captured console: stream 1 is stdout, 2 is stderr.
fn host_console_write(
    _this: &JsValue,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let stream = args.get_or_undefined(0).to_number(context)? as i64;
    let text = args
        .get_or_undefined(1)
        .to_string(context)?
        .to_std_string_escaped();
    SCRIPT_ENV.with(|cell| {
        if let Some(env) = cell.borrow_mut().as_mut() {
            if stream == 2 {
                env.stderr.push_str(&text);
            } else {
                env.stdout.push_str(&text);
            }
        }
    });
    Ok(JsValue::undefined())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
