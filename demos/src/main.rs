//! Transcript demo: a scripted model drives one turn against the builtin
//! todo tool set in Code-Mode and the full message log is printed.
//!
//! No network access is needed — the "model" replays canned responses,
//! which is enough to watch the turn loop, the script bridge, and the
//! structured tool output work together.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use troupe_core::tools::builtin::TodoToolSet;
use troupe_core::{
    Agent, Message, MessageContent, ModelClient, ModelInfo, ModelResponse, Role, Runtime,
    RuntimeConfig, Session, StopReason, StreamCallback, Team, TokenUsage, ToolCall,
    ToolDescriptor, RUN_TOOLS_WITH_JAVASCRIPT,
};

struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _messages: &[Message],
        tools: &[ToolDescriptor],
        _stream_cb: Option<StreamCallback>,
    ) -> Result<ModelResponse> {
        info!(tool_count = tools.len(), "scripted model called");
        let mut responses = self.responses.lock().unwrap();
        Ok(responses.pop_front().unwrap_or(ModelResponse {
            content: "Nothing left to do.".into(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "scripted".into(),
            max_context_tokens: 8192,
            max_output_tokens: 1024,
            provider_name: "demo".into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let script = "\
create_todo({'description': 'Draft the report'});\n\
create_todo({'description': 'Review the numbers'});\n\
console.log('created two todos');\n\
return list_todos();";

    let responses = VecDeque::from(vec![
        ModelResponse {
            content: "Let me set that up.".into(),
            tool_calls: vec![ToolCall::new(
                "tc1",
                RUN_TOOLS_WITH_JAVASCRIPT,
                serde_json::to_string(&json!({ "script": script }))?,
            )],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        },
        ModelResponse {
            content: "Both todos are tracked; tell me when one is done.".into(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        },
    ]);

    let agent = Agent::builder("planner")
        .instructions("You plan work as todo items.")
        .model(Arc::new(ScriptedModel {
            responses: Mutex::new(responses),
        }))
        .toolset(Arc::new(TodoToolSet::new()))
        .code_mode(true)
        .build()?;

    let team = Arc::new(Team::solo(agent)?);
    let runtime = Runtime::new(team, ".", RuntimeConfig::default());

    let mut session = Session::new("demo", ".");
    session.append(Message::user("Plan the quarterly report work."));

    let result = runtime
        .run_turn(&mut session, CancellationToken::new(), None, None)
        .await?;

    println!("turn finished: {:?} after {} model calls\n", result.stop_reason, result.iterations);
    for message in session.messages() {
        print_message(message);
    }

    Ok(())
}

fn print_message(message: &Message) {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    match &message.content {
        MessageContent::Text(text) => println!("[{role}] {text}"),
        MessageContent::ToolCalls(calls) => {
            for call in calls {
                println!("[{role}] → {}({})", call.function.name, call.function.arguments);
            }
        }
        MessageContent::ToolResult(result) => {
            let body = result
                .result
                .error
                .clone()
                .unwrap_or_else(|| result.result.output.clone());
            println!("[{role}] ← {body}");
        }
        MessageContent::Transfer(transfer) => {
            println!("[{role}] ⇒ transferred to {}", transfer.target)
        }
    }
}
