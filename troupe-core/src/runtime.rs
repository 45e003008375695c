//! Runtime Turn Loop
//!
//! Drives one session against a team to a terminal state: select the
//! current agent, call its model, execute any requested tool calls in
//! provider order, feed results back, and repeat until the model produces
//! a final answer, the scope is cancelled, or a stop condition fires.
//! Transfers repoint the loop at another team member.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::provider::{StopReason, StreamCallback, TokenUsage};
use crate::retry::{with_retry, RetryPolicy};
use crate::session::Session;
use crate::system_prompt::build_system_prompt;
use crate::team::Team;
use crate::tools::{ToolContext, ToolHandler};
use crate::types::{
    Message, MessageContent, ToolCall, ToolCallResult, ToolDescriptor,
};

/// Name of the synthesized transfer tool offered to agents with
/// sub-agents.
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// A team bound to a working directory, ready to execute turns.
pub struct Runtime {
    team: Arc<Team>,
    working_dir: PathBuf,
    config: RuntimeConfig,
}

/// Result of running one turn.
#[derive(Debug)]
pub struct TurnResult {
    /// Messages appended to the session during this turn.
    pub new_messages: Vec<Message>,
    /// Accumulated token usage across all model calls.
    pub usage: TokenUsage,
    /// Final stop reason.
    pub stop_reason: StopReason,
    /// Number of model calls performed.
    pub iterations: usize,
}

impl Runtime {
    pub fn new(team: Arc<Team>, working_dir: impl Into<PathBuf>, config: RuntimeConfig) -> Self {
        Self {
            team,
            working_dir: working_dir.into(),
            config,
        }
    }

    pub fn team(&self) -> &Arc<Team> {
        &self.team
    }

    /// Run one turn on an exclusively borrowed session.
    ///
    /// Every generated message is appended to the session and, when an
    /// `events` channel is given, forwarded to it in append order.
    /// Cancellation surfaces [`Error::Cancelled`] without appending
    /// partial output.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        cancel: CancellationToken,
        stream_cb: Option<StreamCallback>,
        events: Option<tokio::sync::mpsc::Sender<Message>>,
    ) -> Result<TurnResult, Error> {
        let mut new_messages: Vec<Message> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut iterations = 0;

        let mut current = self.current_agent_name(session).to_string();
        let retry_policy = RetryPolicy::from(&self.config.retry);

        loop {
            if cancel.is_cancelled() {
                info!(session_id = %session.id, "turn cancelled");
                return Err(Error::Cancelled);
            }

            if iterations >= self.config.max_tool_iterations {
                warn!(
                    session_id = %session.id,
                    iterations,
                    max = self.config.max_tool_iterations,
                    "turn hit iteration limit"
                );
                return Ok(TurnResult {
                    new_messages,
                    usage,
                    stop_reason: StopReason::MaxTokens,
                    iterations,
                });
            }

            iterations += 1;
            debug!(session_id = %session.id, agent = %current, iteration = iterations, "turn iteration");

            let agent = self
                .team
                .agent(&current)
                .ok_or_else(|| Error::Fatal(anyhow::anyhow!("agent '{current}' not in team")))?
                .clone();

            // Assemble the provider request: system prompt, history, tools.
            let system = build_system_prompt(
                &agent,
                &self.working_dir,
                self.config.prompt_file.as_deref(),
            )
            .map_err(Error::Fatal)?;

            let mut request: Vec<Message> = vec![Message::system(system)];
            request.extend(
                session
                    .messages()
                    .iter()
                    // Transfers are runtime bookkeeping, not provider input.
                    .filter(|m| !matches!(m.content, MessageContent::Transfer(_)))
                    .cloned(),
            );

            let (descriptors, handlers) = self.collect_tools(&agent).await?;

            info!(
                session_id = %session.id,
                agent = %current,
                tool_count = descriptors.len(),
                message_count = request.len(),
                "calling model"
            );

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = with_retry(&retry_policy, "model completion", || {
                    agent.model.complete(&request, &descriptors, stream_cb.clone())
                }) => result.map_err(Error::Provider)?,
            };

            usage.add(&response.usage);

            if !response.content.is_empty() {
                let message = Message::assistant(response.content.clone());
                append(session, &events, &mut new_messages, message).await;
            }

            if response.tool_calls.is_empty() {
                debug!(session_id = %session.id, "model ended turn (no tool calls)");
                return Ok(TurnResult {
                    new_messages,
                    usage,
                    stop_reason: response.stop_reason,
                    iterations,
                });
            }

            info!(
                session_id = %session.id,
                tool_call_count = response.tool_calls.len(),
                "model returned tool calls, executing them"
            );

            // Providers occasionally emit empty argument bodies; normalize
            // to an empty object so handlers always see a JSON document.
            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|call| {
                    let mut call = call.clone();
                    if call.function.arguments.trim().is_empty()
                        || call.function.arguments.trim() == "null"
                    {
                        call.function.arguments = "{}".to_string();
                    }
                    call
                })
                .collect();

            append(
                session,
                &events,
                &mut new_messages,
                Message::tool_calls(calls.clone()),
            )
            .await;

            for call in &calls {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                if call.function.name == TRANSFER_TOOL {
                    if let Some(target) =
                        self.execute_transfer(session, &events, &mut new_messages, &agent, call)
                            .await
                    {
                        current = target;
                    }
                    continue;
                }

                let result = match handlers.get(&call.function.name) {
                    None => ToolCallResult::failure(format!(
                        "tool '{}' not found",
                        call.function.name
                    )),
                    Some(handler) => {
                        info!(
                            session_id = %session.id,
                            tool = %call.function.name,
                            id = %call.id,
                            "executing tool call"
                        );
                        let ctx = ToolContext::new(cancel.clone(), self.working_dir.clone());
                        let outcome = tokio::select! {
                            _ = cancel.cancelled() => return Err(Error::Cancelled),
                            outcome = (handler)(ctx, call.clone()) => outcome,
                        };
                        match outcome {
                            Ok(result) => result,
                            // Invocation-level failure: recorded for the
                            // model, the loop keeps going.
                            Err(e) => ToolCallResult::failure(format!("{e:#}")),
                        }
                    }
                };

                info!(
                    session_id = %session.id,
                    tool = %call.function.name,
                    is_error = result.is_error(),
                    "tool execution completed"
                );

                append(
                    session,
                    &events,
                    &mut new_messages,
                    Message::tool_result(call.id.clone(), result),
                )
                .await;
            }

            if response.stop_reason == StopReason::EndTurn {
                return Ok(TurnResult {
                    new_messages,
                    usage,
                    stop_reason: StopReason::EndTurn,
                    iterations,
                });
            }
        }
    }

    /// The agent the next iteration speaks as: the most recent transfer
    /// target, or the team root.
    fn current_agent_name<'a>(&'a self, session: &'a Session) -> &'a str {
        session
            .messages()
            .iter()
            .rev()
            .find_map(|m| match &m.content {
                MessageContent::Transfer(t) => Some(t.target.as_str()),
                _ => None,
            })
            .unwrap_or_else(|| self.team.root())
    }

    /// Flatten the agent's tool sets into provider descriptors and a
    /// dispatch table, plus the synthesized transfer tool when the agent
    /// has sub-agents.
    async fn collect_tools(
        &self,
        agent: &crate::agent::Agent,
    ) -> Result<(Vec<ToolDescriptor>, HashMap<String, ToolHandler>), Error> {
        let mut descriptors = Vec::new();
        let mut handlers: HashMap<String, ToolHandler> = HashMap::new();

        for toolset in &agent.toolsets {
            let tools = toolset.tools().await.map_err(Error::Fatal)?;
            for tool in tools {
                descriptors.push(tool.descriptor());
                handlers.insert(tool.name.clone(), tool.handler);
            }
        }

        if !agent.sub_agents.is_empty() {
            descriptors.push(transfer_descriptor(agent));
        }

        Ok((descriptors, handlers))
    }

    /// Execute a transfer tool call. Returns the new current agent on
    /// success; invalid targets are reported back to the model as a
    /// failed tool result.
    async fn execute_transfer(
        &self,
        session: &mut Session,
        events: &Option<tokio::sync::mpsc::Sender<Message>>,
        new_messages: &mut Vec<Message>,
        agent: &crate::agent::Agent,
        call: &ToolCall,
    ) -> Option<String> {
        #[derive(Deserialize)]
        struct TransferArgs {
            agent: String,
        }

        let target = match serde_json::from_str::<TransferArgs>(&call.function.arguments) {
            Ok(args) => args.agent,
            Err(e) => {
                let result =
                    ToolCallResult::failure(format!("invalid {TRANSFER_TOOL} arguments: {e}"));
                append(
                    session,
                    events,
                    new_messages,
                    Message::tool_result(call.id.clone(), result),
                )
                .await;
                return None;
            }
        };

        let allowed =
            agent.sub_agents.iter().any(|s| s == &target) && self.team.agent(&target).is_some();
        if !allowed {
            let result = ToolCallResult::failure(format!(
                "cannot transfer to unknown agent '{target}'"
            ));
            append(
                session,
                events,
                new_messages,
                Message::tool_result(call.id.clone(), result),
            )
            .await;
            return None;
        }

        info!(session_id = %session.id, from = %agent.name, to = %target, "transferring conversation");

        append(
            session,
            events,
            new_messages,
            Message::tool_result(
                call.id.clone(),
                ToolCallResult::success(format!("Transferred to {target}.")),
            ),
        )
        .await;
        append(
            session,
            events,
            new_messages,
            Message::transfer(target.clone()),
        )
        .await;

        Some(target)
    }
}

/// Descriptor for the synthesized transfer tool, enumerating the agent's
/// allowed targets in the description.
fn transfer_descriptor(agent: &crate::agent::Agent) -> ToolDescriptor {
    ToolDescriptor {
        name: TRANSFER_TOOL.to_string(),
        description: format!(
            "Hand the conversation over to another agent. Available agents: {}",
            agent.sub_agents.join(", ")
        ),
        parameters: serde_json::json!({
            "type": "object",
            "required": ["agent"],
            "properties": {
                "agent": {
                    "type": "string",
                    "description": "Name of the agent to transfer to"
                },
                "task": {
                    "type": "string",
                    "description": "Optional summary of what the target agent should do"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Append to the session, mirror into the turn's new-message list, and
/// forward to the event stream when present.
async fn append(
    session: &mut Session,
    events: &Option<tokio::sync::mpsc::Sender<Message>>,
    new_messages: &mut Vec<Message>,
    message: Message,
) {
    session.append(message.clone());
    new_messages.push(message.clone());
    if let Some(tx) = events {
        let _ = tx.send(message).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
