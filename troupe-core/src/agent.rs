//! Agent Definition
//!
//! An agent is an immutable bundle of instructions, a model binding, tool
//! sets, and the names of the sub-agents it may transfer work to. Agents
//! are built once and shared read-only across sessions.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::provider::ModelClient;
use crate::tools::codemode::CodeModeToolSet;
use crate::tools::{CompositeToolSet, ToolSet};

/// Immutable agent definition.
pub struct Agent {
    /// Unique name within its team.
    pub name: String,
    /// Short description used when other agents pick a transfer target.
    pub description: String,
    /// System instructions.
    pub instructions: String,
    /// Bound model client.
    pub model: Arc<dyn ModelClient>,
    /// Tool sets available to this agent.
    pub toolsets: Vec<Arc<dyn ToolSet>>,
    /// Names of team members this agent can transfer to.
    pub sub_agents: Vec<String>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("toolsets", &self.toolsets.len())
            .field("sub_agents", &self.sub_agents)
            .finish()
    }
}

impl Agent {
    /// Start building an agent with the given name.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            model: None,
            toolsets: Vec::new(),
            sub_agents: Vec::new(),
            code_mode: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentBuilder
// ---------------------------------------------------------------------------

/// Typed builder for constructing an [`Agent`].
pub struct AgentBuilder {
    name: String,
    description: String,
    instructions: String,
    model: Option<Arc<dyn ModelClient>>,
    toolsets: Vec<Arc<dyn ToolSet>>,
    sub_agents: Vec<String>,
    code_mode: bool,
}

impl AgentBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Bind the model client. Required.
    pub fn model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn toolset(mut self, toolset: Arc<dyn ToolSet>) -> Self {
        self.toolsets.push(toolset);
        self
    }

    pub fn sub_agent(mut self, name: impl Into<String>) -> Self {
        self.sub_agents.push(name.into());
        self
    }

    /// Collapse the agent's tool sets into a single Code-Mode scripting
    /// tool at build time.
    pub fn code_mode(mut self, enabled: bool) -> Self {
        self.code_mode = enabled;
        self
    }

    /// Validate required slots and construct the immutable agent.
    pub fn build(self) -> Result<Agent> {
        if self.name.is_empty() {
            bail!("agent name is required");
        }
        let model = match self.model {
            Some(model) => model,
            None => bail!("agent '{}' has no model binding", self.name),
        };

        let toolsets = if self.code_mode && !self.toolsets.is_empty() {
            let inner: Arc<dyn ToolSet> = Arc::new(CompositeToolSet::new(self.toolsets));
            vec![Arc::new(CodeModeToolSet::wrap(inner)) as Arc<dyn ToolSet>]
        } else {
            self.toolsets
        };

        Ok(Agent {
            name: self.name,
            description: self.description,
            instructions: self.instructions,
            model,
            toolsets,
            sub_agents: self.sub_agents,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelInfo, ModelResponse, StopReason, StreamCallback, TokenUsage};
    use crate::tools::StaticToolSet;
    use crate::types::{Message, ToolDescriptor};
    use async_trait::async_trait;

    struct DummyModel;

    #[async_trait]
    impl ModelClient for DummyModel {
        fn name(&self) -> &str {
            "dummy"
        }
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
            _stream_cb: Option<StreamCallback>,
        ) -> Result<ModelResponse> {
            Ok(ModelResponse {
                content: "ok".into(),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }
        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                name: "dummy".into(),
                max_context_tokens: 4096,
                max_output_tokens: 1024,
                provider_name: "dummy".into(),
            }
        }
    }

    #[test]
    fn build_requires_model() {
        let result = Agent::builder("helper").build();
        let err = result.err().expect("expected error");
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn build_success() {
        let agent = Agent::builder("helper")
            .instructions("You are helpful.")
            .model(Arc::new(DummyModel))
            .sub_agent("researcher")
            .build()
            .unwrap();
        assert_eq!(agent.name, "helper");
        assert_eq!(agent.sub_agents, vec!["researcher"]);
    }

    #[tokio::test]
    async fn code_mode_collapses_toolsets() {
        let agent = Agent::builder("helper")
            .model(Arc::new(DummyModel))
            .toolset(Arc::new(StaticToolSet::new(vec![])))
            .toolset(Arc::new(StaticToolSet::new(vec![])))
            .code_mode(true)
            .build()
            .unwrap();

        assert_eq!(agent.toolsets.len(), 1);
        let tools = agent.toolsets[0].tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "run_tools_with_javascript");
    }
}
