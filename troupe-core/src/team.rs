//! Team
//!
//! A named graph of agents with one designated root. Teams are shared
//! immutable values; transfers between agents are name lookups into the
//! team, so no cyclic references are needed.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::agent::Agent;

/// An immutable set of agents with a designated root.
pub struct Team {
    /// Team name (informational).
    pub name: String,
    root: String,
    agents: HashMap<String, Arc<Agent>>,
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Team {
    /// Build a team, validating that the root exists, names are unique,
    /// and every sub-agent reference resolves.
    pub fn new(name: impl Into<String>, root: impl Into<String>, agents: Vec<Agent>) -> Result<Self> {
        let name = name.into();
        let root = root.into();

        let mut map: HashMap<String, Arc<Agent>> = HashMap::new();
        for agent in agents {
            if map.contains_key(&agent.name) {
                bail!("duplicate agent name '{}' in team '{}'", agent.name, name);
            }
            map.insert(agent.name.clone(), Arc::new(agent));
        }

        if !map.contains_key(&root) {
            bail!("root agent '{}' not found in team '{}'", root, name);
        }

        for agent in map.values() {
            for sub in &agent.sub_agents {
                if !map.contains_key(sub) {
                    bail!(
                        "agent '{}' references unknown sub-agent '{}'",
                        agent.name,
                        sub
                    );
                }
            }
        }

        Ok(Self {
            name,
            root,
            agents: map,
        })
    }

    /// Convenience constructor for a single-agent team.
    pub fn solo(agent: Agent) -> Result<Self> {
        let root = agent.name.clone();
        let name = agent.name.clone();
        Self::new(name, root, vec![agent])
    }

    /// Name of the root agent.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.get(name)
    }

    /// The root agent.
    pub fn root_agent(&self) -> &Arc<Agent> {
        self.agents
            .get(&self.root)
            .expect("root agent validated at construction")
    }

    /// All agent names.
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(|s| s.as_str()).collect()
    }

    /// Every distinct tool set in the team, for lifecycle fan-out.
    pub fn toolsets(&self) -> Vec<Arc<dyn crate::tools::ToolSet>> {
        self.agents
            .values()
            .flat_map(|agent| agent.toolsets.iter().cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelClient, ModelInfo, ModelResponse, StopReason, StreamCallback, TokenUsage};
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
                content: String::new(),
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

    fn agent(name: &str, subs: &[&str]) -> Agent {
        let mut builder = Agent::builder(name).model(std::sync::Arc::new(DummyModel));
        for sub in subs {
            builder = builder.sub_agent(*sub);
        }
        builder.build().unwrap()
    }

    #[test]
    fn valid_team() {
        let team = Team::new(
            "support",
            "triage",
            vec![agent("triage", &["expert"]), agent("expert", &[])],
        )
        .unwrap();
        assert_eq!(team.root(), "triage");
        assert!(team.agent("expert").is_some());
        assert_eq!(team.root_agent().name, "triage");
    }

    #[test]
    fn missing_root_rejected() {
        let err = Team::new("t", "nope", vec![agent("a", &[])]).err().unwrap();
        assert!(err.to_string().contains("root agent"));
    }

    #[test]
    fn unknown_sub_agent_rejected() {
        let err = Team::new("t", "a", vec![agent("a", &["ghost"])])
            .err()
            .unwrap();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = Team::new("t", "a", vec![agent("a", &[]), agent("a", &[])])
            .err()
            .unwrap();
        assert!(err.to_string().contains("duplicate"));
    }
}
