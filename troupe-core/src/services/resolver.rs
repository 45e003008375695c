//! Agent-Spec Resolver
//!
//! Materializes [`Team`] values from agent-spec references: a file name
//! in the agents directory, an absolute path, or a `sha256:<hex>`
//! reference into the content store. Specs are TOML documents; model
//! bindings and tool sets are produced by injected factories, so the
//! resolver stays independent of provider wire clients.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::info;

use crate::agent::Agent;
use crate::error::Error;
use crate::provider::ModelClient;
use crate::services::store::ContentStore;
use crate::team::Team;
use crate::tools::ToolSet;

/// Produces model clients for the `model` references named in specs.
pub trait ModelFactory: Send + Sync {
    fn create(&self, model: &str) -> anyhow::Result<Arc<dyn ModelClient>>;
}

/// Produces a fresh tool set instance per materialized agent.
pub type ToolSetFactory = Arc<dyn Fn() -> Arc<dyn ToolSet> + Send + Sync>;

// ---------------------------------------------------------------------------
// Spec file format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TeamSpec {
    #[serde(default)]
    name: Option<String>,
    root: String,
    agents: HashMap<String, AgentSpec>,
}

#[derive(Debug, Deserialize)]
struct AgentSpec {
    #[serde(default)]
    description: String,
    #[serde(default)]
    instructions: String,
    model: String,
    #[serde(default)]
    toolsets: Vec<String>,
    #[serde(default)]
    sub_agents: Vec<String>,
    #[serde(default)]
    code_mode: bool,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Turns agent-spec references into materialized teams.
pub struct Resolver {
    agents_dir: PathBuf,
    store: ContentStore,
    models: Arc<dyn ModelFactory>,
    toolsets: HashMap<String, ToolSetFactory>,
}

impl Resolver {
    pub fn new(
        agents_dir: impl Into<PathBuf>,
        store: ContentStore,
        models: Arc<dyn ModelFactory>,
    ) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            store,
            models,
            toolsets: HashMap::new(),
        }
    }

    /// Register a tool set under the name specs refer to it by.
    pub fn register_toolset(&mut self, name: impl Into<String>, factory: ToolSetFactory) {
        self.toolsets.insert(name.into(), factory);
    }

    /// Resolve a spec reference into a team.
    pub async fn resolve(&self, spec_ref: &str) -> Result<Arc<Team>, Error> {
        let text = self.load(spec_ref).await?;

        let spec: TeamSpec = toml::from_str(&text).map_err(|e| {
            Error::Fatal(anyhow!("corrupted agent spec '{spec_ref}': {e}"))
        })?;

        let mut agents = Vec::with_capacity(spec.agents.len());
        for (name, agent_spec) in spec.agents {
            agents.push(self.materialize(&name, agent_spec)?);
        }

        let team_name = spec.name.unwrap_or_else(|| spec_ref.to_string());
        let team = Team::new(team_name, spec.root, agents).map_err(Error::Fatal)?;
        info!(spec = %spec_ref, team = %team.name, "resolved agent spec");
        Ok(Arc::new(team))
    }

    async fn load(&self, spec_ref: &str) -> Result<String, Error> {
        if spec_ref.is_empty() {
            return Err(Error::InvalidArguments("empty agent spec reference".into()));
        }

        if let Some(digest) = spec_ref.strip_prefix("sha256:") {
            return match self.store.get(digest).await {
                Ok(Some(text)) => Ok(text),
                Ok(None) => Err(Error::UnknownAgentSpec(spec_ref.to_string())),
                Err(e) => Err(Error::Fatal(e)),
            };
        }

        let path = PathBuf::from(spec_ref);
        let path = if path.is_absolute() {
            path
        } else {
            self.agents_dir.join(path)
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::UnknownAgentSpec(spec_ref.to_string()))
            }
            Err(e) => Err(Error::Fatal(
                anyhow!(e).context(format!("failed to read agent spec {}", path.display())),
            )),
        }
    }

    fn materialize(&self, name: &str, spec: AgentSpec) -> Result<Agent, Error> {
        let model = self
            .models
            .create(&spec.model)
            .map_err(|e| Error::Fatal(e.context(format!("agent '{name}'"))))?;

        let mut builder = Agent::builder(name)
            .description(spec.description)
            .instructions(spec.instructions)
            .model(model)
            .code_mode(spec.code_mode);

        for toolset_name in &spec.toolsets {
            let factory = self.toolsets.get(toolset_name).ok_or_else(|| {
                Error::Fatal(anyhow!(
                    "agent '{name}' references unknown toolset '{toolset_name}'"
                ))
            })?;
            builder = builder.toolset(factory());
        }

        for sub in spec.sub_agents {
            builder = builder.sub_agent(sub);
        }

        builder.build().map_err(Error::Fatal)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ModelInfo, ModelResponse, StopReason, StreamCallback, TokenUsage};
    use crate::tools::builtin::TodoToolSet;
    use crate::types::{Message, ToolDescriptor};
    use async_trait::async_trait;

    struct StubModel(String);

    #[async_trait]
    impl ModelClient for StubModel {
        fn name(&self) -> &str {
            &self.0
        }
        async fn complete(
            &self,
            _: &[Message],
            _: &[ToolDescriptor],
            _: Option<StreamCallback>,
        ) -> anyhow::Result<ModelResponse> {
            Ok(ModelResponse {
                content: "ok".into(),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }
        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                name: self.0.clone(),
                max_context_tokens: 4096,
                max_output_tokens: 1024,
                provider_name: "stub".into(),
            }
        }
    }

    struct StubFactory;

    impl ModelFactory for StubFactory {
        fn create(&self, model: &str) -> anyhow::Result<Arc<dyn ModelClient>> {
            Ok(Arc::new(StubModel(model.to_string())))
        }
    }

    const SPEC: &str = r#"
        root = "assistant"

        [agents.assistant]
        description = "General helper"
        instructions = "You are helpful."
        model = "mock-small"
        toolsets = ["todo"]
        sub_agents = ["researcher"]

        [agents.researcher]
        instructions = "You research."
        model = "mock-large"
        code_mode = true
        toolsets = ["todo"]
    "#;

    fn resolver(agents_dir: &std::path::Path, store_dir: &std::path::Path) -> Resolver {
        let mut resolver = Resolver::new(
            agents_dir,
            ContentStore::new(store_dir),
            Arc::new(StubFactory),
        );
        resolver.register_toolset("todo", Arc::new(|| Arc::new(TodoToolSet::new())));
        resolver
    }

    #[tokio::test]
    async fn resolves_file_reference() {
        let agents = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        std::fs::write(agents.path().join("team.toml"), SPEC).unwrap();

        let team = resolver(agents.path(), store.path())
            .resolve("team.toml")
            .await
            .unwrap();

        assert_eq!(team.root(), "assistant");
        let assistant = team.agent("assistant").unwrap();
        assert_eq!(assistant.model.name(), "mock-small");
        assert_eq!(assistant.sub_agents, vec!["researcher"]);
        assert_eq!(assistant.toolsets.len(), 1);
    }

    #[tokio::test]
    async fn code_mode_agent_gets_the_script_tool() {
        let agents = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        std::fs::write(agents.path().join("team.toml"), SPEC).unwrap();

        let team = resolver(agents.path(), store.path())
            .resolve("team.toml")
            .await
            .unwrap();

        let researcher = team.agent("researcher").unwrap();
        let tools = researcher.toolsets[0].tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "run_tools_with_javascript");
    }

    #[tokio::test]
    async fn resolves_content_hash_reference() {
        let agents = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let resolver = resolver(agents.path(), store_dir.path());

        let digest = ContentStore::new(store_dir.path()).put(SPEC).await.unwrap();
        let team = resolver
            .resolve(&format!("sha256:{digest}"))
            .await
            .unwrap();
        assert_eq!(team.root(), "assistant");
    }

    #[tokio::test]
    async fn unknown_reference_is_distinct() {
        let agents = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let resolver = resolver(agents.path(), store.path());

        let err = resolver.resolve("missing.toml").await.err().unwrap();
        assert!(matches!(err, Error::UnknownAgentSpec(_)));

        let err = resolver
            .resolve(&format!("sha256:{}", "0".repeat(64)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownAgentSpec(_)));
    }

    #[tokio::test]
    async fn corrupted_spec_is_fatal() {
        let agents = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        std::fs::write(agents.path().join("bad.toml"), "root = [not toml").unwrap();

        let err = resolver(agents.path(), store.path())
            .resolve("bad.toml")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Fatal(_)));
    }

    #[tokio::test]
    async fn unknown_toolset_is_fatal() {
        let agents = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        std::fs::write(
            agents.path().join("team.toml"),
            r#"
            root = "a"
            [agents.a]
            model = "m"
            toolsets = ["nope"]
            "#,
        )
        .unwrap();

        let err = resolver(agents.path(), store.path())
            .resolve("team.toml")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("nope"));
    }
}
