//! Executor
//!
//! Binds a materialized [`Team`] to a working directory and runtime
//! configuration, producing [`Runtime`] values and fresh sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::runtime::Runtime;
use crate::session::Session;
use crate::team::Team;

/// Factory for runtimes and sessions bound to one working directory.
pub struct Executor {
    working_dir: PathBuf,
    config: RuntimeConfig,
}

impl Executor {
    pub fn new(working_dir: impl Into<PathBuf>, config: RuntimeConfig) -> Self {
        Self {
            working_dir: working_dir.into(),
            config,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Produce a runtime driving the given team.
    pub fn bind(&self, team: Arc<Team>) -> Runtime {
        Runtime::new(team, self.working_dir.clone(), self.config.clone())
    }

    /// Create a fresh session recorded against the given spec reference.
    pub fn new_session(&self, agent_spec: &str) -> Session {
        Session::new(agent_spec, self.working_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_inherit_the_working_dir() {
        let executor = Executor::new("/tmp/work", RuntimeConfig::default());
        let session = executor.new_session("team.toml");
        assert_eq!(session.working_dir, PathBuf::from("/tmp/work"));
        assert_eq!(session.agent_spec, "team.toml");
    }
}
