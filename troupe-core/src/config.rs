//! Configuration
//!
//! TOML-based runtime configuration: turn-loop limits, retry policy,
//! session TTL and caps, and the optional project prompt file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

/// Top-level runtime configuration (maps to TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum tool-call iterations per turn (default 25).
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: usize,

    /// Optional prompt file name loaded from `$HOME` and the working
    /// directory and appended to every agent's system prompt.
    #[serde(default)]
    pub prompt_file: Option<String>,

    /// Idle-session eviction threshold in seconds (default 3600).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Maximum open sessions per client (default 10).
    #[serde(default = "default_max_sessions")]
    pub max_sessions_per_client: usize,

    /// Retry policy for model-provider calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_iterations(),
            prompt_file: None,
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions_per_client: default_max_sessions(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_iterations() -> usize {
    25
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_max_sessions() -> usize {
    10
}

/// Retry policy configuration for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial call (default 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds (default 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Session TTL as a [`Duration`].
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
