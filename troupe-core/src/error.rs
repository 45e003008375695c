//! Service-Boundary Errors
//!
//! Typed error kinds surfaced by the service manager and the runtime so
//! callers can distinguish validation problems, resource exhaustion,
//! provider failures, and cancellation. Internals use `anyhow` and are
//! wrapped at the boundary.

/// Errors surfaced by the public runtime and service-manager operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A client with this id already exists.
    #[error("client '{0}' already exists")]
    ClientExists(String),

    /// No client registered under this id.
    #[error("client '{0}' not found")]
    ClientNotFound(String),

    /// The session does not exist under the given client.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// The per-client open-session cap was reached. Retry after closing
    /// a session.
    #[error("session limit reached ({max} open sessions)")]
    SessionLimit { max: usize },

    /// A turn is already executing on this session.
    #[error("session '{0}' is busy with another turn")]
    SessionBusy(String),

    /// Malformed caller input (arguments, script parameter, spec ref).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The agent-spec reference did not resolve to anything.
    #[error("unknown agent spec '{0}'")]
    UnknownAgentSpec(String),

    /// The model provider failed after the retry budget was spent.
    #[error("model provider failure: {0}")]
    Provider(anyhow::Error),

    /// The operation's cancellation scope fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Invariant violation: corrupted spec, inconsistent team, etc.
    #[error("fatal: {0}")]
    Fatal(anyhow::Error),
}

impl Error {
    /// Whether the caller can recover by freeing resources and retrying.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::SessionLimit { .. })
    }
}
