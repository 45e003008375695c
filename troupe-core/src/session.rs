//! Session
//!
//! An append-only, timestamped message log representing one conversation.
//! Sessions never rewrite history: a turn extends the log by zero or more
//! messages. `last_used_at` tracks idle time for eviction.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Message;

/// A unique session identifier.
pub type SessionId = String;

/// One conversation bound to an agent spec and a working directory.
#[derive(Debug)]
pub struct Session {
    /// Unique session id.
    pub id: SessionId,
    /// The agent-spec reference this session was created from.
    pub agent_spec: String,
    /// Working directory tools and prompt files resolve against.
    pub working_dir: PathBuf,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last appended a message.
    pub last_used_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Session {
    pub fn new(agent_spec: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, "created session");
        Self {
            id,
            agent_spec: agent_spec.into(),
            working_dir: working_dir.into(),
            created_at: now,
            last_used_at: now,
            messages: Vec::new(),
        }
    }

    /// Append a message and bump `last_used_at`.
    pub fn append(&mut self, message: Message) {
        self.last_used_at = Utc::now();
        self.messages.push(message);
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `limit` messages in order; all of them when `limit` is 0
    /// or exceeds the log length.
    pub fn history(&self, limit: usize) -> &[Message] {
        if limit == 0 || limit >= self.messages.len() {
            &self.messages
        } else {
            &self.messages[self.messages.len() - limit..]
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Mark the session as used without appending (e.g. on reads that
    /// should keep it warm).
    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    /// Lightweight metadata snapshot for listings.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            agent_spec: self.agent_spec.clone(),
            created: self.created_at,
            last_used: self.last_used_at,
            message_count: self.messages.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session info (for listings)
// ---------------------------------------------------------------------------

/// Session metadata returned by listing and info operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub agent_spec: String,
    pub created: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub message_count: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_log_and_bumps_last_used() {
        let mut session = Session::new("team.toml", ".");
        let before = session.last_used_at;

        session.append(Message::user("hello"));
        session.append(Message::assistant("hi"));

        assert_eq!(session.message_count(), 2);
        assert!(session.last_used_at >= before);
    }

    #[test]
    fn history_returns_tail_in_order() {
        let mut session = Session::new("team.toml", ".");
        for i in 0..5 {
            session.append(Message::user(format!("m{i}")));
        }

        let tail = session.history(2);
        assert_eq!(tail.len(), 2);
        match (&tail[0].content, &tail[1].content) {
            (
                crate::types::MessageContent::Text(a),
                crate::types::MessageContent::Text(b),
            ) => {
                assert_eq!(a, "m3");
                assert_eq!(b, "m4");
            }
            other => panic!("unexpected content: {other:?}"),
        }

        assert_eq!(session.history(0).len(), 5);
        assert_eq!(session.history(100).len(), 5);
    }

    #[test]
    fn info_snapshot() {
        let mut session = Session::new("team.toml", "/tmp/work");
        session.append(Message::user("hello"));

        let info = session.info();
        assert_eq!(info.id, session.id);
        assert_eq!(info.agent_spec, "team.toml");
        assert_eq!(info.message_count, 1);
    }
}
