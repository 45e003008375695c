//! Service Manager
//!
//! Multi-tenant front door over the runtime: each client owns a disjoint
//! set of sessions, capped in number and evicted after idling past the
//! TTL. Turns are strictly serialized per session; a second send on a
//! busy session is rejected rather than interleaved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::runtime::{Runtime, TurnResult};
use crate::services::executor::Executor;
use crate::services::resolver::Resolver;
use crate::session::{Session, SessionId, SessionInfo};
use crate::tools::ToolSet;
use crate::types::Message;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    runtime: Arc<Runtime>,
    toolsets: Vec<Arc<dyn ToolSet>>,
    cancel: CancellationToken,
}

struct ClientEntry {
    id: String,
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

/// Multi-tenant session registry with TTL eviction and per-client caps.
pub struct Manager {
    clients: Arc<Mutex<HashMap<String, Arc<ClientEntry>>>>,
    resolver: Arc<Resolver>,
    executor: Arc<Executor>,
    session_ttl: Duration,
    max_sessions: usize,
    shutdown: CancellationToken,
}

impl Manager {
    /// Create a manager and start its background evictor.
    pub fn new(
        resolver: Arc<Resolver>,
        executor: Arc<Executor>,
        session_ttl: Duration,
        max_sessions: usize,
    ) -> Self {
        let clients: Arc<Mutex<HashMap<String, Arc<ClientEntry>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        spawn_evictor(clients.clone(), session_ttl, shutdown.clone());

        Self {
            clients,
            resolver,
            executor,
            session_ttl,
            max_sessions,
            shutdown,
        }
    }

    /// Stop the background evictor. Sessions stay open.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// The idle threshold after which sessions are evicted.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// The per-client open-session cap.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    // -- clients ------------------------------------------------------------

    /// Register a client. Fails if the id is taken.
    pub async fn create_client(&self, client_id: &str) -> Result<(), Error> {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(client_id) {
            return Err(Error::ClientExists(client_id.to_string()));
        }
        clients.insert(
            client_id.to_string(),
            Arc::new(ClientEntry {
                id: client_id.to_string(),
                sessions: Mutex::new(HashMap::new()),
            }),
        );
        info!(client_id, "created client");
        Ok(())
    }

    /// Remove a client, tearing down all of its sessions.
    pub async fn remove_client(&self, client_id: &str) -> Result<(), Error> {
        let client = self
            .clients
            .lock()
            .await
            .remove(client_id)
            .ok_or_else(|| Error::ClientNotFound(client_id.to_string()))?;

        let entries: Vec<Arc<SessionEntry>> =
            client.sessions.lock().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            teardown(&entry).await;
        }
        info!(client_id, "removed client");
        Ok(())
    }

    // -- sessions -----------------------------------------------------------

    /// Create a session for a client from an agent-spec reference.
    /// Enforces the per-client session cap.
    pub async fn create_session(
        &self,
        client_id: &str,
        agent_spec: &str,
    ) -> Result<SessionId, Error> {
        let client = self.client(client_id).await?;
        let mut sessions = client.sessions.lock().await;

        if sessions.len() >= self.max_sessions {
            return Err(Error::SessionLimit {
                max: self.max_sessions,
            });
        }

        let team = self.resolver.resolve(agent_spec).await?;

        let toolsets = team.toolsets();
        for toolset in &toolsets {
            if let Err(e) = toolset.start().await {
                // Idempotent stop unwinds whatever came online.
                for started in &toolsets {
                    let _ = started.stop().await;
                }
                return Err(Error::Fatal(e.context("failed to start tool set")));
            }
        }

        let runtime = Arc::new(self.executor.bind(team));
        let session = self.executor.new_session(agent_spec);
        let session_id = session.id.clone();

        sessions.insert(
            session_id.clone(),
            Arc::new(SessionEntry {
                session: Arc::new(Mutex::new(session)),
                runtime,
                toolsets,
                cancel: CancellationToken::new(),
            }),
        );

        info!(client_id, session_id = %session_id, agent_spec, "created session");
        Ok(session_id)
    }

    /// List session metadata for a client.
    pub async fn list_sessions(&self, client_id: &str) -> Result<Vec<SessionInfo>, Error> {
        let client = self.client(client_id).await?;
        let entries: Vec<Arc<SessionEntry>> =
            client.sessions.lock().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(entries.len());
        for entry in entries {
            infos.push(entry.session.lock().await.info());
        }
        infos.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(infos)
    }

    /// Metadata for one session. Not-found when the session does not
    /// belong to this client, even if another client owns the id.
    pub async fn get_session_info(
        &self,
        client_id: &str,
        session_id: &str,
    ) -> Result<SessionInfo, Error> {
        let entry = self.session(client_id, session_id).await?;
        let info = entry.session.lock().await.info();
        Ok(info)
    }

    /// The last `limit` messages of a session (all when `limit` is 0).
    pub async fn get_session_history(
        &self,
        client_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, Error> {
        let entry = self.session(client_id, session_id).await?;
        let session = entry.session.lock().await;
        Ok(session.history(limit).to_vec())
    }

    /// Close a session and stop its tool sets.
    pub async fn close_session(&self, client_id: &str, session_id: &str) -> Result<(), Error> {
        let client = self.client(client_id).await?;
        let entry = client
            .sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        teardown(&entry).await;
        info!(client_id, session_id, "closed session");
        Ok(())
    }

    /// Run one turn on a session, streaming messages as they append.
    ///
    /// The turn executes in its own cancellable scope; the returned
    /// stream yields every appended message and reports the turn outcome
    /// on [`SessionStream::finish`]. Fails with [`Error::SessionBusy`]
    /// when a turn is already executing.
    pub async fn send_message(
        &self,
        client_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<SessionStream, Error> {
        if text.is_empty() {
            return Err(Error::InvalidArguments("empty message".into()));
        }

        let entry = self.session(client_id, session_id).await?;
        let guard = entry
            .session
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::SessionBusy(session_id.to_string()))?;

        let (tx, rx) = mpsc::channel::<Message>(64);
        let cancel = entry.cancel.child_token();
        let runtime = entry.runtime.clone();
        let text = text.to_string();

        debug!(client_id, session_id, "starting turn");
        let turn_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut session = guard;
            let user = Message::user(text);
            session.append(user.clone());
            let _ = tx.send(user).await;
            runtime
                .run_turn(&mut session, turn_cancel, None, Some(tx))
                .await
        });

        Ok(SessionStream { rx, handle, cancel })
    }

    // -- lookups ------------------------------------------------------------

    async fn client(&self, client_id: &str) -> Result<Arc<ClientEntry>, Error> {
        self.clients
            .lock()
            .await
            .get(client_id)
            .cloned()
            .ok_or_else(|| Error::ClientNotFound(client_id.to_string()))
    }

    async fn session(
        &self,
        client_id: &str,
        session_id: &str,
    ) -> Result<Arc<SessionEntry>, Error> {
        let client = self.client(client_id).await?;
        let sessions = client.sessions.lock().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// SessionStream
// ---------------------------------------------------------------------------

/// Live view of an executing turn: messages as they append, then the
/// turn outcome.
pub struct SessionStream {
    rx: mpsc::Receiver<Message>,
    handle: tokio::task::JoinHandle<Result<TurnResult, Error>>,
    cancel: CancellationToken,
}

impl SessionStream {
    /// Next appended message; `None` once the turn is over.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Cancel the in-flight turn.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the turn to finish and return its outcome.
    pub async fn finish(self) -> Result<TurnResult, Error> {
        self.handle
            .await
            .map_err(|e| Error::Fatal(anyhow!("turn task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Eviction
// ---------------------------------------------------------------------------

async fn teardown(entry: &SessionEntry) {
    entry.cancel.cancel();
    for toolset in &entry.toolsets {
        if let Err(e) = toolset.stop().await {
            warn!(err = %e, "tool set stop failed during session teardown");
        }
    }
}

fn spawn_evictor(
    clients: Arc<Mutex<HashMap<String, Arc<ClientEntry>>>>,
    ttl: Duration,
    shutdown: CancellationToken,
) {
    let tick = (ttl / 4).max(Duration::from_millis(50));
    tokio::spawn(async move {
        debug!(ttl_secs = ttl.as_secs_f64(), "session evictor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(tick) => {}
            }

            let now = chrono::Utc::now();
            let client_list: Vec<Arc<ClientEntry>> =
                clients.lock().await.values().cloned().collect();

            for client in client_list {
                let mut expired: Vec<(SessionId, Arc<SessionEntry>)> = Vec::new();
                {
                    let mut sessions = client.sessions.lock().await;
                    sessions.retain(|id, entry| {
                        // A held turn lock means the session is mid-turn;
                        // skip it and retry on the next tick.
                        match entry.session.try_lock() {
                            Ok(session) => {
                                let idle = now
                                    .signed_duration_since(session.last_used_at)
                                    .to_std()
                                    .unwrap_or_default();
                                if idle > ttl {
                                    expired.push((id.clone(), entry.clone()));
                                    false
                                } else {
                                    true
                                }
                            }
                            Err(_) => true,
                        }
                    });
                }

                for (id, entry) in expired {
                    info!(client_id = %client.id, session_id = %id, "evicting idle session");
                    teardown(&entry).await;
                }
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
