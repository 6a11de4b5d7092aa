use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::actor::ActorId;
use crate::backend::ConversationBackend;
use crate::backend::ConversationSession;
use crate::errors::SessionError;

struct SessionEntry {
    session: Arc<dyn ConversationSession>,
    opened_at: Instant,
}

/// Owns one conversation session per actor; lazily creates, validates, and
/// recycles them.
///
/// At most one in-flight operation per handle is guaranteed by the
/// single-consumer dispatcher, not by locking here.
pub struct SessionRegistry {
    backend: Arc<dyn ConversationBackend>,
    sessions: Mutex<HashMap<ActorId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the actor's live session, creating or transparently
    /// recreating it as needed. Only creation failures surface.
    pub async fn acquire(
        &self,
        actor: ActorId,
    ) -> Result<Arc<dyn ConversationSession>, SessionError> {
        let existing = {
            let sessions = self.sessions.lock().await;
            sessions.get(&actor).map(|entry| Arc::clone(&entry.session))
        };

        if let Some(session) = existing {
            if session.probe().await {
                return Ok(session);
            }
            debug!(%actor, "session failed liveness probe; recreating");
            session.close().await;
            self.sessions.lock().await.remove(&actor);
        }

        let session = self.backend.open_session(actor).await?;
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            actor,
            SessionEntry {
                session: Arc::clone(&session),
                opened_at: Instant::now(),
            },
        );
        info!(%actor, "opened conversation session");
        Ok(session)
    }

    /// Explicitly discards and closes the actor's session, if any. The next
    /// request from the actor starts a fresh conversation.
    pub async fn discard(&self, actor: ActorId) {
        let removed = self.sessions.lock().await.remove(&actor);
        if let Some(entry) = removed {
            debug!(%actor, age = ?entry.opened_at.elapsed(), "discarding conversation session");
            entry.session.close().await;
        }
    }

    /// Resets every live session so the external side abandons any
    /// streaming output. Used by the drain path; failures are non-fatal.
    pub async fn reset_all(&self) {
        let sessions = {
            let guard = self.sessions.lock().await;
            guard
                .iter()
                .map(|(actor, entry)| (*actor, Arc::clone(&entry.session)))
                .collect::<Vec<_>>()
        };
        for (actor, session) in sessions {
            if let Err(err) = session.reset().await {
                warn!(%actor, error = %err, "failed to reset session during drain");
            }
        }
    }

    /// Closes every session. Shutdown only.
    pub async fn close_all(&self) {
        let drained = {
            let mut guard = self.sessions.lock().await;
            guard.drain().map(|(_, entry)| entry.session).collect::<Vec<_>>()
        };
        for session in drained {
            session.close().await;
        }
    }
}
