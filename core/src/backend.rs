use std::sync::Arc;

use async_trait::async_trait;

use crate::actor::ActorId;
use crate::errors::BlockReadError;
use crate::errors::SessionError;

/// Observable signals on the external conversation page, exposed to the
/// detector as named booleans rather than raw DOM queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    /// A transient "generating" affordance; visible while output streams.
    Busy,
    /// A retry affordance, shown when the external side wants a re-ask.
    Retry,
    /// Usage-limit text.
    UsageLimit,
    /// Generic failure banner.
    Failure,
}

/// One output block produced by the external conversation. Handles can go
/// stale when the external UI replaces the underlying element; reads
/// surface that as [`BlockReadError::Stale`] so callers can re-resolve.
#[async_trait]
pub trait OutputBlock: Send + Sync {
    async fn text(&self) -> Result<String, BlockReadError>;
}

/// One actor's live conversation with the external web application.
#[async_trait]
pub trait ConversationSession: Send + Sync {
    /// Cheap liveness probe; `false` means the handle must be recreated.
    async fn probe(&self) -> bool;

    /// Types the prompt into the conversation and activates it.
    async fn submit(&self, text: &str) -> Result<(), SessionError>;

    /// Whether the named indicator is currently visible.
    async fn indicator(&self, kind: IndicatorKind) -> Result<bool, SessionError>;

    /// All output blocks currently present, oldest first.
    async fn output_blocks(&self) -> Result<Vec<Arc<dyn OutputBlock>>, SessionError>;

    /// Forces the external side to abandon any streaming output.
    async fn reset(&self) -> Result<(), SessionError>;

    /// Releases the underlying resources. Best-effort.
    async fn close(&self);
}

/// Factory for per-actor conversation sessions.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    async fn open_session(
        &self,
        actor: ActorId,
    ) -> Result<Arc<dyn ConversationSession>, SessionError>;
}
