use thiserror::Error;

/// Failures from the browser-automation collaborator.
///
/// Everything here is recoverable at the dispatcher boundary; none of these
/// may abort the dispatch loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open a conversation session: {reason}")]
    Open { reason: String },
    #[error("conversation session is no longer reachable: {reason}")]
    Unreachable { reason: String },
    #[error("failed to submit prompt text: {reason}")]
    Submit { reason: String },
}

impl SessionError {
    pub fn open(reason: impl Into<String>) -> Self {
        Self::Open {
            reason: reason.into(),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }

    pub fn submit(reason: impl Into<String>) -> Self {
        Self::Submit {
            reason: reason.into(),
        }
    }
}

/// Failure reading the text of one output block.
///
/// `Stale` means the block handle no longer resolves because the external
/// UI replaced the element; the reader re-resolves the newest block instead
/// of treating this as a hard failure.
#[derive(Debug, Error)]
pub enum BlockReadError {
    #[error("output block went stale")]
    Stale,
    #[error("failed to read output block: {reason}")]
    Failed { reason: String },
}

/// Failures from the chat-platform collaborator. Always swallowed by the
/// core (best-effort UI hygiene), surfaced only in debug logs.
#[derive(Debug, Error)]
#[error("chat gateway call failed: {reason}")]
pub struct GatewayError {
    pub reason: String,
}

impl GatewayError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
