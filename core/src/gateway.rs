use std::fmt;

use async_trait::async_trait;

use crate::actor::Actor;
use crate::errors::GatewayError;

/// Platform-native id of the venue (channel/room) a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VenueId(pub u64);

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Venue context attached to one inbound message.
///
/// `caller_is_admin` is the platform collaborator's venue-scoped permission
/// lookup for the sending actor; `None` means the context was unavailable
/// (direct message, partial outage) and is treated as non-admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Venue {
    pub id: VenueId,
    pub caller_is_admin: Option<bool>,
}

impl Venue {
    pub fn new(id: VenueId, caller_is_admin: Option<bool>) -> Self {
        Self {
            id,
            caller_is_admin,
        }
    }
}

/// One inbound message event, already filtered for bot mentions and with
/// the mention prefix stripped by the platform collaborator.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub actor: Actor,
    pub venue: Venue,
    pub text: String,
}

/// Opaque handle to a message the engine sent, usable for later deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageTicket(pub u64);

/// Egress boundary to the chat platform.
///
/// All failures from this collaborator are best-effort UI hygiene and are
/// swallowed by callers; implementations should not retry internally.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, venue: VenueId, text: &str)
    -> Result<MessageTicket, GatewayError>;

    async fn delete_message(&self, ticket: &MessageTicket) -> Result<(), GatewayError>;
}
