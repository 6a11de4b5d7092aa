//! Engine facade: ingress handling, preemption, and the work queue.
//!
//! [`Courier`] owns the whole engine: configuration, global run state, the
//! session registry, and both ends of the work queue. The ingress side
//! (`handle_message`) and the single dispatch loop share it through one
//! `Arc`; everything mutable lives behind the state or registry mutex, so
//! the facade itself is freely shareable.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::actor::Actor;
use crate::auth;
use crate::auth::Role;
use crate::backend::ConversationBackend;
use crate::command::Command;
use crate::config::CourierConfig;
use crate::dispatch;
use crate::gateway::ChatGateway;
use crate::gateway::InboundMessage;
use crate::gateway::MessageTicket;
use crate::gateway::Venue;
use crate::gateway::VenueId;
use crate::registry::SessionRegistry;
use crate::state::EngineState;

const THINKING_PLACEHOLDER: &str = "\u{1f9e0} Thinking\u{2026}";
const FRESH_CHAT_PLACEHOLDER: &str = "\u{1f9e0} Starting a fresh chat...";
const NEW_CHAT_PROMPT: &str = "New chat created. Ask your next question.";
const STOPPED_CONFIRMATION: &str = "\u{1f6d1} All tasks stopped.";
const STOP_PROTECTED_OWNER: &str =
    "\u{26d4} Currently answering a protected owner. Stop ignored.";
const STOP_NOT_PERMITTED: &str =
    "\u{26d4} You don't have permission to stop ongoing tasks.";

/// One queued request. Immutable once created; destroyed when its dispatch
/// completes or when a drain discards it.
pub(crate) struct RequestRecord {
    pub(crate) actor: Actor,
    pub(crate) venue: Venue,
    pub(crate) prompt: String,
    /// Transient "thinking" message, removed when the record finishes.
    pub(crate) placeholder: Option<MessageTicket>,
    /// Drain epoch current at enqueue time; stale records are discarded.
    pub(crate) epoch: u64,
    pub(crate) enqueued_at: Instant,
}

pub(crate) struct CourierInner {
    pub(crate) config: CourierConfig,
    pub(crate) state: EngineState,
    pub(crate) registry: SessionRegistry,
    pub(crate) gateway: Arc<dyn ChatGateway>,
    pub(crate) queue_tx: async_channel::Sender<RequestRecord>,
    pub(crate) queue_rx: async_channel::Receiver<RequestRecord>,
}

/// The relay engine. Construction spawns the single dispatch consumer;
/// feed it inbound messages with [`Courier::handle_message`].
pub struct Courier {
    inner: Arc<CourierInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Courier {
    pub fn start(
        config: CourierConfig,
        backend: Arc<dyn ConversationBackend>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        let (queue_tx, queue_rx) = async_channel::unbounded();
        let inner = Arc::new(CourierInner {
            config,
            state: EngineState::default(),
            registry: SessionRegistry::new(backend),
            gateway,
            queue_tx,
            queue_rx,
        });
        let dispatcher = tokio::spawn(dispatch::run(Arc::clone(&inner)));
        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Processes one inbound message: classification, preemption, command
    /// dispatch, and enqueueing. The platform collaborator has already
    /// filtered for bot mentions and stripped the mention prefix.
    pub async fn handle_message(&self, message: InboundMessage) {
        let InboundMessage { actor, venue, text } = message;
        let role = auth::classify(&actor, &venue, &self.inner.config);

        // Anything from the priority owner clears the floor before the
        // message itself is even looked at.
        if role == Role::PriorityOwner {
            info!(actor = %actor, "priority owner message; preempting all work");
            self.drain().await;
        }

        match Command::parse(&text) {
            Command::Stop => self.handle_stop(&actor, role, venue).await,
            Command::NewConversation { prompt } => {
                self.handle_new_conversation(actor, venue, prompt).await;
            }
            Command::Ask { prompt } => {
                if prompt.is_empty() {
                    debug!(actor = %actor, "ignoring bare mention with no request text");
                    return;
                }
                self.enqueue(actor, venue, prompt, THINKING_PLACEHOLDER).await;
            }
        }
    }

    /// Closes the queue, waits for the dispatcher to finish the records it
    /// already holds, and closes every session.
    pub async fn shutdown(&self) {
        self.inner.queue_tx.close();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(error = %err, "dispatcher ended abnormally during shutdown");
        }
        self.inner.registry.close_all().await;
    }

    async fn handle_stop(&self, actor: &Actor, role: Role, venue: Venue) {
        if role == Role::PriorityOwner {
            // The floor was already cleared above; just confirm.
            self.send_best_effort(venue.id, STOPPED_CONFIRMATION).await;
            return;
        }

        let lock = self.inner.state.owner_lock_snapshot().await;
        if auth::authorize_stop(actor, role, lock.as_ref()) {
            info!(caller = %actor, "stop command accepted");
            self.drain().await;
            self.send_best_effort(venue.id, STOPPED_CONFIRMATION).await;
        } else {
            debug!(caller = %actor, "stop command rejected");
            // A rejection only happens while an owner holds the lock;
            // unlocked work can always be stopped.
            let text = match &lock {
                Some(_) => STOP_PROTECTED_OWNER,
                None => STOP_NOT_PERMITTED,
            };
            self.send_best_effort(venue.id, text).await;
        }
    }

    async fn handle_new_conversation(&self, actor: Actor, venue: Venue, prompt: Option<String>) {
        self.inner.registry.discard(actor.id()).await;
        match prompt {
            None => self.send_best_effort(venue.id, NEW_CHAT_PROMPT).await,
            Some(prompt) => {
                self.enqueue(actor, venue, prompt, FRESH_CHAT_PLACEHOLDER)
                    .await;
            }
        }
    }

    async fn enqueue(&self, actor: Actor, venue: Venue, prompt: String, placeholder_text: &str) {
        let placeholder = match self
            .inner
            .gateway
            .send_message(venue.id, placeholder_text)
            .await
        {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                debug!(error = %err, "failed to post placeholder message");
                None
            }
        };

        let record = RequestRecord {
            epoch: self.inner.state.current_epoch().await,
            enqueued_at: Instant::now(),
            actor,
            venue,
            prompt,
            placeholder,
        };
        if let Err(err) = self.inner.queue_tx.send(record).await {
            warn!(error = %err, "work queue closed; dropping request");
        }
    }

    /// Discards every queued record, cancels every in-flight dispatch,
    /// resets every live session, and clears the owner lock. Records
    /// enqueued before this call can never be dispatched after it: the
    /// epoch bump marks them dead even if the consumer dequeued them while
    /// the drain was still in progress.
    async fn drain(&self) {
        let tokens = self.inner.state.begin_drain().await;
        for token in &tokens {
            token.cancel();
        }

        let mut discarded = 0usize;
        while let Ok(record) = self.inner.queue_rx.try_recv() {
            if let Some(ticket) = &record.placeholder
                && let Err(err) = self.inner.gateway.delete_message(ticket).await
            {
                debug!(error = %err, "failed to remove placeholder while draining");
            }
            discarded += 1;
        }

        self.inner.registry.reset_all().await;
        self.inner.state.finish_drain().await;
        info!(discarded, cancelled = tokens.len(), "drain complete");
    }

    async fn send_best_effort(&self, venue: VenueId, text: &str) {
        if let Err(err) = self.inner.gateway.send_message(venue, text).await {
            debug!(error = %err, "failed to send status message");
        }
    }
}
