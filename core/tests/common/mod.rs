//! Scripted collaborator doubles shared by the integration suite.
//!
//! Both doubles record into one ordered [`EventLog`] so tests can assert
//! cross-collaborator ordering (submissions vs deliveries) from a single
//! sequence.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::actor::Actor;
use courier_core::actor::ActorId;
use courier_core::backend::ConversationBackend;
use courier_core::backend::ConversationSession;
use courier_core::backend::IndicatorKind;
use courier_core::backend::OutputBlock;
use courier_core::config::CourierConfig;
use courier_core::errors::BlockReadError;
use courier_core::errors::GatewayError;
use courier_core::errors::SessionError;
use courier_core::gateway::ChatGateway;
use courier_core::gateway::InboundMessage;
use courier_core::gateway::MessageTicket;
use courier_core::gateway::Venue;
use courier_core::gateway::VenueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Opened { actor: ActorId, serial: u64 },
    Submitted { actor: ActorId, prompt: String },
    Reset { actor: ActorId },
    Closed { actor: ActorId },
    Sent { venue: VenueId, text: String },
    Deleted { ticket: u64 },
}

/// Ordered record of everything the engine did to its collaborators.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<LogEvent>>>);

impl EventLog {
    pub fn push(&self, event: LogEvent) {
        self.0.lock().expect("event log poisoned").push(event);
    }

    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.0.lock().expect("event log poisoned").clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|event| match event {
                LogEvent::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn has_sent_containing(&self, needle: &str) -> bool {
        self.sent_texts().iter().any(|text| text.contains(needle))
    }

    /// Polls until `pred` holds over the log; panics with the full log on
    /// timeout so the failure shows what actually happened.
    pub async fn wait_for<F>(&self, what: &str, pred: F)
    where
        F: Fn(&[LogEvent]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.snapshot();
            if pred(&events) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {what}; log so far: {events:#?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_for_sent(&self, needle: &str) {
        let needle = needle.to_string();
        self.wait_for(&format!("message containing {needle:?}"), |events| {
            events.iter().any(|event| {
                matches!(event, LogEvent::Sent { text, .. } if text.contains(&needle))
            })
        })
        .await;
    }

    pub async fn wait_for_submit(&self, actor: ActorId) {
        self.wait_for(&format!("submission from {actor}"), |events| {
            events
                .iter()
                .any(|event| matches!(event, LogEvent::Submitted { actor: a, .. } if *a == actor))
        })
        .await;
    }
}

/// Per-actor behavior of the scripted sessions.
#[derive(Clone, Default)]
pub struct SessionScript {
    /// Reads returned by the newest output block, in order; the last entry
    /// repeats forever. `None` means one settled read derived from the
    /// prompt (`answer#<serial>: <prompt>`).
    pub reads: Option<Vec<String>>,
    /// Read index at which the block reports itself stale, once.
    pub stale_at: Option<usize>,
    /// Keep the busy indicator up until the session is reset or released.
    pub stall: bool,
    /// Never produce an output block after a submission.
    pub mute: bool,
    /// Refuse to open a session for this actor at all.
    pub fail_open: bool,
    /// Post-completion indicators.
    pub retry: bool,
    pub usage_limit: bool,
    pub failure: bool,
}

pub struct ScriptedBlock {
    reads: Vec<String>,
    stale_at: Option<usize>,
    cursor: AtomicUsize,
}

#[async_trait]
impl OutputBlock for ScriptedBlock {
    async fn text(&self) -> Result<String, BlockReadError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.stale_at == Some(index) {
            return Err(BlockReadError::Stale);
        }
        let index = index.min(self.reads.len() - 1);
        Ok(self.reads[index].clone())
    }
}

pub struct ScriptedSession {
    pub actor: ActorId,
    pub serial: u64,
    script: SessionScript,
    log: EventLog,
    alive: AtomicBool,
    stalled: AtomicBool,
    blocks: Mutex<Vec<Arc<ScriptedBlock>>>,
}

impl ScriptedSession {
    pub fn release_stall(&self) {
        self.stalled.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationSession for ScriptedSession {
    async fn probe(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn submit(&self, text: &str) -> Result<(), SessionError> {
        self.log.push(LogEvent::Submitted {
            actor: self.actor,
            prompt: text.to_string(),
        });
        if self.script.stall {
            self.stalled.store(true, Ordering::SeqCst);
        }
        if !self.script.mute {
            let reads = self
                .script
                .reads
                .clone()
                .unwrap_or_else(|| vec![format!("answer#{}: {text}", self.serial)]);
            self.blocks
                .lock()
                .expect("blocks poisoned")
                .push(Arc::new(ScriptedBlock {
                    reads,
                    stale_at: self.script.stale_at,
                    cursor: AtomicUsize::new(0),
                }));
        }
        Ok(())
    }

    async fn indicator(&self, kind: IndicatorKind) -> Result<bool, SessionError> {
        Ok(match kind {
            IndicatorKind::Busy => self.stalled.load(Ordering::SeqCst),
            IndicatorKind::Retry => self.script.retry,
            IndicatorKind::UsageLimit => self.script.usage_limit,
            IndicatorKind::Failure => self.script.failure,
        })
    }

    async fn output_blocks(&self) -> Result<Vec<Arc<dyn OutputBlock>>, SessionError> {
        let blocks = self.blocks.lock().expect("blocks poisoned");
        Ok(blocks
            .iter()
            .map(|block| Arc::clone(block) as Arc<dyn OutputBlock>)
            .collect())
    }

    async fn reset(&self) -> Result<(), SessionError> {
        self.stalled.store(false, Ordering::SeqCst);
        self.log.push(LogEvent::Reset { actor: self.actor });
        Ok(())
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.log.push(LogEvent::Closed { actor: self.actor });
    }
}

/// Backend double: every opened session gets a serial number and the
/// script configured for its actor.
pub struct ScriptedBackend {
    log: EventLog,
    scripts: Mutex<HashMap<ActorId, SessionScript>>,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
    next_serial: AtomicU64,
}

impl ScriptedBackend {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            scripts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(Vec::new()),
            next_serial: AtomicU64::new(0),
        })
    }

    pub fn script_actor(&self, actor: ActorId, script: SessionScript) {
        self.scripts
            .lock()
            .expect("scripts poisoned")
            .insert(actor, script);
    }

    pub fn release_stall(&self, actor: ActorId) {
        for session in self.sessions.lock().expect("sessions poisoned").iter() {
            if session.actor == actor {
                session.release_stall();
            }
        }
    }

    pub fn opened_for(&self, actor: ActorId) -> usize {
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .iter()
            .filter(|session| session.actor == actor)
            .count()
    }
}

#[async_trait]
impl ConversationBackend for ScriptedBackend {
    async fn open_session(
        &self,
        actor: ActorId,
    ) -> Result<Arc<dyn ConversationSession>, SessionError> {
        let script = self
            .scripts
            .lock()
            .expect("scripts poisoned")
            .get(&actor)
            .cloned()
            .unwrap_or_default();
        if script.fail_open {
            return Err(SessionError::open("scripted refusal"));
        }

        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(ScriptedSession {
            actor,
            serial,
            script,
            log: self.log.clone(),
            alive: AtomicBool::new(true),
            stalled: AtomicBool::new(false),
            blocks: Mutex::new(Vec::new()),
        });
        self.log.push(LogEvent::Opened { actor, serial });
        self.sessions
            .lock()
            .expect("sessions poisoned")
            .push(Arc::clone(&session));
        Ok(session)
    }
}

/// Gateway double: hands out sequential tickets and records everything.
pub struct RecordingGateway {
    log: EventLog,
    next_ticket: AtomicU64,
}

impl RecordingGateway {
    pub fn new(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            next_ticket: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(
        &self,
        venue: VenueId,
        text: &str,
    ) -> Result<MessageTicket, GatewayError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.log.push(LogEvent::Sent {
            venue,
            text: text.to_string(),
        });
        Ok(MessageTicket(ticket))
    }

    async fn delete_message(&self, ticket: &MessageTicket) -> Result<(), GatewayError> {
        self.log.push(LogEvent::Deleted { ticket: ticket.0 });
        Ok(())
    }
}

/// Configuration used across the suite: priority owner `prio`, configured
/// owners `owner_a` and `owner_b`, fast polling.
pub fn test_config() -> CourierConfig {
    let mut config = CourierConfig::new("prio", Some("owner_a"), Some("owner_b"));
    config.poll_interval = Duration::from_millis(2);
    config
}

pub fn message(id: u64, handle: &str, text: &str) -> InboundMessage {
    InboundMessage {
        actor: Actor::new(ActorId(id), handle),
        venue: Venue::new(VenueId(100), None),
        text: text.to_string(),
    }
}

pub fn admin_message(id: u64, handle: &str, text: &str) -> InboundMessage {
    InboundMessage {
        actor: Actor::new(ActorId(id), handle),
        venue: Venue::new(VenueId(100), Some(true)),
        text: text.to_string(),
    }
}
