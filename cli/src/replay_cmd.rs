//! Deterministic end-to-end harness: feeds a JSONL transcript of inbound
//! events through the engine against an echoing scripted backend and a
//! console gateway. Useful for demoing the preemption and stop semantics
//! without a browser or a chat platform.
//!
//! Transcript line format (one JSON object per line, `#` comments allowed):
//! `{"actor_id":1,"handle":"alice","venue":7,"text":"hello"}` with optional
//! `"admin":true` and `"gap_ms":250`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use courier_core::Courier;
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
use serde::Deserialize;

#[derive(Debug, Parser)]
pub struct ReplayArgs {
    /// Path to the JSONL event transcript.
    #[arg(value_name = "TRANSCRIPT")]
    transcript: PathBuf,

    /// Pause between events when a line carries no `gap_ms` of its own.
    #[arg(long = "gap-ms", value_name = "MS", default_value_t = 100)]
    gap_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ReplayEvent {
    actor_id: u64,
    handle: String,
    venue: u64,
    #[serde(default)]
    admin: Option<bool>,
    text: String,
    #[serde(default)]
    gap_ms: Option<u64>,
}

pub async fn run(args: ReplayArgs) -> Result<()> {
    let transcript = std::fs::read_to_string(&args.transcript)
        .with_context(|| format!("reading transcript {}", args.transcript.display()))?;

    let config = CourierConfig::from_env();
    let backend = Arc::new(EchoBackend::default());
    let gateway = Arc::new(ConsoleGateway::default());
    let courier = Courier::start(config, backend, gateway);
    tracing::info!(transcript = %args.transcript.display(), "replay started");

    for (lineno, line) in transcript.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line)
            .with_context(|| format!("transcript line {}", lineno + 1))?;

        let message = InboundMessage {
            actor: Actor::new(ActorId(event.actor_id), &event.handle),
            venue: Venue::new(VenueId(event.venue), event.admin),
            text: event.text,
        };
        courier.handle_message(message).await;

        let gap = event.gap_ms.unwrap_or(args.gap_ms);
        if gap > 0 {
            tokio::time::sleep(Duration::from_millis(gap)).await;
        }
    }

    courier.shutdown().await;
    Ok(())
}

/// Scripted stand-in for the browser collaborator: every session echoes the
/// prompt back, tagged with the session's serial, after one rewritten read
/// so the stabilization wait has something to chew on.
#[derive(Default)]
struct EchoBackend {
    next_serial: AtomicU64,
}

#[async_trait]
impl ConversationBackend for EchoBackend {
    async fn open_session(
        &self,
        _actor: ActorId,
    ) -> Result<Arc<dyn ConversationSession>, SessionError> {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(EchoSession {
            serial,
            alive: AtomicBool::new(true),
            blocks: Mutex::new(Vec::new()),
        }))
    }
}

struct EchoSession {
    serial: u64,
    alive: AtomicBool,
    blocks: Mutex<Vec<Arc<EchoBlock>>>,
}

#[async_trait]
impl ConversationSession for EchoSession {
    async fn probe(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn submit(&self, text: &str) -> Result<(), SessionError> {
        let settled = format!("(#{}) {text}", self.serial);
        let partial: String = settled.chars().take(settled.chars().count() / 2).collect();
        self.blocks
            .lock()
            .map_err(|_| SessionError::unreachable("echo session poisoned"))?
            .push(Arc::new(EchoBlock {
                reads: vec![partial, settled],
                cursor: AtomicUsize::new(0),
            }));
        Ok(())
    }

    async fn indicator(&self, _kind: IndicatorKind) -> Result<bool, SessionError> {
        Ok(false)
    }

    async fn output_blocks(&self) -> Result<Vec<Arc<dyn OutputBlock>>, SessionError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| SessionError::unreachable("echo session poisoned"))?;
        Ok(blocks
            .iter()
            .map(|block| Arc::clone(block) as Arc<dyn OutputBlock>)
            .collect())
    }

    async fn reset(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

struct EchoBlock {
    reads: Vec<String>,
    cursor: AtomicUsize,
}

#[async_trait]
impl OutputBlock for EchoBlock {
    async fn text(&self) -> Result<String, BlockReadError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let index = index.min(self.reads.len() - 1);
        Ok(self.reads[index].clone())
    }
}

/// Prints engine egress to stdout instead of a chat platform.
#[derive(Default)]
struct ConsoleGateway {
    next_ticket: AtomicU64,
}

#[async_trait]
impl ChatGateway for ConsoleGateway {
    async fn send_message(
        &self,
        venue: VenueId,
        text: &str,
    ) -> Result<MessageTicket, GatewayError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        println!("[venue {venue}] {text}");
        Ok(MessageTicket(ticket))
    }

    async fn delete_message(&self, ticket: &MessageTicket) -> Result<(), GatewayError> {
        println!("[placeholder #{} removed]", ticket.0);
        Ok(())
    }
}
