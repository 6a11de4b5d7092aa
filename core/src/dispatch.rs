//! The single-consumer dispatch loop.
//!
//! Exactly one instance of [`run`] consumes the work queue, which is what
//! gives the process-wide delivery order and per-actor serialization. Lock
//! release, in-flight deregistration, and placeholder cleanup happen on
//! every exit path of a dispatched record.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::auth;
use crate::auth::Role;
use crate::chunk;
use crate::detector::ReplyDetector;
use crate::engine::CourierInner;
use crate::engine::RequestRecord;
use crate::outcome::ReplyOutcome;
use crate::state::LockHolder;

pub(crate) async fn run(inner: Arc<CourierInner>) {
    let queue = inner.queue_rx.clone();
    while let Ok(record) = queue.recv().await {
        dispatch_one(&inner, record).await;
    }
    debug!("work queue closed; dispatcher exiting");
}

async fn dispatch_one(inner: &Arc<CourierInner>, record: RequestRecord) {
    // Records from before the most recent drain are dead even if this loop
    // dequeued them while the drain was still discarding.
    if inner.state.is_draining().await || record.epoch < inner.state.current_epoch().await {
        debug!(actor = %record.actor, "discarding request from a drained epoch");
        remove_placeholder(inner, &record).await;
        return;
    }

    let (task, cancel) = inner.state.register_task().await;
    debug!(
        actor = %record.actor,
        queued_for = ?record.enqueued_at.elapsed(),
        "dispatching request"
    );

    let role = auth::classify(&record.actor, &record.venue, &inner.config);
    let mut holds_lock = false;
    let mut invariant_failure = false;
    if role.takes_owner_lock() {
        let holder = LockHolder {
            actor: record.actor.clone(),
            priority: role == Role::PriorityOwner,
            task,
        };
        match inner.state.acquire_owner_lock(holder).await {
            Ok(()) => holds_lock = true,
            Err(err) => {
                // Single-consumer dispatch cannot double-acquire; reaching
                // this path means the scheduling contract is broken.
                error!(error = %err, "owner lock contention; refusing dispatch");
                invariant_failure = true;
            }
        }
    }

    let outcome = if invariant_failure {
        ReplyOutcome::SessionFailure
    } else {
        run_request(inner, &record, &cancel).await
    };

    deliver(inner, &record, &cancel, outcome).await;

    if holds_lock {
        inner.state.release_owner_lock(task).await;
    }
    inner.state.deregister_task(task).await;
}

async fn run_request(
    inner: &Arc<CourierInner>,
    record: &RequestRecord,
    cancel: &CancellationToken,
) -> ReplyOutcome {
    let session = match inner.registry.acquire(record.actor.id()).await {
        Ok(session) => session,
        Err(err) => {
            if cancel.is_cancelled() {
                return ReplyOutcome::Cancelled;
            }
            warn!(actor = %record.actor, error = %err, "failed to open conversation session");
            return ReplyOutcome::SessionFailure;
        }
    };

    let detector = ReplyDetector::new(session.as_ref(), &inner.config, &record.prompt);
    let outcome = detector.run(cancel).await;
    if matches!(outcome, ReplyOutcome::SessionFailure) {
        // Next request from this actor recreates the session transparently.
        inner.registry.discard(record.actor.id()).await;
    }
    outcome
}

async fn deliver(
    inner: &Arc<CourierInner>,
    record: &RequestRecord,
    cancel: &CancellationToken,
    outcome: ReplyOutcome,
) {
    remove_placeholder(inner, record).await;

    // A cancellation that lands after the result was produced still
    // suppresses delivery; the preempting drain already reset the session.
    if outcome.is_cancelled() || cancel.is_cancelled() {
        debug!(actor = %record.actor, "suppressing delivery for cancelled request");
        return;
    }
    let Some(text) = outcome.user_text() else {
        return;
    };

    if outcome.is_answer() {
        for piece in
            chunk::split_for_delivery(text, inner.config.chunk_threshold, inner.config.chunk_size)
        {
            send_best_effort(inner, record, &piece).await;
        }
    } else {
        send_best_effort(inner, record, text).await;
    }
}

async fn send_best_effort(inner: &Arc<CourierInner>, record: &RequestRecord, text: &str) {
    if let Err(err) = inner.gateway.send_message(record.venue.id, text).await {
        debug!(actor = %record.actor, error = %err, "failed to deliver message");
    }
}

async fn remove_placeholder(inner: &Arc<CourierInner>, record: &RequestRecord) {
    if let Some(ticket) = &record.placeholder
        && let Err(err) = inner.gateway.delete_message(ticket).await
    {
        debug!(error = %err, "failed to remove placeholder message");
    }
}
