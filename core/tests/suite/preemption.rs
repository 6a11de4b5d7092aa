use std::time::Duration;

use courier_core::Courier;
use courier_core::actor::ActorId;

use crate::common::EventLog;
use crate::common::LogEvent;
use crate::common::RecordingGateway;
use crate::common::ScriptedBackend;
use crate::common::SessionScript;
use crate::common::message;
use crate::common::test_config;

#[tokio::test]
async fn priority_owner_submission_cancels_in_flight_work() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone());
    let gateway = RecordingGateway::new(log.clone());

    // Alice's session streams forever unless interrupted.
    backend.script_actor(
        ActorId(1),
        SessionScript {
            stall: true,
            ..SessionScript::default()
        },
    );

    let courier = Courier::start(test_config(), backend, gateway);
    courier.handle_message(message(1, "alice", "slow question")).await;
    log.wait_for_submit(ActorId(1)).await;

    // Anything from the priority owner preempts: queue drained, Alice's
    // task cancelled, her session reset.
    courier.handle_message(message(9, "prio", "what is going on")).await;
    log.wait_for_sent("answer#2: what is going on").await;

    assert!(
        log.snapshot()
            .iter()
            .any(|event| matches!(event, LogEvent::Reset { actor } if *actor == ActorId(1))),
        "preempted session was not reset"
    );

    // The cancelled request must never resume or deliver afterwards.
    tokio::time::sleep(Duration::from_millis(50)).await;
    courier.shutdown().await;
    assert!(
        !log.has_sent_containing("answer#1"),
        "preempted reply was delivered: {:#?}",
        log.snapshot()
    );
}

#[tokio::test]
async fn preempted_placeholder_is_cleaned_up() {
    let log = EventLog::default();
    let backend = ScriptedBackend::new(log.clone());
    let gateway = RecordingGateway::new(log.clone());
    backend.script_actor(
        ActorId(1),
        SessionScript {
            stall: true,
            ..SessionScript::default()
        },
    );

    let courier = Courier::start(test_config(), backend, gateway);
    courier.handle_message(message(1, "alice", "slow question")).await;
    log.wait_for_submit(ActorId(1)).await;

    // Queue a second request behind the stalled one, then preempt. Both
    // placeholders must be deleted: one by the drain discarding the queued
    // record, one by the cancelled dispatch cleaning up after itself.
    courier.handle_message(message(2, "bob", "queued question")).await;
    courier.handle_message(message(9, "prio", "move aside")).await;
    log.wait_for("both placeholders deleted", |events| {
        events
            .iter()
            .filter(|event| matches!(event, LogEvent::Deleted { .. }))
            .count()
            >= 2
    })
    .await;
    courier.shutdown().await;

    assert!(!log.has_sent_containing("queued question"), "discarded record was dispatched");
}
