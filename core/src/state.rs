use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::actor::Actor;

/// Identifies one dispatched request inside the in-flight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[cfg(test)]
impl TaskId {
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

/// Who holds the owner lock, and through which dispatched task.
#[derive(Debug, Clone)]
pub struct LockHolder {
    pub actor: Actor,
    /// `true` when the holder is the priority owner.
    pub priority: bool,
    pub task: TaskId,
}

/// Raised when the dispatcher requests the owner lock while a different
/// owner already holds it. Cannot occur under correct single-consumer
/// operation; treated as a programming-contract breach, never ignored.
#[derive(Debug, Error)]
#[error("owner lock requested for {requester} while held by {holder}")]
pub struct LockContention {
    pub requester: String,
    pub holder: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RunPhase {
    #[default]
    Normal,
    Draining,
}

#[derive(Default)]
struct StateInner {
    phase: RunPhase,
    /// Bumped at the start of every drain. Records stamped with an older
    /// epoch are discarded by the dispatcher even if they were dequeued
    /// before the drain finished.
    epoch: u64,
    next_task: u64,
    inflight: HashMap<TaskId, CancellationToken>,
    owner_lock: Option<LockHolder>,
}

/// Global run state: run phase, drain epoch, in-flight task table, and the
/// owner lock. One owned object shared by the ingress handler and the
/// dispatch loop; all mutation happens behind the mutex at well-defined
/// points, never across a suspension.
#[derive(Default)]
pub(crate) struct EngineState {
    inner: Mutex<StateInner>,
}

impl EngineState {
    pub(crate) async fn current_epoch(&self) -> u64 {
        self.inner.lock().await.epoch
    }

    pub(crate) async fn is_draining(&self) -> bool {
        self.inner.lock().await.phase == RunPhase::Draining
    }

    /// Registers a new dispatched task and returns its id plus the token
    /// the drain path uses to cancel it.
    pub(crate) async fn register_task(&self) -> (TaskId, CancellationToken) {
        let mut inner = self.inner.lock().await;
        let task = TaskId(inner.next_task);
        inner.next_task += 1;
        let token = CancellationToken::new();
        inner.inflight.insert(task, token.clone());
        (task, token)
    }

    pub(crate) async fn deregister_task(&self, task: TaskId) {
        self.inner.lock().await.inflight.remove(&task);
    }

    /// Takes the owner lock for `holder`'s task. Contention with a
    /// different owner is an invariant violation surfaced as an error.
    /// Re-acquisition by the same handle replaces the holder record.
    pub(crate) async fn acquire_owner_lock(&self, holder: LockHolder) -> Result<(), LockContention> {
        let mut inner = self.inner.lock().await;
        if let Some(current) = &inner.owner_lock
            && current.actor.handle() != holder.actor.handle()
        {
            return Err(LockContention {
                requester: holder.actor.handle().to_string(),
                holder: current.actor.handle().to_string(),
            });
        }
        inner.owner_lock = Some(holder);
        Ok(())
    }

    /// Releases the lock only if `task` still holds it; the drain path may
    /// already have cleared it.
    pub(crate) async fn release_owner_lock(&self, task: TaskId) {
        let mut inner = self.inner.lock().await;
        if inner.owner_lock.as_ref().is_some_and(|h| h.task == task) {
            inner.owner_lock = None;
        }
    }

    pub(crate) async fn owner_lock_snapshot(&self) -> Option<LockHolder> {
        self.inner.lock().await.owner_lock.clone()
    }

    /// First half of a drain: bumps the epoch, flips the phase, clears the
    /// owner lock unconditionally, and hands back every in-flight token so
    /// the caller can cancel outside the lock.
    pub(crate) async fn begin_drain(&self) -> Vec<CancellationToken> {
        let mut inner = self.inner.lock().await;
        inner.phase = RunPhase::Draining;
        inner.epoch += 1;
        inner.owner_lock = None;
        inner.inflight.values().cloned().collect()
    }

    pub(crate) async fn finish_drain(&self) {
        self.inner.lock().await.phase = RunPhase::Normal;
    }
}
