//! Actor classification and stop authorization.

use crate::actor::Actor;
use crate::config::CourierConfig;
use crate::gateway::Venue;
use crate::state::LockHolder;

/// Privilege tier of one actor, computed per message. Exactly one applies;
/// higher tiers shadow lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Singular configured actor with absolute preemption rights.
    PriorityOwner,
    /// Installer-designated owner, subordinate to the priority owner.
    ConfiguredOwner,
    /// Platform-native elevated permission, scoped to the current venue.
    Administrator,
    Ordinary,
}

impl Role {
    /// Owners take the owner lock while their request is dispatched.
    #[must_use]
    pub fn takes_owner_lock(self) -> bool {
        matches!(self, Role::PriorityOwner | Role::ConfiguredOwner)
    }
}

/// Pure classification of an actor within a venue. Missing venue context
/// (direct messages) simply yields a non-admin result.
#[must_use]
pub fn classify(actor: &Actor, venue: &Venue, config: &CourierConfig) -> Role {
    if config.is_priority_owner(actor.handle()) {
        Role::PriorityOwner
    } else if config.is_configured_owner(actor.handle()) {
        Role::ConfiguredOwner
    } else if venue.caller_is_admin == Some(true) {
        Role::Administrator
    } else {
        Role::Ordinary
    }
}

/// Whether `caller` may execute a global stop right now.
///
/// With no owner lock held, anyone may stop (administrators stopping
/// ordinary work is a subset of this). A lock held by the priority owner
/// yields only to the priority owner; a lock held by a configured owner
/// yields to that same owner or the priority owner. Administrators never
/// break an owner-held lock.
#[must_use]
pub fn authorize_stop(caller: &Actor, caller_role: Role, lock: Option<&LockHolder>) -> bool {
    if caller_role == Role::PriorityOwner {
        return true;
    }
    match lock {
        None => true,
        Some(holder) if holder.priority => false,
        Some(holder) => caller.handle() == holder.actor.handle(),
    }
}
