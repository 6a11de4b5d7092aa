use std::fmt;

/// Platform-native numeric id of a chat user. Queue key and session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a request sender, captured once at ingress.
///
/// The display handle is normalized to lowercase so that owner
/// configuration and lock-holder comparisons are case-insensitive.
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    handle: String,
}

impl Actor {
    pub fn new(id: ActorId, raw_handle: &str) -> Self {
        Self {
            id,
            handle: raw_handle.trim().to_lowercase(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Normalized (lowercased, trimmed) display handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.handle, self.id)
    }
}
