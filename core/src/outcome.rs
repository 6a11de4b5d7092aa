/// Final result of one relayed request, delivered (or suppressed) by the
/// dispatcher. Detection never raises past this type; every failure mode
/// the external side can produce is a variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The stabilized reply text, possibly augmented.
    Answer(String),
    /// The external side never produced a first token within the bound.
    Timeout,
    /// Retry affordance detected after streaming finished.
    RateLimited,
    /// Usage-limit marker detected.
    UsageLimited,
    /// Generic failure banner detected.
    ExternalFailure,
    /// Session communication broke down mid-request; the session is
    /// discarded so the next request recreates it.
    SessionFailure,
    /// Cancelled by preemption or stop. Suppressed entirely on delivery.
    Cancelled,
}

impl ReplyOutcome {
    /// User-facing rendering. `None` means nothing is delivered.
    #[must_use]
    pub fn user_text(&self) -> Option<&str> {
        match self {
            ReplyOutcome::Answer(text) => Some(text),
            ReplyOutcome::Timeout => {
                Some("The assistant did not respond in time. Possibly rate-limited.")
            }
            ReplyOutcome::RateLimited => {
                Some("The assistant is asking for a retry. Probably rate-limited.")
            }
            ReplyOutcome::UsageLimited => Some("The assistant's usage limit has been reached."),
            ReplyOutcome::ExternalFailure => Some("The assistant reported an internal error."),
            ReplyOutcome::SessionFailure => {
                Some("Something went wrong while reaching the assistant. Please try again.")
            }
            ReplyOutcome::Cancelled => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReplyOutcome::Cancelled)
    }

    #[must_use]
    pub fn is_answer(&self) -> bool {
        matches!(self, ReplyOutcome::Answer(_))
    }
}
