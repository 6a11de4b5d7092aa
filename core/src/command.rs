/// Recognized forms of an inbound message, after the platform collaborator
/// has stripped the bot mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `stop` anywhere in the text.
    Stop,
    /// `newchat` prefix; the remainder, if any, becomes a fresh request.
    NewConversation { prompt: Option<String> },
    /// Everything else.
    Ask { prompt: String },
}

const STOP_TOKEN: &str = "stop";
const NEW_CONVERSATION_PREFIX: &str = "newchat";

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();

        if lowered.contains(STOP_TOKEN) {
            return Self::Stop;
        }
        if lowered.starts_with(NEW_CONVERSATION_PREFIX) {
            let rest = trimmed[NEW_CONVERSATION_PREFIX.len()..].trim();
            let prompt = (!rest.is_empty()).then(|| rest.to_string());
            return Self::NewConversation { prompt };
        }
        Self::Ask {
            prompt: trimmed.to_string(),
        }
    }
}
