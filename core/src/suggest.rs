//! Secondary-intent augmentation: prompts that ask for a video suggestion
//! get a deterministic search link appended to the final reply.

const SUGGEST_TOKEN: &str = "suggest";
const VIDEO_TOKEN: &str = "video";
const SEARCH_BASE: &str = "https://www.youtube.com/results?search_query=";

/// Both tokens must appear, in any order, case-insensitively.
#[must_use]
pub fn wants_video_link(prompt: &str) -> bool {
    let lowered = prompt.to_lowercase();
    lowered.contains(SUGGEST_TOKEN) && lowered.contains(VIDEO_TOKEN)
}

/// Search link derived deterministically from the prompt text.
#[must_use]
pub fn video_search_link(prompt: &str) -> String {
    format!("{SEARCH_BASE}{}", urlencoding::encode(prompt.trim()))
}

/// Suffix appended to the reply when the prompt matches.
#[must_use]
pub fn video_link_suffix(prompt: &str) -> String {
    format!("\n\n🔗 **Suggested video:** {}", video_search_link(prompt))
}
