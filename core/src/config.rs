use std::collections::HashSet;
use std::env;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PRIORITY_OWNER: &str = "operator";
const DEFAULT_FIRST_REPLY_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_STABILITY_THRESHOLD: u32 = 3;
// Replies longer than the threshold are split into chunks of this many
// Unicode scalar values; both bounds sit under common platform caps.
const DEFAULT_CHUNK_THRESHOLD: usize = 1_900;
const DEFAULT_CHUNK_SIZE: usize = 1_800;

pub const ENV_CHAT_TOKEN: &str = "COURIER_CHAT_TOKEN";
pub const ENV_PRIORITY_OWNER: &str = "COURIER_PRIORITY_OWNER";
pub const ENV_OWNER: &str = "COURIER_OWNER";
pub const ENV_OWNER_EXTRA: &str = "COURIER_OWNER_EXTRA";
const ENV_FIRST_REPLY_TIMEOUT_MS: &str = "COURIER_FIRST_REPLY_TIMEOUT_MS";
const ENV_POLL_INTERVAL_MS: &str = "COURIER_POLL_INTERVAL_MS";
const ENV_STABILITY_THRESHOLD: &str = "COURIER_STABILITY_THRESHOLD";

/// Engine configuration.
///
/// Invariant: `owner_handles` always contains `priority_owner`, and every
/// entry is normalized (lowercased, trimmed). Use the constructors below
/// rather than mutating the fields directly.
#[derive(Debug, Clone)]
pub struct CourierConfig {
    priority_owner: String,
    owner_handles: HashSet<String>,
    pub first_reply_timeout: Duration,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    pub chunk_threshold: usize,
    pub chunk_size: usize,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY_OWNER, None, None)
    }
}

impl CourierConfig {
    /// `primary_owner` and `extra_owners` mirror the installer-facing
    /// settings: one optional primary handle plus an optional
    /// comma-separated list.
    pub fn new(
        priority_owner: &str,
        primary_owner: Option<&str>,
        extra_owners: Option<&str>,
    ) -> Self {
        let priority_owner = normalize(priority_owner);
        let mut owner_handles = HashSet::new();
        if let Some(primary) = primary_owner {
            insert_owner(&mut owner_handles, primary);
        }
        if let Some(extras) = extra_owners {
            for extra in extras.split(',') {
                insert_owner(&mut owner_handles, extra);
            }
        }
        // The priority owner is always a configured owner as well.
        owner_handles.insert(priority_owner.clone());

        Self {
            priority_owner,
            owner_handles,
            first_reply_timeout: Duration::from_millis(DEFAULT_FIRST_REPLY_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Builds a configuration from `COURIER_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let priority_owner =
            env::var(ENV_PRIORITY_OWNER).unwrap_or_else(|_| DEFAULT_PRIORITY_OWNER.to_string());
        let primary = env::var(ENV_OWNER).ok();
        let extras = env::var(ENV_OWNER_EXTRA).ok();
        let mut config = Self::new(&priority_owner, primary.as_deref(), extras.as_deref());

        if let Some(ms) = env_u64(ENV_FIRST_REPLY_TIMEOUT_MS) {
            config.first_reply_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64(ENV_POLL_INTERVAL_MS) {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(threshold) = env_u64(ENV_STABILITY_THRESHOLD) {
            config.stability_threshold = threshold.clamp(1, u64::from(u32::MAX)) as u32;
        }
        config
    }

    pub fn priority_owner(&self) -> &str {
        &self.priority_owner
    }

    pub fn is_priority_owner(&self, handle: &str) -> bool {
        handle == self.priority_owner
    }

    pub fn is_configured_owner(&self, handle: &str) -> bool {
        self.owner_handles.contains(handle)
    }
}

/// Required platform credential; the process must refuse to start without it.
pub fn chat_token_from_env() -> Option<String> {
    env::var(ENV_CHAT_TOKEN).ok().filter(|t| !t.trim().is_empty())
}

fn normalize(handle: &str) -> String {
    handle.trim().to_lowercase()
}

fn insert_owner(owners: &mut HashSet<String>, raw: &str) {
    let handle = normalize(raw);
    if !handle.is_empty() {
        owners.insert(handle);
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(%name, %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
